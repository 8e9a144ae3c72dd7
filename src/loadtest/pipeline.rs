// ABOUTME: Loads submission records from a CSV source and sends them one by one over a bound session
// ABOUTME: A bad row fails the whole load before anything is sent; send failures are counted and skipped

use crate::client::Session;
use crate::datatypes::SubmitSm;
use crate::loadtest::error::InputFileError;
use crate::loadtest::metrics::{SubmissionOutcome, SubmissionSummary};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{error, info};

/// source address, destination address, message body
pub const FIELDS_PER_RECORD: usize = 3;

/// One row of the input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub source_addr: String,
    pub destination_addr: String,
    pub body: String,
}

impl SubmitSm {
    pub fn from_record(record: &SubmissionRecord) -> SubmitSm {
        SubmitSm::new(&record.source_addr, &record.destination_addr, &record.body)
    }
}

/// Where the records come from
#[derive(Debug, Clone)]
pub enum RecordSource {
    File(PathBuf),
    /// CSV text held in memory
    Inline(String),
}

#[derive(Debug, Clone)]
pub struct SubmissionPipeline {
    source: RecordSource,
}

impl SubmissionPipeline {
    pub fn new(source: RecordSource) -> Self {
        Self { source }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(RecordSource::File(path.into()))
    }

    pub fn source(&self) -> &RecordSource {
        &self.source
    }

    /// Read and validate every record
    pub fn load(&self) -> Result<Vec<SubmissionRecord>, InputFileError> {
        match &self.source {
            RecordSource::File(path) => {
                let file = File::open(path).map_err(|source| InputFileError::Open {
                    path: path.clone(),
                    source,
                })?;
                load_records(BufReader::new(file))
            }
            RecordSource::Inline(text) => load_records(text.as_bytes()),
        }
    }

    /// Load the records and send them all through `session`, in order.
    ///
    /// Elapsed time covers loading as well as sending.
    pub async fn run<S: Session>(&self, session: &S) -> Result<SubmissionSummary, InputFileError> {
        let started = Instant::now();

        info!(source = ?self.source, "opening sms file");
        let records = self.load()?;
        info!(count = records.len(), "sms file loaded, sending");

        let mut summary = submit_all(session, &records).await;
        summary.elapsed = started.elapsed();

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "sending sms done"
        );
        Ok(summary)
    }
}

/// Parse CSV rows of exactly three fields.
///
/// Quotes are relaxed. A quote inside an unquoted field is literal. Inside a
/// quoted field, a quote that is neither doubled nor followed by a comma or
/// the end of the line is kept as text and the field carries on.
pub fn load_records<R: io::Read>(mut reader: R) -> Result<Vec<SubmissionRecord>, InputFileError> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(InputFileError::Read)?;

    // Quote-free rows split on commas; rows holding a quote are re-read below
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    // Rows starting before this offset belong to a quoted field that ran past its line
    let mut resume_at = 0;
    for row in csv.records() {
        let row = row?;
        let (line, byte) = row
            .position()
            .map_or((0, 0), |position| (position.line(), position.byte() as usize));
        if byte < resume_at {
            continue;
        }

        let fields = if row.iter().any(|field| field.contains('"')) {
            let (fields, consumed) = split_lazy_quoted(&text[byte..]);
            resume_at = byte + consumed;
            fields
        } else {
            row.iter().map(str::to_string).collect()
        };

        let [source_addr, destination_addr, body]: [String; FIELDS_PER_RECORD] = fields
            .try_into()
            .map_err(|fields: Vec<String>| InputFileError::FieldCount {
                line,
                found: fields.len(),
            })?;
        records.push(SubmissionRecord {
            source_addr,
            destination_addr,
            body,
        });
    }
    Ok(records)
}

/// Split the record at the start of `text`. Returns its fields and the
/// number of bytes it spans, line terminator included.
///
/// A quoted field may run over several lines; one left open at the end of
/// the input ends there.
fn split_lazy_quoted(text: &str) -> (Vec<String>, usize) {
    let bytes = text.as_bytes();
    let mut fields = Vec::new();
    let mut pos = 0;

    loop {
        if bytes.get(pos) != Some(&b'"') {
            let end = text[pos..].find([',', '\n']).map_or(text.len(), |i| pos + i);
            let value = &text[pos..end];
            match bytes.get(end) {
                Some(b',') => {
                    fields.push(value.to_string());
                    pos = end + 1;
                    continue;
                }
                Some(_) => {
                    fields.push(value.strip_suffix('\r').unwrap_or(value).to_string());
                    return (fields, end + 1);
                }
                None => {
                    fields.push(value.to_string());
                    return (fields, end);
                }
            }
        }

        let mut field = String::new();
        pos += 1;
        loop {
            match bytes.get(pos) {
                None => {
                    fields.push(field);
                    return (fields, pos);
                }
                Some(b'"') => match bytes.get(pos + 1) {
                    Some(b'"') => {
                        field.push('"');
                        pos += 2;
                    }
                    Some(b',') => {
                        pos += 2;
                        break;
                    }
                    Some(b'\n') => {
                        fields.push(field);
                        return (fields, pos + 2);
                    }
                    Some(b'\r') if bytes.get(pos + 2) == Some(&b'\n') => {
                        fields.push(field);
                        return (fields, pos + 3);
                    }
                    None => {
                        fields.push(field);
                        return (fields, pos + 1);
                    }
                    Some(_) => {
                        field.push('"');
                        pos += 1;
                    }
                },
                Some(b'\r') if bytes.get(pos + 1) == Some(&b'\n') => {
                    field.push('\n');
                    pos += 2;
                }
                Some(b'\r') => {
                    field.push('\r');
                    pos += 1;
                }
                Some(_) => {
                    let end = text[pos..].find(['"', '\r']).map_or(text.len(), |i| pos + i);
                    field.push_str(&text[pos..end]);
                    pos = end;
                }
            }
        }
        fields.push(field);
    }
}

/// Send each record and wait for its response before the next.
///
/// A failed send is logged and counted; the batch carries on.
pub async fn submit_all<S: Session>(session: &S, records: &[SubmissionRecord]) -> SubmissionSummary {
    let mut summary = SubmissionSummary::default();

    for (index, record) in records.iter().enumerate() {
        let outcome = SubmissionOutcome::from(session.send(SubmitSm::from_record(record)).await);
        if let Some(e) = &outcome.error {
            error!(record = index + 1, error = %e, "SubmitSM failed");
        }
        summary.record(&outcome);
    }

    summary
}
