// ABOUTME: Error types of the load-test core: malformed inbound commands, bad input files, run failures
// ABOUTME: Only InputFileError is fatal; the others are logged and counted where they occur

use crate::codec::CodecError;
use crate::datatypes::CommandId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// An inbound command whose body did not decode as its command id says.
///
/// Such commands are dropped without a response.
#[derive(Debug, Error)]
#[error("malformed {command:?} (sequence {sequence_number}): {source}")]
pub struct MalformedInboundError {
    pub command: CommandId,
    pub sequence_number: u32,
    #[source]
    pub source: CodecError,
}

/// The record file could not be used. Aborts the whole submission.
#[derive(Debug, Error)]
pub enum InputFileError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read records: {0}")]
    Read(#[source] io::Error),

    #[error("cannot parse records: {0}")]
    Parse(#[from] csv::Error),

    #[error("line {line}: expected 3 fields, found {found}")]
    FieldCount { line: u64, found: usize },
}

#[derive(Debug, Error)]
pub enum LoadTestError {
    #[error(transparent)]
    Input(#[from] InputFileError),

    #[error("shell I/O failed: {0}")]
    Shell(#[from] io::Error),

    #[error("{task} task failed: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}
