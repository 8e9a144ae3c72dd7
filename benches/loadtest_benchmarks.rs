// ABOUTME: Benchmarks for the load tester's hot paths
// ABOUTME: Measures framing, PDU serialization, inbound dispatch and record loading

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use smpp_loadtest::client::{InboundCommand, RespondError};
use smpp_loadtest::codec::{CodecError, Encodable, Frame, RawPdu};
use smpp_loadtest::datatypes::*;
use smpp_loadtest::loadtest::{CommandDispatcher, InboundMessageCounter, load_records};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn create_sample_submit_sm() -> SubmitSm {
    SubmitSm::new("12345", "67890", "Hello World")
}

fn create_sample_deliver_sm() -> DeliverSm {
    let mut deliver = DeliverSm::new("67890", "12345", "Hello back");
    deliver.sequence_number = 1;
    deliver
}

/// An inbound request whose responses go nowhere
struct DiscardingCommand {
    pdu: RawPdu,
}

impl DiscardingCommand {
    fn new(bytes: &Bytes) -> Self {
        let mut cursor = Cursor::new(bytes.as_ref());
        Self {
            pdu: RawPdu::parse(&mut cursor).unwrap(),
        }
    }
}

impl InboundCommand for DiscardingCommand {
    fn command_id(&self) -> u32 {
        self.pdu.header.command_id
    }

    fn sequence_number(&self) -> u32 {
        self.pdu.header.sequence_number
    }

    fn deliver_sm(&self) -> Result<DeliverSm, CodecError> {
        self.pdu.decode()
    }

    fn unbind(&self) -> Result<Unbind, CodecError> {
        self.pdu.decode()
    }

    fn enquire_link(&self) -> Result<EnquireLink, CodecError> {
        self.pdu.decode()
    }

    fn respond(&self, response: Frame, _status: CommandStatus) -> Result<(), RespondError> {
        black_box(response);
        Ok(())
    }

    fn close_session(&self) {}
}

fn bench_framing(c: &mut Criterion) {
    let submit_bytes = create_sample_submit_sm().to_bytes().unwrap();
    let enquire_bytes = EnquireLink::new(1).to_bytes().unwrap();

    let mut group = c.benchmark_group("framing");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("check_submit_sm", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(submit_bytes.as_ref()));
            RawPdu::check(&mut cursor)
        })
    });

    group.bench_function("parse_submit_sm", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(submit_bytes.as_ref()));
            RawPdu::parse(&mut cursor).unwrap()
        })
    });

    group.bench_function("parse_enquire_link", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(enquire_bytes.as_ref()));
            RawPdu::parse(&mut cursor).unwrap()
        })
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    group.measurement_time(Duration::from_secs(10));

    let submit_sm = create_sample_submit_sm();
    group.bench_function("submit_sm", |b| b.iter(|| black_box(&submit_sm).to_bytes()));

    let response = DeliverSmResponse {
        command_status: CommandStatus::Ok,
        sequence_number: 1,
        message_id: "msgID_2".to_string(),
    };
    group.bench_function("deliver_sm_resp", |b| {
        b.iter(|| black_box(&response).to_bytes())
    });

    // Header plus a short message at the protocol maximum
    let long = SubmitSm::new("12345", "67890", &"x".repeat(254));
    group.bench_function("submit_sm_max_length", |b| {
        b.iter(|| black_box(&long).to_bytes())
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = CommandDispatcher::new(Arc::new(InboundMessageCounter::new()));

    let deliver = DiscardingCommand::new(&create_sample_deliver_sm().to_bytes().unwrap());
    let enquire = DiscardingCommand::new(&EnquireLink::new(2).to_bytes().unwrap());

    let mut group = c.benchmark_group("dispatch");
    group.bench_function("deliver_sm", |b| {
        b.iter(|| dispatcher.plan(black_box(&deliver)))
    });
    group.bench_function("enquire_link", |b| {
        b.iter(|| dispatcher.plan(black_box(&enquire)))
    });

    let counter = InboundMessageCounter::new();
    group.bench_function("mint_message_id", |b| b.iter(|| counter.next_id()));

    group.finish();
}

fn bench_record_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_loading");

    for rows in [100usize, 10_000] {
        let csv: String = (0..rows)
            .map(|n| format!("{},{},load test message {n}\n", 1000 + n, 2000 + n))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(rows), &csv, |b, csv| {
            b.iter(|| load_records(black_box(csv.as_bytes())).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_framing,
    bench_serialization,
    bench_dispatch,
    bench_record_loading
);
criterion_main!(benches);
