// ABOUTME: Answers every inbound SMPP request: deliver_sm, unbind, enquire_link and a generic_nack fallback
// ABOUTME: Planning the response is separate from sending it so the table can be tested without a socket

use crate::client::{InboundCommand, InboundHandler};
use crate::codec::{CodecError, Frame};
use crate::datatypes::{CommandId, CommandStatus, GenericNack};
use crate::loadtest::error::MalformedInboundError;
use crate::loadtest::metrics::{DispatchSnapshot, DispatchStats, InboundMessageCounter};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Status sent with every response, including generic_nack
pub const ACCEPTED: CommandStatus = CommandStatus::Ok;

/// What to do with one inbound command
#[derive(Debug)]
pub enum Dispatch {
    /// Send `response` with `ACCEPTED`, then close the session if asked
    Respond { response: Frame, close_after: bool },
    /// Decode failed; log and send nothing
    Drop(MalformedInboundError),
}

impl Dispatch {
    fn respond(response: Frame) -> Self {
        Dispatch::Respond {
            response,
            close_after: false,
        }
    }
}

/// The inbound handler installed on every load-test session.
#[derive(Debug)]
pub struct CommandDispatcher {
    counter: Arc<InboundMessageCounter>,
    stats: DispatchStats,
}

impl CommandDispatcher {
    pub fn new(counter: Arc<InboundMessageCounter>) -> Self {
        Self {
            counter,
            stats: DispatchStats::default(),
        }
    }

    pub fn counter(&self) -> &Arc<InboundMessageCounter> {
        &self.counter
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }

    /// Decide the response for `command`.
    ///
    /// A deliver_sm mints its message id here, so each call for a valid
    /// deliver_sm advances the counter exactly once.
    pub fn plan(&self, command: &dyn InboundCommand) -> Dispatch {
        let sequence_number = command.sequence_number();
        let malformed = |command: CommandId, source: CodecError| {
            Dispatch::Drop(MalformedInboundError {
                command,
                sequence_number,
                source,
            })
        };

        match CommandId::try_from(command.command_id()) {
            Ok(CommandId::DeliverSm) => match command.deliver_sm() {
                Ok(request) => {
                    let message_id = self.counter.next_id();
                    debug!(
                        sequence_number,
                        %message_id,
                        source_addr = %request.source_addr,
                        receipt = request.is_delivery_receipt(),
                        "acknowledging deliver_sm"
                    );
                    Dispatch::respond(Frame::DeliverSmResp(request.response(message_id)))
                }
                Err(source) => malformed(CommandId::DeliverSm, source),
            },
            Ok(CommandId::Unbind) => match command.unbind() {
                Ok(request) => Dispatch::Respond {
                    response: Frame::UnbindResp(request.response()),
                    close_after: true,
                },
                Err(source) => malformed(CommandId::Unbind, source),
            },
            Ok(CommandId::EnquireLink) => match command.enquire_link() {
                Ok(request) => Dispatch::respond(Frame::EnquireLinkResp(request.response())),
                Err(source) => malformed(CommandId::EnquireLink, source),
            },
            _ => Dispatch::respond(Frame::GenericNack(GenericNack::new(
                ACCEPTED,
                sequence_number,
            ))),
        }
    }

    fn record(&self, dispatch: &Dispatch) {
        match dispatch {
            Dispatch::Respond { response, .. } => match response {
                Frame::DeliverSmResp(_) => self.stats.record_delivery(),
                Frame::UnbindResp(_) => self.stats.record_unbind(),
                Frame::EnquireLinkResp(_) => self.stats.record_enquire_link(),
                _ => self.stats.record_generic_nack(),
            },
            Dispatch::Drop(_) => self.stats.record_malformed(),
        }
    }
}

impl InboundHandler for CommandDispatcher {
    fn handle(&self, command: &dyn InboundCommand) {
        let command_id = command.command_id();
        match CommandId::try_from(command_id) {
            Ok(known) => debug!(command = ?known, "received smpp command"),
            Err(_) => debug!(command_id, "received unknown smpp command"),
        }

        let dispatch = self.plan(command);
        self.record(&dispatch);

        match dispatch {
            Dispatch::Respond {
                response,
                close_after,
            } => {
                if let Err(e) = command.respond(response, ACCEPTED) {
                    self.stats.record_respond_failure();
                    error!(command_id, error = %e, "can't respond to inbound request");
                }
                // The session goes away even if the unbind_resp could not be queued
                if close_after {
                    info!("unbind received, closing session");
                    command.close_session();
                }
            }
            Dispatch::Drop(e) => {
                error!(error = %e, "invalid PDU in context, no response sent");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RespondError, SmppError};
    use crate::codec::RawPdu;
    use crate::datatypes::{DeliverSm, EnquireLink, Unbind};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    /// An inbound command built from a canned PDU, recording what the
    /// dispatcher does with it
    struct FakeCommand {
        pdu: RawPdu,
        responses: Mutex<Vec<(Frame, CommandStatus)>>,
        closed: AtomicBool,
        fail_respond: bool,
    }

    impl FakeCommand {
        fn new(frame: Frame, sequence_number: u32) -> Self {
            let bytes = frame.with_header(sequence_number, CommandStatus::Ok).to_bytes().unwrap();
            let mut cursor = std::io::Cursor::new(bytes.as_ref());
            Self::from_raw(RawPdu::parse(&mut cursor).unwrap())
        }

        fn from_raw(pdu: RawPdu) -> Self {
            Self {
                pdu,
                responses: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                fail_respond: false,
            }
        }

        fn responses(&self) -> Vec<(Frame, CommandStatus)> {
            self.responses.lock().clone()
        }
    }

    impl InboundCommand for FakeCommand {
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

        fn respond(&self, response: Frame, status: CommandStatus) -> Result<(), RespondError> {
            if self.fail_respond {
                return Err(SmppError::ConnectionClosed);
            }
            self.responses.lock().push((response, status));
            Ok(())
        }

        fn close_session(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(InboundMessageCounter::new()))
    }

    fn deliver_sm(sequence_number: u32) -> FakeCommand {
        FakeCommand::new(
            Frame::DeliverSm(Box::new(DeliverSm::new("A", "B", "id:1 stat:DELIVRD"))),
            sequence_number,
        )
    }

    fn minted_id(command: &FakeCommand) -> String {
        match &command.responses()[..] {
            [(Frame::DeliverSmResp(response), CommandStatus::Ok)] => response.message_id.clone(),
            other => panic!("expected one deliver_sm_resp, got {other:?}"),
        }
    }

    #[test]
    fn deliver_sm_gets_increasing_minted_ids() {
        let dispatcher = dispatcher();

        let first = deliver_sm(10);
        let second = deliver_sm(11);
        dispatcher.handle(&first);
        dispatcher.handle(&second);

        assert_eq!(minted_id(&first), "msgID_2");
        assert_eq!(minted_id(&second), "msgID_3");
        assert_eq!(dispatcher.stats().deliveries, 2);
        assert!(!first.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn deliver_sm_with_reserved_ton_is_still_acknowledged() {
        let dispatcher = dispatcher();
        let mut deliver = DeliverSm::new("A", "B", "hello");
        deliver.source_addr_ton = 0x07;
        let command = FakeCommand::new(Frame::DeliverSm(Box::new(deliver)), 21);

        dispatcher.handle(&command);

        assert_eq!(minted_id(&command), "msgID_2");
        assert_eq!(dispatcher.stats().deliveries, 1);
        assert_eq!(dispatcher.stats().malformed, 0);
    }

    #[test]
    fn unbind_is_acknowledged_then_session_closed() {
        let dispatcher = dispatcher();
        let command = FakeCommand::new(Frame::Unbind(Unbind::new(5)), 5);

        dispatcher.handle(&command);

        let responses = command.responses();
        assert!(matches!(
            &responses[..],
            [(Frame::UnbindResp(_), CommandStatus::Ok)]
        ));
        assert!(command.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn unbind_closes_even_when_respond_fails() {
        let dispatcher = dispatcher();
        let mut command = FakeCommand::new(Frame::Unbind(Unbind::new(5)), 5);
        command.fail_respond = true;

        dispatcher.handle(&command);

        assert!(command.closed.load(Ordering::SeqCst));
        assert_eq!(dispatcher.stats().respond_failures, 1);
    }

    #[test]
    fn enquire_link_is_acknowledged_without_payload() {
        let dispatcher = dispatcher();
        let command = FakeCommand::new(Frame::EnquireLink(EnquireLink::new(3)), 3);

        dispatcher.handle(&command);

        assert!(matches!(
            &command.responses()[..],
            [(Frame::EnquireLinkResp(_), CommandStatus::Ok)]
        ));
        assert!(!command.closed.load(Ordering::SeqCst));
        assert_eq!(dispatcher.counter().current(), InboundMessageCounter::INITIAL);
    }

    #[test]
    fn unrecognized_kinds_get_generic_nack_with_accepted_status() {
        let dispatcher = dispatcher();

        // query_sm is a known id the dispatcher does not handle
        let query = FakeCommand::from_raw(raw(0x0000_0003, 8, &[0x00, 0x00, 0x00, 0x00]));
        // vendor-specific id outside the v3.4 table
        let vendor = FakeCommand::from_raw(raw(0x0001_0200, 9, &[]));

        for command in [&query, &vendor] {
            dispatcher.handle(command);
            match &command.responses()[..] {
                [(Frame::GenericNack(nack), status)] => {
                    assert_eq!(*status, ACCEPTED);
                    assert_eq!(nack.command_status, ACCEPTED);
                }
                other => panic!("expected generic_nack, got {other:?}"),
            }
        }
        assert_eq!(dispatcher.stats().generic_nacks, 2);
    }

    #[test]
    fn malformed_deliver_sm_gets_no_response() {
        let dispatcher = dispatcher();
        // deliver_sm whose body stops after service_type
        let command = FakeCommand::from_raw(raw(0x0000_0005, 4, &[0x00]));

        match dispatcher.plan(&command) {
            Dispatch::Drop(e) => {
                assert_eq!(e.command, CommandId::DeliverSm);
                assert_eq!(e.sequence_number, 4);
            }
            other => panic!("expected drop, got {other:?}"),
        }

        dispatcher.handle(&command);
        assert!(command.responses().is_empty());
        assert!(!command.closed.load(Ordering::SeqCst));
        assert_eq!(dispatcher.stats().malformed, 1);
        // plan() and handle() both ran, neither minted an id
        assert_eq!(dispatcher.counter().current(), InboundMessageCounter::INITIAL);
    }

    #[test]
    fn malformed_unbind_neither_responds_nor_closes() {
        let dispatcher = dispatcher();
        let command = FakeCommand::from_raw(raw(0x0000_0006, 4, &[0xFF]));

        dispatcher.handle(&command);

        assert!(command.responses().is_empty());
        assert!(!command.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn concurrent_deliveries_get_distinct_ids() {
        let dispatcher = Arc::new(dispatcher());

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let dispatcher = dispatcher.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            let command = deliver_sm(n * 100 + i);
                            dispatcher.handle(&command);
                            minted_id(&command)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<String> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 16 * 50);
        assert_eq!(
            dispatcher.counter().current(),
            InboundMessageCounter::INITIAL + 16 * 50
        );
    }

    fn raw(command_id: u32, sequence_number: u32, body: &[u8]) -> RawPdu {
        RawPdu {
            header: crate::codec::PduHeader {
                command_length: (16 + body.len()) as u32,
                command_id,
                command_status: 0,
                sequence_number,
            },
            body: bytes::Bytes::copy_from_slice(body),
        }
    }
}
