// ABOUTME: TCP protocol engine: connect, bind_transceiver and the per-session reader and writer tasks
// ABOUTME: Responses are matched to pending requests by sequence number; inbound requests go to the handler

use crate::client::error::{BindFailure, RespondError, SmppError, SmppResult};
use crate::client::traits::{InboundCommand, InboundHandler, ProtocolEngine, Session};
use crate::client::types::{BindConfig, SessionConfig, SessionState, StateHook, SubmitResponse};
use crate::codec::{CodecError, Decodable, Frame, RawPdu};
use crate::connection::{FrameReader, FrameWriter};
use crate::datatypes::{
    BindTransceiver, BindTransceiverResponse, CommandId, CommandStatus, DeliverSm, EnquireLink,
    SubmitSm, SubmitSmResponse, Unbind,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sequence numbers run 1..=0x7FFFFFFF and then wrap
const MAX_SEQUENCE_NUMBER: u32 = 0x7FFF_FFFF;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Opens transceiver sessions over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpEngine;

impl ProtocolEngine for TcpEngine {
    type Session = SmppSession;

    async fn bind(
        &self,
        bind: BindConfig,
        config: &SessionConfig,
    ) -> Result<SmppSession, BindFailure<SmppSession>> {
        SmppSession::bind_transceiver(bind, config).await
    }
}

enum WriterCommand {
    Write(Bytes),
    Shutdown,
}

/// A live SMPP session. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct SmppSession {
    inner: Arc<Inner>,
}

struct Inner {
    id: String,
    system_id: String,
    outbound: mpsc::UnboundedSender<WriterCommand>,
    pending: Mutex<HashMap<u32, oneshot::Sender<RawPdu>>>,
    sequence: AtomicU32,
    state: Mutex<SessionState>,
    closed: CancellationToken,
    send_window: Semaphore,
    request_timeout: Duration,
    state_hook: Option<StateHook>,
}

impl std::fmt::Debug for SmppSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmppSession")
            .field("id", &self.inner.id)
            .field("system_id", &self.inner.system_id)
            .field("state", &self.state())
            .finish()
    }
}

impl SmppSession {
    /// Connect to `bind.addr` and perform a bind_transceiver handshake.
    ///
    /// Connect and bind are each bounded by the configured request timeout.
    /// If the socket opened but the bind failed, the session is handed back
    /// in the failure so the caller can close it.
    pub async fn bind_transceiver(
        bind: BindConfig,
        config: &SessionConfig,
    ) -> Result<SmppSession, BindFailure<SmppSession>> {
        debug!(addr = %bind.addr, system_id = %bind.system_id, "connecting");

        let stream = match timeout(config.request_timeout, TcpStream::connect(&bind.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(BindFailure::new(e)),
            Err(_) => return Err(BindFailure::new(SmppError::Timeout)),
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle");
        }

        let (read_half, write_half) = stream.into_split();
        let session = SmppSession::spawn(read_half, write_half, &bind.system_id, config);

        let request = BindTransceiver::new(
            0,
            bind.system_id.as_str(),
            bind.password.as_str(),
            bind.system_type.as_str(),
        );
        match session.bind_request(request).await {
            Ok(response) => {
                session.set_state(SessionState::BoundTrx);
                info!(
                    session = %session.inner.id,
                    smsc = %response.system_id,
                    "bound as transceiver"
                );
                Ok(session)
            }
            Err(error) => Err(BindFailure::with_partial(error, session)),
        }
    }

    /// Start the reader and writer tasks over an already connected stream
    fn spawn<R, W>(reader: R, writer: W, system_id: &str, config: &SessionConfig) -> SmppSession
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, queue) = mpsc::unbounded_channel();
        let session = SmppSession {
            inner: Arc::new(Inner {
                id: format!("session-{}", NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
                system_id: system_id.to_string(),
                outbound,
                pending: Mutex::new(HashMap::new()),
                sequence: AtomicU32::new(0),
                state: Mutex::new(SessionState::Open),
                closed: CancellationToken::new(),
                send_window: Semaphore::new(config.send_window_size.max(1)),
                request_timeout: config.request_timeout,
                state_hook: config.state_hook.clone(),
            }),
        };

        let request_window = Arc::new(Semaphore::new(config.request_window_size.max(1)));
        tokio::spawn(write_loop(FrameWriter::new(writer), queue));
        tokio::spawn(read_loop(
            session.clone(),
            FrameReader::new(reader),
            config.handler.clone(),
            request_window,
        ));

        session.notify(SessionState::Open);
        session
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    fn next_sequence_number(&self) -> u32 {
        let n = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
        n % MAX_SEQUENCE_NUMBER + 1
    }

    async fn bind_request(&self, request: BindTransceiver) -> SmppResult<BindTransceiverResponse> {
        let pdu = self.request(Frame::BindTransceiver(request)).await?;
        expect_response(pdu)
    }

    /// Send a request and wait for the PDU answering its sequence number
    async fn request(&self, frame: Frame) -> SmppResult<RawPdu> {
        if self.is_closed() {
            return Err(SmppError::ConnectionClosed);
        }

        let sequence_number = self.next_sequence_number();
        let bytes = frame.with_header(sequence_number, CommandStatus::Ok).to_bytes()?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(sequence_number, tx);

        // close() cancels before draining, so an insert that raced it is caught here
        if self.inner.closed.is_cancelled() || self.enqueue(bytes).is_err() {
            self.inner.pending.lock().remove(&sequence_number);
            return Err(SmppError::ConnectionClosed);
        }

        match timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(pdu)) => Ok(pdu),
            Ok(Err(_)) => Err(SmppError::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().remove(&sequence_number);
                Err(SmppError::Timeout)
            }
        }
    }

    fn enqueue(&self, bytes: Bytes) -> SmppResult<()> {
        self.inner
            .outbound
            .send(WriterCommand::Write(bytes))
            .map_err(|_| SmppError::ConnectionClosed)
    }

    /// Hand a response to whoever is waiting on its sequence number
    fn complete(&self, pdu: RawPdu) {
        let sequence_number = pdu.header.sequence_number;
        let waiter = self.inner.pending.lock().remove(&sequence_number);
        match waiter {
            Some(tx) => {
                // The requester may have timed out in the meantime
                let _ = tx.send(pdu);
            }
            None => debug!(
                session = %self.inner.id,
                sequence_number,
                command_id = pdu.header.command_id,
                "response without a pending request"
            ),
        }
    }

    fn set_state(&self, next: SessionState) {
        {
            let mut state = self.inner.state.lock();
            if *state == next || *state == SessionState::Closed {
                return;
            }
            *state = next;
        }
        self.notify(next);
    }

    fn notify(&self, state: SessionState) {
        debug!(
            session = %self.inner.id,
            system_id = %self.inner.system_id,
            %state,
            "session state changed"
        );
        if let Some(hook) = &self.inner.state_hook {
            hook(&self.inner.id, &self.inner.system_id, state);
        }
    }
}

impl Session for SmppSession {
    async fn send(&self, submit: SubmitSm) -> SmppResult<SubmitResponse> {
        let _permit = self
            .inner
            .send_window
            .acquire()
            .await
            .map_err(|_| SmppError::ConnectionClosed)?;

        let started = Instant::now();
        let pdu = self.request(Frame::SubmitSm(Box::new(submit))).await?;
        let response: SubmitSmResponse = expect_response(pdu)?;

        Ok(SubmitResponse {
            message_id: response.message_id,
            sequence_number: response.sequence_number,
            round_trip: started.elapsed(),
        })
    }

    fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }

        self.inner.closed.cancel();
        self.inner.send_window.close();
        // Queued after any responses already pending, so those still go out
        let _ = self.inner.outbound.send(WriterCommand::Shutdown);

        let abandoned: Vec<_> = self.inner.pending.lock().drain().collect();
        if !abandoned.is_empty() {
            debug!(
                session = %self.inner.id,
                count = abandoned.len(),
                "failing requests still in flight"
            );
        }
        drop(abandoned);

        info!(session = %self.inner.id, "session closed");
        self.notify(SessionState::Closed);
    }

    fn is_closed(&self) -> bool {
        *self.inner.state.lock() == SessionState::Closed
    }
}

/// Check that `pdu` answers a request of type `T` and decode it.
fn expect_response<T: Decodable>(pdu: RawPdu) -> SmppResult<T> {
    let status = pdu.header.status()?;

    if pdu.header.command_id != T::command_id() as u32 {
        if pdu.header.command_id == CommandId::GenericNack as u32 {
            return Err(SmppError::Protocol(status));
        }
        return Err(SmppError::UnexpectedPdu {
            expected: format!("{:?}", T::command_id()),
            actual: format!("{:#010x}", pdu.header.command_id),
        });
    }

    if status != CommandStatus::Ok {
        return Err(SmppError::Protocol(status));
    }

    Ok(pdu.decode()?)
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: FrameWriter<W>,
    mut queue: mpsc::UnboundedReceiver<WriterCommand>,
) {
    while let Some(command) = queue.recv().await {
        match command {
            WriterCommand::Write(pdu) => {
                if let Err(e) = writer.write_pdu(&pdu).await {
                    warn!(error = %e, "write failed");
                    return;
                }
                // Batch whatever is already queued into one flush
                if queue.is_empty() {
                    if let Err(e) = writer.flush().await {
                        warn!(error = %e, "flush failed");
                        return;
                    }
                }
            }
            WriterCommand::Shutdown => break,
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "socket shutdown failed");
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    session: SmppSession,
    mut reader: FrameReader<R>,
    handler: Arc<dyn InboundHandler>,
    request_window: Arc<Semaphore>,
) {
    let closed = session.inner.closed.clone();

    loop {
        let next = tokio::select! {
            _ = closed.cancelled() => break,
            next = reader.read_pdu() => next,
        };

        let pdu = match next {
            Ok(Some(pdu)) => pdu,
            Ok(None) => {
                info!(session = %session.inner.id, "peer closed the connection");
                break;
            }
            Err(e) => {
                warn!(session = %session.inner.id, error = %e, "read failed");
                break;
            }
        };

        if pdu.is_response() {
            session.complete(pdu);
            continue;
        }

        // Stop reading while the handler is saturated
        let permit = tokio::select! {
            _ = closed.cancelled() => break,
            permit = request_window.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let command = InboundContext {
            pdu,
            session: session.clone(),
        };
        let handler = handler.clone();
        tokio::spawn(async move {
            handler.handle(&command);
            drop(permit);
        });
    }

    session.close();
}

/// An inbound request bound to the session it arrived on
struct InboundContext {
    pdu: RawPdu,
    session: SmppSession,
}

impl InboundCommand for InboundContext {
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
        if self.session.is_closed() {
            return Err(SmppError::ConnectionClosed);
        }
        let bytes = response
            .with_header(self.pdu.header.sequence_number, status)
            .to_bytes()?;
        self.session.enqueue(bytes)
    }

    fn close_session(&self) {
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encodable;
    use crate::datatypes::{EnquireLinkResponse, GenericNack};
    use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

    /// Answers enquire_link and records every command id it sees
    #[derive(Default)]
    struct EchoHandler {
        seen: Mutex<Vec<u32>>,
    }

    impl InboundHandler for EchoHandler {
        fn handle(&self, command: &dyn InboundCommand) {
            self.seen.lock().push(command.command_id());
            if let Ok(request) = command.enquire_link() {
                let response = Frame::EnquireLinkResp(request.response());
                command.respond(response, CommandStatus::Ok).unwrap();
            }
        }
    }

    struct Peer {
        reader: FrameReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Peer {
        async fn send(&mut self, bytes: Bytes) {
            self.writer.write_all(&bytes).await.unwrap();
        }

        async fn recv(&mut self) -> Option<RawPdu> {
            self.reader.read_pdu().await.unwrap()
        }
    }

    fn connect(handler: Arc<EchoHandler>, timeout: Duration) -> (SmppSession, Peer) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let (read, write) = tokio::io::split(local);
        let config = SessionConfig::new(handler).with_request_timeout(timeout);
        let session = SmppSession::spawn(read, write, "esme", &config);

        let (peer_read, peer_write) = tokio::io::split(remote);
        let peer = Peer {
            reader: FrameReader::new(peer_read),
            writer: peer_write,
        };
        (session, peer)
    }

    #[tokio::test]
    async fn submit_is_matched_to_its_response() {
        let (session, mut peer) = connect(Arc::default(), Duration::from_secs(5));

        let sender = session.clone();
        let send = tokio::spawn(async move { sender.send(SubmitSm::new("A", "B", "hi")).await });

        let request = peer.recv().await.unwrap();
        assert_eq!(request.header.command_id, CommandId::SubmitSm as u32);
        let submit: SubmitSm = request.decode().unwrap();
        assert_eq!(submit.destination_addr, "B");

        let response = SubmitSmResponse {
            command_status: CommandStatus::Ok,
            sequence_number: request.header.sequence_number,
            message_id: "abc".to_string(),
        };
        peer.send(response.to_bytes().unwrap()).await;

        let response = send.await.unwrap().unwrap();
        assert_eq!(response.message_id, "abc");
    }

    #[tokio::test]
    async fn generic_nack_fails_the_request() {
        let (session, mut peer) = connect(Arc::default(), Duration::from_secs(5));

        let sender = session.clone();
        let send = tokio::spawn(async move { sender.send(SubmitSm::new("A", "B", "hi")).await });

        let request = peer.recv().await.unwrap();
        let nack = GenericNack::new(CommandStatus::SystemError, request.header.sequence_number);
        peer.send(nack.to_bytes().unwrap()).await;

        assert!(matches!(
            send.await.unwrap(),
            Err(SmppError::Protocol(CommandStatus::SystemError))
        ));
    }

    #[tokio::test]
    async fn inbound_request_is_answered_with_its_sequence_number() {
        let handler = Arc::new(EchoHandler::default());
        let (_session, mut peer) = connect(handler.clone(), Duration::from_secs(5));

        peer.send(EnquireLink::new(42).to_bytes().unwrap()).await;

        let reply = peer.recv().await.unwrap();
        let response: EnquireLinkResponse = reply.decode().unwrap();
        assert_eq!(response.sequence_number, 42);
        assert_eq!(*handler.seen.lock(), vec![CommandId::EnquireLink as u32]);
    }

    #[tokio::test]
    async fn close_fails_in_flight_and_later_sends() {
        let (session, mut peer) = connect(Arc::default(), Duration::from_secs(30));

        let sender = session.clone();
        let send = tokio::spawn(async move { sender.send(SubmitSm::new("A", "B", "hi")).await });

        // Wait until the request is on the wire, then close without answering
        peer.recv().await.unwrap();
        session.close();

        assert!(matches!(
            send.await.unwrap(),
            Err(SmppError::ConnectionClosed)
        ));
        assert!(matches!(
            session.send(SubmitSm::new("A", "B", "again")).await,
            Err(SmppError::ConnectionClosed)
        ));

        // The writer shuts the socket down once the queue drains
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn peer_hangup_closes_the_session() {
        let states = Arc::new(Mutex::new(Vec::new()));
        let recorded = states.clone();

        let (local, remote) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(local);
        let config = SessionConfig::new(Arc::new(EchoHandler::default()))
            .with_state_hook(move |_, system_id, state| {
                assert_eq!(system_id, "esme");
                recorded.lock().push(state);
            });
        let session = SmppSession::spawn(read, write, "esme", &config);

        drop(remote);
        while !session.is_closed() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            *states.lock(),
            vec![SessionState::Open, SessionState::Closed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let (session, mut peer) = connect(Arc::default(), Duration::from_secs(10));

        let sender = session.clone();
        let send = tokio::spawn(async move { sender.send(SubmitSm::new("A", "B", "hi")).await });
        peer.recv().await.unwrap();

        assert!(matches!(send.await.unwrap(), Err(SmppError::Timeout)));
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn sequence_numbers_wrap_before_the_sign_bit() {
        let (session, _peer) = connect(Arc::default(), Duration::from_secs(1));
        session
            .inner
            .sequence
            .store(MAX_SEQUENCE_NUMBER - 1, Ordering::Relaxed);

        assert_eq!(session.next_sequence_number(), MAX_SEQUENCE_NUMBER);
        assert_eq!(session.next_sequence_number(), 1);
    }
}
