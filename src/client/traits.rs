// ABOUTME: Traits at the seam between the load-test core and the SMPP protocol engine
// ABOUTME: The core only sees ProtocolEngine, Session and InboundCommand, so tests can swap the transport

use crate::client::error::{BindFailure, RespondError, SmppResult};
use crate::client::types::{BindConfig, SessionConfig, SubmitResponse};
use crate::codec::{CodecError, Frame};
use crate::datatypes::{CommandStatus, DeliverSm, EnquireLink, SubmitSm, Unbind};
use std::future::Future;

/// Something that can open bound sessions.
///
/// Owns transport, framing and the bind handshake.
pub trait ProtocolEngine: Send + Sync + 'static {
    type Session: Session;

    /// Connect and bind as transceiver.
    ///
    /// A failure may still carry a half-open session which the caller is
    /// expected to close.
    fn bind(
        &self,
        bind: BindConfig,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<Self::Session, BindFailure<Self::Session>>> + Send;
}

/// A bound session, shared by the submission loop and the inbound handler.
///
/// Clones refer to the same session. After `close` every `send` fails with
/// `SmppError::ConnectionClosed`.
pub trait Session: Clone + Send + Sync + 'static {
    /// Submit one message and wait for its response or the request timeout
    fn send(&self, submit: SubmitSm) -> impl Future<Output = SmppResult<SubmitResponse>> + Send;

    /// Close the session. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// One inbound request as handed to an `InboundHandler`.
///
/// The typed accessors decode the body on demand and fail if it does not
/// match the command id.
pub trait InboundCommand: Send + Sync {
    /// Raw command_id, which may not be one we know
    fn command_id(&self) -> u32;

    fn sequence_number(&self) -> u32;

    fn deliver_sm(&self) -> Result<DeliverSm, CodecError>;

    fn unbind(&self) -> Result<Unbind, CodecError>;

    fn enquire_link(&self) -> Result<EnquireLink, CodecError>;

    /// Queue `response` for the peer under this command's sequence number
    fn respond(&self, response: Frame, status: CommandStatus) -> Result<(), RespondError>;

    /// Close the session this command arrived on
    fn close_session(&self);
}

/// Receives every inbound request for the lifetime of a session.
///
/// May be called from several tasks at once.
pub trait InboundHandler: Send + Sync {
    fn handle(&self, command: &dyn InboundCommand);
}
