// ABOUTME: Error types for the SMPP session engine: transport, codec, protocol and bind failures
// ABOUTME: BindFailure carries the half-open session a failed bind may leave behind

use crate::codec::CodecError;
use crate::datatypes::CommandStatus;
use std::fmt;
use std::io;
use thiserror::Error;

/// Error type for SMPP session operations
#[derive(Debug, Error)]
pub enum SmppError {
    /// I/O error during network operations (connection, read, write)
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// A PDU could not be framed, encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// SMPP protocol error indicated by command_status field
    #[error("Protocol error: {0:?}")]
    Protocol(CommandStatus),

    /// No response inside the request timeout
    #[error("Operation timeout")]
    Timeout,

    /// Unexpected PDU received (wrong response type for request)
    #[error("Unexpected PDU: expected {expected}, got {actual}")]
    UnexpectedPdu { expected: String, actual: String },

    /// The session was closed, locally or by the peer
    #[error("Connection closed")]
    ConnectionClosed,

    /// Session not in correct state for operation
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Result type alias for SMPP operations
pub type SmppResult<T> = Result<T, SmppError>;

/// Failure to answer an inbound command at the transport layer
pub type RespondError = SmppError;

/// A bind attempt that did not produce a usable session.
///
/// The connect or handshake may have got far enough to open a socket; that
/// handle is returned in `partial` and must be closed by the caller.
pub struct BindFailure<S> {
    pub error: SmppError,
    pub partial: Option<S>,
}

impl<S> BindFailure<S> {
    /// Failed before any connection existed
    pub fn new(error: impl Into<SmppError>) -> Self {
        BindFailure {
            error: error.into(),
            partial: None,
        }
    }

    /// Failed with a half-open session left behind
    pub fn with_partial(error: impl Into<SmppError>, partial: S) -> Self {
        BindFailure {
            error: error.into(),
            partial: Some(partial),
        }
    }
}

impl<S> fmt::Debug for BindFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindFailure")
            .field("error", &self.error)
            .field("partial", &self.partial.is_some())
            .finish()
    }
}

impl<S> fmt::Display for BindFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bind failed: {}", self.error)
    }
}

impl<S> std::error::Error for BindFailure<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
