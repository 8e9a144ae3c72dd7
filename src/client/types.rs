// ABOUTME: Configuration and result types shared by the SMPP engine and its callers
// ABOUTME: BindConfig and SessionConfig describe a bind attempt; SessionState feeds the state hook

use crate::client::traits::InboundHandler;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Credentials and address for a transceiver bind
///
/// Cloned into every bind attempt; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindConfig {
    /// System identifier for authentication
    pub system_id: String,
    /// Password for authentication
    pub password: String,
    /// System type sent in the bind
    pub system_type: String,
    /// SMSC address as `host:port`
    pub addr: String,
}

impl BindConfig {
    pub fn new(
        addr: impl Into<String>,
        system_id: impl Into<String>,
        password: impl Into<String>,
        system_type: impl Into<String>,
    ) -> Self {
        Self {
            system_id: system_id.into(),
            password: password.into(),
            system_type: system_type.into(),
            addr: addr.into(),
        }
    }
}

/// Lifecycle states reported through the state hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// TCP connected, bind not yet accepted
    Open,
    /// Bound as transceiver
    BoundTrx,
    /// Closed locally or by the peer
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Open => "OPEN",
            SessionState::BoundTrx => "BOUND_TRX",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Called as `(session_id, system_id, state)` on every state transition
pub type StateHook = Arc<dyn Fn(&str, &str, SessionState) + Send + Sync>;

/// Session settings shared read-only by every bind attempt
#[derive(Clone)]
pub struct SessionConfig {
    /// Outbound requests allowed in flight at once
    pub send_window_size: usize,
    /// Inbound requests handled concurrently before the reader stalls
    pub request_window_size: usize,
    /// Bound on connect, bind and each outbound request
    pub request_timeout: Duration,
    pub handler: Arc<dyn InboundHandler>,
    pub state_hook: Option<StateHook>,
}

impl SessionConfig {
    pub const DEFAULT_WINDOW_SIZE: usize = 10_000;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(handler: Arc<dyn InboundHandler>) -> Self {
        Self {
            send_window_size: Self::DEFAULT_WINDOW_SIZE,
            request_window_size: Self::DEFAULT_WINDOW_SIZE,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            handler,
            state_hook: None,
        }
    }

    pub fn with_windows(mut self, send_window_size: usize, request_window_size: usize) -> Self {
        self.send_window_size = send_window_size;
        self.request_window_size = request_window_size;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_state_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str, SessionState) + Send + Sync + 'static,
    {
        self.state_hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("send_window_size", &self.send_window_size)
            .field("request_window_size", &self.request_window_size)
            .field("request_timeout", &self.request_timeout)
            .field("state_hook", &self.state_hook.is_some())
            .finish_non_exhaustive()
    }
}

/// What a successful submit_sm round trip returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    /// Message id assigned by the SMSC
    pub message_id: String,
    pub sequence_number: u32,
    /// Time from queueing the request to receiving its response
    pub round_trip: Duration,
}
