// ABOUTME: In-memory ProtocolEngine and Session used by the load-test unit tests
// ABOUTME: Bind results are scripted per attempt and every submit is recorded

use crate::client::{
    BindConfig, BindFailure, ProtocolEngine, Session, SessionConfig, SmppError, SmppResult,
    SubmitResponse,
};
use crate::datatypes::{CommandStatus, SubmitSm};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Default)]
pub(crate) struct MockSession {
    inner: Arc<MockSessionInner>,
}

#[derive(Default)]
struct MockSessionInner {
    sent: Mutex<Vec<SubmitSm>>,
    rejected: Mutex<HashSet<usize>>,
    closed: AtomicBool,
}

impl MockSession {
    /// Reject the sends at these zero-based positions with SubmitFailed
    pub(crate) fn rejecting(positions: impl IntoIterator<Item = usize>) -> Self {
        let session = MockSession::default();
        session.inner.rejected.lock().extend(positions);
        session
    }

    pub(crate) fn sent(&self) -> Vec<SubmitSm> {
        self.inner.sent.lock().clone()
    }
}

impl Session for MockSession {
    async fn send(&self, submit: SubmitSm) -> SmppResult<SubmitResponse> {
        if self.is_closed() {
            return Err(SmppError::ConnectionClosed);
        }

        let position = {
            let mut sent = self.inner.sent.lock();
            sent.push(submit);
            sent.len() - 1
        };
        if self.inner.rejected.lock().contains(&position) {
            return Err(SmppError::Protocol(CommandStatus::SubmitFailed));
        }

        Ok(SubmitResponse {
            message_id: format!("mock-{position}"),
            sequence_number: position as u32 + 1,
            round_trip: Duration::ZERO,
        })
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BindStep {
    Refuse,
    FailWithPartial,
    Succeed,
}

/// Plays back `BindStep`s, refusing once the script runs out
#[derive(Default)]
pub(crate) struct MockEngine {
    script: Mutex<VecDeque<BindStep>>,
    attempts: Mutex<Vec<Instant>>,
    sessions: Mutex<Vec<MockSession>>,
    session_template: Mutex<Option<MockSession>>,
}

impl MockEngine {
    pub(crate) fn scripted(steps: impl IntoIterator<Item = BindStep>) -> Self {
        let engine = MockEngine::default();
        engine.script.lock().extend(steps);
        engine
    }

    /// Hand out `session` on the successful bind
    pub(crate) fn with_session(self, session: MockSession) -> Self {
        *self.session_template.lock() = Some(session);
        self
    }

    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    /// Every session handed out, partial ones included
    pub(crate) fn sessions(&self) -> Vec<MockSession> {
        self.sessions.lock().clone()
    }

    fn new_session(&self) -> MockSession {
        let session = self.session_template.lock().take().unwrap_or_default();
        self.sessions.lock().push(session.clone());
        session
    }
}

impl ProtocolEngine for MockEngine {
    type Session = MockSession;

    async fn bind(
        &self,
        _bind: BindConfig,
        _config: &SessionConfig,
    ) -> Result<MockSession, BindFailure<MockSession>> {
        self.attempts.lock().push(Instant::now());

        let step = self.script.lock().pop_front().unwrap_or(BindStep::Refuse);
        match step {
            BindStep::Refuse => Err(BindFailure::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            BindStep::FailWithPartial => {
                let partial = MockSession::default();
                self.sessions.lock().push(partial.clone());
                Err(BindFailure::with_partial(
                    SmppError::Protocol(CommandStatus::BindFailed),
                    partial,
                ))
            }
            BindStep::Succeed => Ok(self.new_session()),
        }
    }
}
