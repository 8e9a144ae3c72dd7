// ABOUTME: Retries the bind on a fixed interval until one succeeds, then runs the submission pipeline once
// ABOUTME: The retry schedule is cancelled on the first successful bind and never re-armed

use crate::client::{BindConfig, ProtocolEngine, Session, SessionConfig};
use crate::loadtest::error::InputFileError;
use crate::loadtest::metrics::SubmissionSummary;
use crate::loadtest::pipeline::SubmissionPipeline;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How a supervisor run ended
#[derive(Debug, Default)]
pub struct SupervisorReport {
    /// Bind attempts made, successful one included
    pub attempts: u32,
    pub failed_attempts: u32,
    /// `None` if the schedule was cancelled before any bind succeeded
    pub submission: Option<Result<SubmissionSummary, InputFileError>>,
}

pub struct ConnectionSupervisor<E: ProtocolEngine> {
    engine: E,
    bind: BindConfig,
    session_config: SessionConfig,
    retry_interval: Duration,
    settle_delay: Duration,
    schedule: CancellationToken,
    session: Mutex<Option<E::Session>>,
}

impl<E: ProtocolEngine> ConnectionSupervisor<E> {
    pub fn new(engine: E, bind: BindConfig, session_config: SessionConfig) -> Self {
        Self {
            engine,
            bind,
            session_config,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            schedule: CancellationToken::new(),
            session: Mutex::new(None),
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The bound session, once there is one. It stays here after the
    /// submission finishes so inbound traffic keeps being answered.
    pub fn session(&self) -> Option<E::Session> {
        self.session.lock().clone()
    }

    /// Cancelled once the first bind succeeds
    pub fn schedule(&self) -> &CancellationToken {
        &self.schedule
    }

    /// Tick every `retry_interval`, binding until one attempt succeeds.
    ///
    /// The first attempt happens one interval after the call. On success the
    /// pipeline runs to completion and the schedule is cancelled; whatever the
    /// pipeline reports, no further bind is attempted.
    pub async fn run(&self, pipeline: &SubmissionPipeline) -> SupervisorReport {
        let mut report = SupervisorReport::default();
        if self.schedule.is_cancelled() {
            return report;
        }

        let mut ticker = interval_at(Instant::now() + self.retry_interval, self.retry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.schedule.cancelled() => {
                    debug!("retry schedule cancelled");
                    return report;
                }
                _ = ticker.tick() => {}
            }

            report.attempts += 1;
            info!(
                attempt = report.attempts,
                addr = %self.bind.addr,
                system_id = %self.bind.system_id,
                "connecting to smpp server"
            );

            let session = match self.engine.bind(self.bind.clone(), &self.session_config).await {
                Ok(session) => session,
                Err(failure) => {
                    report.failed_attempts += 1;
                    warn!(
                        attempt = report.attempts,
                        error = %failure.error,
                        retry_in = ?self.retry_interval,
                        "bind failed"
                    );
                    // Don't leak a half-open connection into the next attempt
                    if let Some(partial) = failure.partial {
                        partial.close();
                    }
                    continue;
                }
            };

            info!(attempt = report.attempts, "connected to smpp server, preparing sms");
            *self.session.lock() = Some(session.clone());

            tokio::time::sleep(self.settle_delay).await;
            report.submission = Some(pipeline.run(&session).await);

            self.schedule.cancel();
            return report;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadtest::dispatcher::CommandDispatcher;
    use crate::loadtest::metrics::InboundMessageCounter;
    use crate::loadtest::pipeline::RecordSource;
    use crate::loadtest::testing::{BindStep, MockEngine, MockSession};
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn supervisor(engine: MockEngine) -> ConnectionSupervisor<MockEngine> {
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(InboundMessageCounter::new())));
        ConnectionSupervisor::new(
            engine,
            BindConfig::new("127.0.0.1:2775", "esme", "password", "smpp"),
            SessionConfig::new(dispatcher),
        )
        .with_retry_interval(INTERVAL)
        .with_settle_delay(Duration::from_secs(1))
    }

    fn inline(text: &str) -> SubmissionPipeline {
        SubmissionPipeline::new(RecordSource::Inline(text.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_bind_succeeds_then_stops() {
        let started = Instant::now();
        let session = MockSession::default();
        let supervisor = supervisor(
            MockEngine::scripted([BindStep::Refuse, BindStep::Refuse, BindStep::Succeed])
                .with_session(session.clone()),
        );

        let report = supervisor.run(&inline("A,B,hello")).await;

        assert_eq!(report.attempts, 3);
        assert_eq!(report.failed_attempts, 2);
        let summary = report.submission.unwrap().unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(session.sent().len(), 1);

        // Attempts at 5s, 10s and 15s
        let offsets: Vec<_> = supervisor
            .engine()
            .attempts()
            .into_iter()
            .map(|at| at - started)
            .collect();
        assert_eq!(offsets, vec![INTERVAL, INTERVAL * 2, INTERVAL * 3]);
        assert!(supervisor.schedule().is_cancelled());

        // Nothing fires after the handoff
        tokio::time::sleep(INTERVAL * 4).await;
        assert_eq!(supervisor.engine().attempts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_waits_for_the_settle_delay() {
        let started = Instant::now();
        let session = MockSession::default();
        let supervisor =
            supervisor(MockEngine::scripted([BindStep::Succeed]).with_session(session.clone()));

        let report = supervisor.run(&inline("A,B,hello")).await;

        assert_eq!(report.attempts, 1);
        assert!(started.elapsed() >= INTERVAL + Duration::from_secs(1));
        assert!(supervisor.session().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_session_is_closed_before_retrying() {
        let supervisor = supervisor(MockEngine::scripted([
            BindStep::FailWithPartial,
            BindStep::Succeed,
        ]));

        let report = supervisor.run(&inline("A,B,hello")).await;

        assert_eq!(report.failed_attempts, 1);
        let sessions = supervisor.engine().sessions();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].is_closed());
        assert!(!sessions[1].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_does_not_rearm_retries() {
        let supervisor = supervisor(MockEngine::scripted([BindStep::Succeed, BindStep::Succeed]));

        let report = supervisor.run(&inline("A,B")).await;

        assert!(matches!(
            report.submission,
            Some(Err(InputFileError::FieldCount { .. }))
        ));
        assert_eq!(report.attempts, 1);
        assert!(supervisor.schedule().is_cancelled());

        // A second run returns straight away
        let again = supervisor.run(&inline("A,B,hello")).await;
        assert_eq!(again.attempts, 0);
        assert_eq!(supervisor.engine().attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_schedule_ends_without_binding() {
        let supervisor = supervisor(MockEngine::scripted([]));
        supervisor.schedule().cancel();

        let report = supervisor.run(&inline("A,B,hello")).await;

        assert_eq!(report.attempts, 0);
        assert!(report.submission.is_none());
        assert!(supervisor.session().is_none());
    }
}
