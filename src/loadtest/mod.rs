// ABOUTME: Load-test core: bind supervision, inbound dispatch, record submission and the operator shell
// ABOUTME: run_load_test wires them together and returns when the operator quits or the input is unusable

//! Load-test orchestration.
//!
//! Two things run side by side once started: the `ConnectionSupervisor`
//! (bind, then submit the whole record file once) and the operator shell.
//! Inbound traffic is answered by the `CommandDispatcher` installed in the
//! `SessionConfig`, independently of both.

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod shell;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{CommandDispatcher, Dispatch, ACCEPTED};
pub use error::{InputFileError, LoadTestError, MalformedInboundError};
pub use metrics::{
    DispatchSnapshot, InboundMessageCounter, SubmissionOutcome, SubmissionSummary,
};
pub use pipeline::{load_records, submit_all, RecordSource, SubmissionPipeline, SubmissionRecord};
pub use shell::{InteractiveShell, ShellExit};
pub use supervisor::{ConnectionSupervisor, SupervisorReport};

use crate::client::{ProtocolEngine, Session};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Run the supervisor in the background and the shell in the foreground.
///
/// Returns when the shell exits. The session is left as it is: quitting does
/// not close it. An unusable input file ends the run with
/// `LoadTestError::Input` as soon as the supervisor reports it.
pub async fn run_load_test<E, R, W>(
    supervisor: Arc<ConnectionSupervisor<E>>,
    pipeline: SubmissionPipeline,
    input: R,
    output: W,
) -> Result<ShellExit, LoadTestError>
where
    E: ProtocolEngine,
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let runner = supervisor.clone();
    let mut supervisor_task = tokio::spawn(async move { runner.run(&pipeline).await });
    let mut shell_task =
        tokio::task::spawn_blocking(move || InteractiveShell::new(input, output).run());
    let mut supervising = true;

    loop {
        tokio::select! {
            shell = &mut shell_task => {
                let exit = shell.map_err(|source| LoadTestError::Task { task: "shell", source })??;
                info!(?exit, "exiting");
                if let Some(session) = supervisor.session() {
                    debug!(closed = session.is_closed(), "leaving session open");
                }
                return Ok(exit);
            }
            report = &mut supervisor_task, if supervising => {
                supervising = false;
                let report = report
                    .map_err(|source| LoadTestError::Task { task: "supervisor", source })?;
                match report.submission {
                    Some(Ok(summary)) => info!(
                        attempts = report.attempts,
                        sent = summary.attempted,
                        failed = summary.failed,
                        elapsed_ms = summary.elapsed.as_millis() as u64,
                        "load test finished, still answering inbound traffic"
                    ),
                    Some(Err(e)) => return Err(e.into()),
                    None => debug!("supervisor stopped before binding"),
                }
            }
        }
    }
}
