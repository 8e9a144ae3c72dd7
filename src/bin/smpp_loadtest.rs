// ABOUTME: Command-line entry point: parse flags, install logging and run the load test against an SMSC
// ABOUTME: Exits non-zero when the record file is unusable, zero when the operator quits

use smpp_loadtest::client::TcpEngine;
use smpp_loadtest::config::{CliArgs, LoadTestConfig};
use smpp_loadtest::loadtest::{
    run_load_test, CommandDispatcher, InboundMessageCounter, LoadTestError,
};
use std::io::{self, BufReader};
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli_args: CliArgs = argh::from_env();
    let config = LoadTestConfig::from(cli_args);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directives()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        addr = %config.bind.addr,
        system_id = %config.bind.system_id,
        system_type = %config.bind.system_type,
        timeout_secs = config.request_timeout.as_secs(),
        sms_file = %config.sms_file.display(),
        "starting smpp load test"
    );

    let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(InboundMessageCounter::new())));
    let session_config = config
        .session_config(dispatcher.clone())
        .with_state_hook(|session_id, system_id, state| {
            info!(session_id, system_id, %state, "session state");
        });
    let supervisor = Arc::new(config.supervisor(TcpEngine, session_config));

    let stdin = BufReader::new(io::stdin());
    match run_load_test(supervisor, config.pipeline(), stdin, io::stdout()).await {
        Ok(_) => {
            info!(stats = ?dispatcher.stats(), "inbound traffic handled");
        }
        Err(LoadTestError::Input(e)) => {
            error!(error = %e, "cannot load sms file");
            process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "load test failed");
            process::exit(1);
        }
    }
}
