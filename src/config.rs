// ABOUTME: Command-line flags for the load tester and the settings derived from them
// ABOUTME: Every flag has a default, so running with no arguments targets a local SMSC

use crate::client::{BindConfig, InboundHandler, ProtocolEngine, SessionConfig};
use crate::loadtest::supervisor::{DEFAULT_RETRY_INTERVAL, DEFAULT_SETTLE_DELAY};
use crate::loadtest::{ConnectionSupervisor, SubmissionPipeline};
use argh::FromArgs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// SMPP load tester: binds as transceiver and submits every row of a CSV file
#[derive(FromArgs, Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// the SMSC address as host:port (default: 127.0.0.1:2775)
    #[argh(option, default = "String::from(\"127.0.0.1:2775\")")]
    pub addr: String,

    /// the system id (default: esme)
    #[argh(option, default = "String::from(\"esme\")")]
    pub system_id: String,

    /// the password (default: password)
    #[argh(option, default = "String::from(\"password\")")]
    pub password: String,

    /// the system type (default: smpp)
    #[argh(option, default = "String::from(\"smpp\")")]
    pub system_type: String,

    /// connect, bind and per-request timeout in seconds (default: 10)
    #[argh(option, default = "10")]
    pub timeout: u64,

    /// the CSV file of source,destination,message rows (default: sms.csv)
    #[argh(option, default = "PathBuf::from(\"sms.csv\")")]
    pub sms_file: PathBuf,

    /// log protocol engine activity below error level (default: true)
    #[argh(option, default = "true")]
    pub smpp_debug: bool,
}

/// Everything a load-test run needs, resolved from `CliArgs`
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestConfig {
    pub bind: BindConfig,
    pub request_timeout: Duration,
    pub sms_file: PathBuf,
    pub smpp_debug: bool,
    pub send_window_size: usize,
    pub request_window_size: usize,
    pub retry_interval: Duration,
    pub settle_delay: Duration,
}

impl From<CliArgs> for LoadTestConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            bind: BindConfig::new(args.addr, args.system_id, args.password, args.system_type),
            request_timeout: Duration::from_secs(args.timeout),
            sms_file: args.sms_file,
            smpp_debug: args.smpp_debug,
            send_window_size: SessionConfig::DEFAULT_WINDOW_SIZE,
            request_window_size: SessionConfig::DEFAULT_WINDOW_SIZE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl LoadTestConfig {
    pub fn session_config(&self, handler: Arc<dyn InboundHandler>) -> SessionConfig {
        SessionConfig::new(handler)
            .with_windows(self.send_window_size, self.request_window_size)
            .with_request_timeout(self.request_timeout)
    }

    pub fn supervisor<E: ProtocolEngine>(
        &self,
        engine: E,
        session_config: SessionConfig,
    ) -> ConnectionSupervisor<E> {
        ConnectionSupervisor::new(engine, self.bind.clone(), session_config)
            .with_retry_interval(self.retry_interval)
            .with_settle_delay(self.settle_delay)
    }

    pub fn pipeline(&self) -> SubmissionPipeline {
        SubmissionPipeline::from_file(&self.sms_file)
    }

    /// `EnvFilter` directives. Without smpp debug the engine only logs errors;
    /// the load-test core stays at debug either way.
    pub fn log_directives(&self) -> String {
        if self.smpp_debug {
            "debug".to_string()
        } else {
            let crate_name = env!("CARGO_CRATE_NAME");
            format!("debug,{crate_name}::client=error,{crate_name}::connection=error")
        }
    }
}
