//! SMPP v3.4 load tester.
//!
//! Binds to an SMSC as a transceiver, submits every row of a CSV file once
//! the bind succeeds, and answers the SMSC's own requests (deliver_sm,
//! enquire_link, unbind) for as long as the session lives.
//!
//! * `datatypes` / `codec` / `connection` - the PDUs and their wire framing
//! * `client` - the session engine, behind the `ProtocolEngine` and `Session` traits
//! * `loadtest` - bind supervision, inbound dispatch, submission and the operator shell
//!
//! ```rust,no_run
//! use smpp_loadtest::client::TcpEngine;
//! use smpp_loadtest::config::{CliArgs, LoadTestConfig};
//! use smpp_loadtest::loadtest::{run_load_test, CommandDispatcher, InboundMessageCounter};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoadTestConfig::from(argh::from_env::<CliArgs>());
//! let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(InboundMessageCounter::new())));
//! let supervisor = Arc::new(config.supervisor(TcpEngine, config.session_config(dispatcher)));
//!
//! let stdin = std::io::BufReader::new(std::io::stdin());
//! run_load_test(supervisor, config.pipeline(), stdin, std::io::stdout()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod datatypes;
pub mod loadtest;

pub(crate) mod macros;


// Re-export codec types for direct access
pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader, RawPdu};

// Re-export the main client API for easy access
pub use client::{
    BindConfig, ProtocolEngine, Session, SessionConfig, SmppError, SmppResult, TcpEngine,
};
