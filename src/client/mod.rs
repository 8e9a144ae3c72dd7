// ABOUTME: SMPP session engine behind trait seams: bind, submit, close and inbound request delivery
// ABOUTME: Exports the traits, configuration types, errors and the TCP implementation

//! SMPP Client Module
//!
//! The load-test core talks to the SMSC through three traits:
//!
//! * `ProtocolEngine` - opens a bound transceiver session
//! * `Session` - submits messages and closes the session
//! * `InboundCommand` / `InboundHandler` - requests initiated by the SMSC
//!
//! `TcpEngine` implements them over TCP. Inbound requests are handed to the
//! handler from their own task, so a handler must tolerate concurrent calls.
//!
//! ```rust,no_run
//! use smpp_loadtest::client::{
//!     BindConfig, InboundCommand, InboundHandler, ProtocolEngine, Session, SessionConfig, TcpEngine,
//! };
//! use smpp_loadtest::datatypes::SubmitSm;
//! use std::sync::Arc;
//!
//! struct Ignore;
//!
//! impl InboundHandler for Ignore {
//!     fn handle(&self, _command: &dyn InboundCommand) {}
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bind = BindConfig::new("localhost:2775", "system_id", "password", "smpp");
//! let config = SessionConfig::new(Arc::new(Ignore));
//!
//! let session = TcpEngine.bind(bind, &config).await.map_err(|failure| failure.error)?;
//! let response = session.send(SubmitSm::new("123456789", "987654321", "Hello!")).await?;
//! println!("accepted as {}", response.message_id);
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod session;
pub mod traits;
pub mod types;

// Re-export the main types for easy access
pub use error::{BindFailure, RespondError, SmppError, SmppResult};
pub use session::{SmppSession, TcpEngine};
pub use traits::{InboundCommand, InboundHandler, ProtocolEngine, Session};
pub use types::{BindConfig, SessionConfig, SessionState, StateHook, SubmitResponse};
