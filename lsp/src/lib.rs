//! Language server session client.
//!
//! Supervises one JSON-RPC session with an externally launched language
//! server, keeps the server's view of open documents in sync with the editor,
//! and turns `publishDiagnostics` into [`Diagnostic`]s for the consumer.

pub mod codec;
pub mod config;
pub mod failure;
pub mod transport;
pub mod types;
pub mod uri;

pub(crate) mod diagnostics;
pub(crate) mod protocol;

mod client;
mod process;

pub use client::LspClient;
pub use config::{ClientConfig, ServerConfig, ServerConfigError};
pub use process::StdioTransport;
pub use transport::{
    Channel, SessionInfo, SessionStatus, Transport, TransportError, TransportEvent,
};
pub use types::{ClientSink, Diagnostic, DiagnosticSeverity, OutputEntry, OutputLevel};
