//! Boundary between the client and whatever actually runs the server.
//!
//! The client never touches processes or pipes. It asks a [`Transport`] to
//! start, feed and terminate sessions, and receives [`TransportEvent`]s back
//! through [`crate::LspClient::handle_message`].

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// A transport failure, carried as the transport's own wording.
///
/// The text is what [`crate::failure::is_dead_session`] inspects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Lifecycle state of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Disconnected,
    Closed,
}

/// Descriptor returned by [`Transport::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub server: String,
    pub root_path: String,
    pub status: SessionStatus,
}

/// Stream an inbound event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// One framed JSON-RPC payload.
    Stdout,
    /// One trimmed line of server stderr.
    Stderr,
    /// Transport-level notice (read failures and the like).
    System,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::System => "system",
        })
    }
}

/// Inbound delivery from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportEvent {
    pub session_id: String,
    pub channel: Channel,
    pub payload: String,
    pub is_error: bool,
}

impl TransportEvent {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        channel: Channel,
        payload: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            channel,
            payload: payload.into(),
            is_error,
        }
    }
}

/// Process/transport manager the client drives.
pub trait Transport {
    /// Launch `server` with `args` under `root`.
    fn start(
        &mut self,
        server: &str,
        args: &[String],
        root: &str,
    ) -> impl Future<Output = Result<SessionInfo, TransportError>> + Send;

    /// Deliver one UTF-8 payload to the session.
    fn send(
        &mut self,
        session_id: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Terminate the session. Unknown ids are not an error.
    fn terminate(
        &mut self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
