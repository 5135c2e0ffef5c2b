//! `LspClient`, the consumer-facing session client.
//!
//! One instance owns at most one live session. The consumer drives it with
//! [`LspClient::ensure_started`], [`LspClient::sync_document`],
//! [`LspClient::close_document`] and [`LspClient::stop`], and feeds every
//! transport event into [`LspClient::handle_message`]. Results come back
//! through the [`ClientSink`] given at construction.
//!
//! Session lifecycle:
//!
//! ```text
//! idle --ensure_started(ok)--> ready --stop()--> idle
//! ready --ensure_started(other root)--> stop() --> ready | idle
//! ready --dead session detected--> disconnected (root kept)
//! disconnected --ensure_started--> ready | idle
//! ```

mod dispatch;
mod documents;

#[cfg(test)]
mod fake;

use std::collections::HashSet;

use crate::config::ClientConfig;
use crate::protocol;
use crate::transport::{SessionInfo, Transport, TransportError};
use crate::types::{ClientSink, OutputEntry, OutputLevel};
use crate::uri;

pub struct LspClient<T, S> {
    config: ClientConfig,
    transport: T,
    sink: S,
    /// Present exactly while a session is live.
    session: Option<SessionInfo>,
    /// Survives disconnect so a restart can reuse it; cleared by `stop()` and
    /// by a failed launch.
    workspace_root: Option<String>,
    /// Id of the outstanding `initialize` request, if any.
    pending_initialize: Option<u64>,
    /// Never reset, not even across restarts.
    next_request_id: u64,
    /// Paths with a successful `didOpen` in the current session.
    open_documents: HashSet<String>,
}

impl<T: Transport, S: ClientSink> LspClient<T, S> {
    #[must_use]
    pub fn new(config: ClientConfig, transport: T, sink: S) -> Self {
        Self {
            config,
            transport,
            sink,
            session: None,
            workspace_root: None,
            pending_initialize: None,
            next_request_id: 1,
            open_documents: HashSet::new(),
        }
    }

    /// Make sure a session bound to `workspace_root` is running.
    ///
    /// Returns `true` when a session is ready (already or newly started).
    /// A session bound to another root is stopped first. Launch failures are
    /// reported through the sink and yield `false`.
    pub async fn ensure_started(&mut self, workspace_root: &str) -> bool {
        if self.session.is_some() {
            if self.workspace_root.as_deref() == Some(workspace_root) {
                return true;
            }
            tracing::info!(
                from = ?self.workspace_root,
                to = %workspace_root,
                "Workspace root changed, restarting LSP session"
            );
            self.stop().await;
        }

        let server = self.config.server().command().to_string();
        match self.launch(workspace_root).await {
            Ok(session_id) => {
                self.emit(
                    OutputLevel::Info,
                    format!("Started {server} for {workspace_root}"),
                    Some(format!("lsp-started:{session_id}")),
                );
                true
            }
            Err(e) => {
                self.reset_session();
                self.workspace_root = None;
                self.emit(
                    OutputLevel::Warning,
                    format!(
                        "Could not start {server}: {e}. Install {server} and make sure it is on your PATH."
                    ),
                    Some(format!("lsp-start-failed:{server}")),
                );
                false
            }
        }
    }

    /// Spawn a session and send `initialize`. State is only partially set on
    /// error; the caller clears it.
    async fn launch(&mut self, workspace_root: &str) -> Result<String, TransportError> {
        let server = self.config.server();
        let info = self
            .transport
            .start(server.command(), server.args(), workspace_root)
            .await?;
        let session_id = info.id.clone();

        self.open_documents.clear();
        self.pending_initialize = None;
        self.session = Some(info);
        self.workspace_root = Some(workspace_root.to_string());

        let root_uri = uri::to_uri(workspace_root);
        let params = protocol::initialize_params(
            &root_uri,
            uri::folder_name(workspace_root),
            self.config.client_name(),
            self.config.client_version(),
        );

        // Sent without the disconnect path: a failed launch is reported once,
        // as a start failure.
        let id = self.allocate_request_id();
        let request = protocol::Request::new(id, protocol::INITIALIZE, Some(params));
        match self.transmit(&request).await {
            Ok(()) => {
                self.pending_initialize = Some(id);
                Ok(session_id)
            }
            Err(e) => {
                // Don't leave a half-initialized process behind.
                if let Err(term) = self.transport.terminate(&session_id).await {
                    tracing::debug!(session = %session_id, "Terminate after failed initialize: {term}");
                }
                Err(e)
            }
        }
    }

    /// Terminate the active session and forget everything about it,
    /// including the workspace root. No `shutdown`/`exit` exchange is made.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if let Err(e) = self.transport.terminate(&session.id).await {
            self.emit(
                OutputLevel::Warning,
                format!("Failed to stop {}: {e}", session.server),
                Some(format!("lsp-stop-failed:{}", session.id)),
            );
        }

        self.reset_session();
        self.workspace_root = None;
        tracing::info!(session = %session.id, "LSP session stopped");
    }

    /// Drop the active session after a dead-session signal.
    ///
    /// Keeps the workspace root. Repeated calls for the same broken session
    /// produce one output entry: the first call clears the session, later
    /// calls find nothing to do.
    pub fn mark_disconnected(&mut self, reason: &str) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.reset_session();
        self.emit(
            OutputLevel::Warning,
            format!("{} disconnected: {reason}", session.server),
            Some(format!("lsp-disconnected:{}", session.id)),
        );
    }

    fn reset_session(&mut self) {
        self.session = None;
        self.pending_initialize = None;
        self.open_documents.clear();
    }

    fn emit(&mut self, level: OutputLevel, message: String, dedupe_key: Option<String>) {
        match level {
            OutputLevel::Info => tracing::info!("{message}"),
            OutputLevel::Warning => tracing::warn!("{message}"),
            OutputLevel::Error => tracing::error!("{message}"),
        }
        self.sink.on_output(OutputEntry {
            channel: self.config.output_channel().to_string(),
            level,
            message,
            dedupe_key,
        });
    }

    /// The live session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// Whether the live session has answered `initialize`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.is_some() && self.pending_initialize.is_none()
    }

    /// Root of the live or most recently disconnected session.
    #[must_use]
    pub fn workspace_root(&self) -> Option<&str> {
        self.workspace_root.as_deref()
    }

    #[must_use]
    pub fn is_document_open(&self, path: &str) -> bool {
        self.open_documents.contains(path)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
