//! Document open/change/close notifications.
//!
//! Every update ships the full document text; there is no incremental
//! diffing. Calls for the same path must be issued in program order.

use super::LspClient;
use crate::failure;
use crate::protocol;
use crate::transport::{Transport, TransportError};
use crate::types::{ClientSink, OutputLevel};
use crate::uri;

impl<T: Transport, S: ClientSink> LspClient<T, S> {
    /// Push the current text of `path` to the server.
    ///
    /// The first sync of a path in a session opens it; later syncs replace
    /// its whole text. A dead session triggers one restart against the last
    /// workspace root and one retry; nothing beyond that.
    pub async fn sync_document(&mut self, path: &str, text: &str, version: i32) {
        if self.session.is_none() {
            return;
        }

        let error = match self.send_document(path, text, version).await {
            Ok(()) => return,
            Err(e) => e,
        };

        if !failure::is_dead_session(&error) {
            self.report_sync_failure(path, &error);
            return;
        }

        let Some(root) = self.workspace_root.clone() else {
            return;
        };
        tracing::info!(path = %path, "LSP session died during sync, restarting");
        if !self.ensure_started(&root).await {
            return;
        }

        if let Err(retry_error) = self.send_document(path, text, version).await {
            self.report_sync_failure(path, &retry_error);
        }
    }

    async fn send_document(
        &mut self,
        path: &str,
        text: &str,
        version: i32,
    ) -> Result<(), TransportError> {
        let uri = uri::to_uri(path);

        if self.open_documents.contains(path) {
            let params = protocol::did_change_params(&uri, version, text);
            return self.send_notification(protocol::DID_CHANGE, params).await;
        }

        let params =
            protocol::did_open_params(&uri, self.config.server().language_id(), version, text);
        self.send_notification(protocol::DID_OPEN, params).await?;
        self.open_documents.insert(path.to_string());
        Ok(())
    }

    fn report_sync_failure(&mut self, path: &str, error: &TransportError) {
        self.emit(
            OutputLevel::Warning,
            format!("Failed to sync {path} with the language server: {error}"),
            Some(format!("lsp-sync:{path}")),
        );
    }

    /// Tell the server `path` is closed. Paths that were never opened in the
    /// current session are ignored.
    pub async fn close_document(&mut self, path: &str) {
        if self.session.is_none() || !self.open_documents.contains(path) {
            return;
        }

        let params = protocol::did_close_params(&uri::to_uri(path));
        match self.send_notification(protocol::DID_CLOSE, params).await {
            Ok(()) => {
                self.open_documents.remove(path);
            }
            Err(e) if failure::is_dead_session(&e) => {
                tracing::debug!(path = %path, "Close skipped, session is gone: {e}");
            }
            Err(e) => {
                self.emit(
                    OutputLevel::Warning,
                    format!("Failed to close {path} on the language server: {e}"),
                    Some(format!("lsp-close:{path}")),
                );
            }
        }
    }
}
