//! Outbound JSON-RPC sends and inbound message routing.

use serde::Serialize;
use serde_json::Value;

use super::LspClient;
use crate::diagnostics;
use crate::failure;
use crate::protocol::{self, MessageParams, Notification};
use crate::transport::{Channel, Transport, TransportError, TransportEvent};
use crate::types::{ClientSink, OutputLevel};

impl<T: Transport, S: ClientSink> LspClient<T, S> {
    pub(super) fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Serialize `message` and hand it to the transport, with no reaction to
    /// failure.
    pub(super) async fn transmit<M: Serialize>(
        &mut self,
        message: &M,
    ) -> Result<(), TransportError> {
        let Some(session_id) = self.session.as_ref().map(|s| s.id.clone()) else {
            return Err(TransportError::new("LSP session is not running"));
        };
        let payload = serde_json::to_string(message)
            .map_err(|e| TransportError::new(format!("Failed to serialize LSP message: {e}")))?;

        tracing::trace!(session = %session_id, "-> {payload}");
        self.transport.send(&session_id, &payload).await
    }

    /// Like [`Self::transmit`], but a dead-session failure disconnects the
    /// client before the error is returned. The error is always returned;
    /// callers decide what to do.
    pub(crate) async fn send_json_rpc<M: Serialize>(
        &mut self,
        message: &M,
    ) -> Result<(), TransportError> {
        let result = self.transmit(message).await;
        if let Err(e) = &result
            && failure::is_dead_session(e)
        {
            self.mark_disconnected(e.message());
        }
        result
    }

    pub(crate) async fn send_notification(
        &mut self,
        method: &'static str,
        params: Value,
    ) -> Result<(), TransportError> {
        self.send_json_rpc(&Notification::new(method, Some(params)))
            .await
    }

    /// Route one inbound transport event.
    ///
    /// Events for any session other than the live one are dropped; they are
    /// leftovers from a session that has since been stopped or replaced.
    pub async fn handle_message(&mut self, event: TransportEvent) {
        let Some(session) = &self.session else {
            tracing::trace!(session = %event.session_id, "Dropping event: no active session");
            return;
        };
        if session.id != event.session_id {
            tracing::trace!(
                session = %event.session_id,
                active = %session.id,
                "Dropping event from stale session"
            );
            return;
        }

        match event.channel {
            Channel::System if event.is_error => {
                self.mark_disconnected(&event.payload);
                return;
            }
            Channel::Stderr => {
                let text = event.payload.trim();
                if !text.is_empty() {
                    let level = if event.is_error {
                        OutputLevel::Error
                    } else {
                        OutputLevel::Warning
                    };
                    self.emit(level, text.to_string(), Some(text.to_string()));
                }
                return;
            }
            Channel::Stdout | Channel::System => {}
        }

        match serde_json::from_str::<Value>(&event.payload) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => tracing::trace!("Ignoring non-JSON LSP payload: {e}"),
        }
    }

    async fn dispatch(&mut self, message: Value) {
        let method = message.get("method").and_then(Value::as_str);

        if let (Some(id), Some(method)) = (message.get("id"), method) {
            self.reject_server_request(id, method).await;
            return;
        }

        if let Some(id) = message.get("id").and_then(Value::as_u64)
            && self.pending_initialize == Some(id)
        {
            self.pending_initialize = None;
            self.complete_initialize().await;
        }

        if let Some(error) = message.get("error")
            && let Some(text) = error.get("message").and_then(Value::as_str)
        {
            let code = error
                .get("code")
                .map_or_else(|| "unknown".to_string(), Value::to_string);
            self.emit(
                OutputLevel::Error,
                format!("{} error {code}: {text}", self.config.server().command()),
                Some(format!("lsp-error:{code}:{text}")),
            );
        }

        match method {
            Some(protocol::PUBLISH_DIAGNOSTICS) => {
                self.publish_diagnostics(message.get("params").cloned());
            }
            Some(kind @ (protocol::SHOW_MESSAGE | protocol::LOG_MESSAGE)) => {
                self.forward_window_message(kind, message.get("params").cloned());
            }
            Some(other) => tracing::trace!("Ignoring notification: {other}"),
            None => {}
        }
    }

    async fn complete_initialize(&mut self) {
        let result = self
            .send_notification(protocol::INITIALIZED, serde_json::json!({}))
            .await;
        // Dead-session failures already went through the disconnect path.
        if let Err(e) = result
            && !failure::is_dead_session(&e)
        {
            let server = self.config.server().command().to_string();
            self.emit(
                OutputLevel::Warning,
                format!("Failed to send initialized to {server}: {e}"),
                Some(format!("lsp-initialized-failed:{server}")),
            );
        }
    }

    /// Servers block on some requests (`client/registerCapability`,
    /// `workspace/configuration`) until they get an answer.
    async fn reject_server_request(&mut self, id: &Value, method: &str) {
        tracing::debug!("LSP server sent request {method}, replying method not found");
        let response = protocol::method_not_found(id, method);
        if let Err(e) = self.send_json_rpc(&response).await {
            tracing::debug!("Failed to answer {method}: {e}");
        }
    }

    fn publish_diagnostics(&mut self, params: Option<Value>) {
        if let Some((path, items)) = diagnostics::translate(params, self.config.server().command())
        {
            tracing::debug!(path = %path, count = items.len(), "Diagnostics updated");
            self.sink.on_diagnostics(&path, items);
        }
    }

    fn forward_window_message(&mut self, method: &str, params: Option<Value>) {
        let Some(params) = params.and_then(|p| serde_json::from_value::<MessageParams>(p).ok())
        else {
            return;
        };
        let level = match params.kind {
            1 => OutputLevel::Error,
            2 => OutputLevel::Warning,
            _ => OutputLevel::Info,
        };
        if method == protocol::LOG_MESSAGE && level == OutputLevel::Info {
            tracing::debug!("{}", params.message);
            return;
        }
        self.emit(level, params.message.clone(), Some(params.message));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::fake::test_client;
    use crate::transport::{Channel, TransportEvent};
    use crate::types::{DiagnosticSeverity, OutputLevel};

    fn stdout(session: &str, message: &serde_json::Value) -> TransportEvent {
        TransportEvent::new(session, Channel::Stdout, message.to_string(), false)
    }

    fn initialize_response(id: u64) -> serde_json::Value {
        json!({ "jsonrpc": "2.0", "id": id, "result": { "capabilities": {} } })
    }

    #[tokio::test]
    async fn test_initialize_response_sends_initialized_once() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        client.handle_message(stdout("lsp-1", &initialize_response(1))).await;
        client.handle_message(stdout("lsp-1", &initialize_response(1))).await;

        assert_eq!(client.transport.methods(), ["initialize", "initialized"]);
        assert!(client.pending_initialize.is_none());
    }

    #[tokio::test]
    async fn test_initialized_dead_session_disconnects_quietly() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;
        client
            .transport
            .fail_sends("initialized", "Failed to write LSP payload: broken pipe", 1);

        client.handle_message(stdout("lsp-1", &initialize_response(1))).await;

        assert!(client.session().is_none());
        assert_eq!(client.workspace_root(), Some("/work/proj"));
        let warnings = client.sink.with_level(OutputLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].dedupe_key.as_deref(), Some("lsp-disconnected:lsp-1"));
    }

    #[tokio::test]
    async fn test_initialized_other_failure_warns() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;
        client
            .transport
            .fail_sends("initialized", "LSP payload cannot be empty", 1);

        client.handle_message(stdout("lsp-1", &initialize_response(1))).await;

        assert!(client.session().is_some());
        let warnings = client.sink.with_level(OutputLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].dedupe_key.as_deref(),
            Some("lsp-initialized-failed:rust-analyzer")
        );
    }

    #[tokio::test]
    async fn test_unrelated_response_does_not_complete_initialize() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        client.handle_message(stdout("lsp-1", &initialize_response(99))).await;

        assert_eq!(client.transport.methods(), ["initialize"]);
        assert_eq!(client.pending_initialize, Some(1));
    }

    #[tokio::test]
    async fn test_publish_diagnostics_reaches_sink() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": {
                "uri": "file:///C:/proj/a.rs",
                "diagnostics": [{
                    "range": { "start": { "line": 4, "character": 2 }, "end": { "line": 4, "character": 3 } },
                    "severity": 2,
                    "message": "unused variable"
                }]
            }
        });
        client.handle_message(stdout("lsp-1", &notification)).await;

        assert_eq!(client.sink.diagnostics.len(), 1);
        let (path, items) = &client.sink.diagnostics[0];
        assert_eq!(path, r"C:\proj\a.rs");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line(), 5);
        assert_eq!(items[0].column(), 3);
        assert_eq!(items[0].severity(), DiagnosticSeverity::Warning);
        assert_eq!(items[0].code(), None);
        assert_eq!(items[0].message(), "unused variable");
    }

    #[tokio::test]
    async fn test_stale_session_events_are_ignored() {
        let mut client = test_client();
        client.ensure_started("/work/a").await;
        client.ensure_started("/work/b").await;

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": { "uri": "file:///work/a/x.rs", "diagnostics": [] }
        });
        client.handle_message(stdout("lsp-1", &notification)).await;
        client
            .handle_message(TransportEvent::new("lsp-1", Channel::System, "broken pipe", true))
            .await;

        assert!(client.sink.diagnostics.is_empty());
        assert_eq!(client.session().unwrap().id, "lsp-2");
    }

    #[tokio::test]
    async fn test_events_without_session_are_ignored() {
        let mut client = test_client();
        client
            .handle_message(TransportEvent::new("lsp-1", Channel::Stderr, "boom", true))
            .await;
        assert!(client.sink.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_system_error_disconnects() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        client
            .handle_message(TransportEvent::new(
                "lsp-1",
                Channel::System,
                "Failed to read LSP payload: unexpected end of file",
                true,
            ))
            .await;

        assert!(client.session().is_none());
        assert_eq!(client.workspace_root(), Some("/work/proj"));
    }

    #[tokio::test]
    async fn test_stderr_becomes_deduplicated_output() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        client
            .handle_message(TransportEvent::new("lsp-1", Channel::Stderr, "  cargo metadata failed \n", true))
            .await;
        client
            .handle_message(TransportEvent::new("lsp-1", Channel::Stderr, "indexing", false))
            .await;
        client
            .handle_message(TransportEvent::new("lsp-1", Channel::Stderr, "   ", true))
            .await;

        let errors = client.sink.with_level(OutputLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "cargo metadata failed");
        assert_eq!(errors[0].dedupe_key.as_deref(), Some("cargo metadata failed"));
        let warnings = client.sink.with_level(OutputLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "indexing");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;
        let before = client.sink.outputs.len();

        client
            .handle_message(TransportEvent::new("lsp-1", Channel::Stdout, "{not json", false))
            .await;

        assert_eq!(client.sink.outputs.len(), before);
        assert!(client.session().is_some());
    }

    #[tokio::test]
    async fn test_protocol_error_is_reported_with_code_key() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        let response = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": { "code": -32600, "message": "invalid request" }
        });
        client.handle_message(stdout("lsp-1", &response)).await;

        let errors = client.sink.with_level(OutputLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("invalid request"));
        assert_eq!(errors[0].dedupe_key.as_deref(), Some("lsp-error:-32600:invalid request"));
        assert!(client.session().is_some());
    }

    #[tokio::test]
    async fn test_server_request_gets_method_not_found() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        let request = json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "client/registerCapability",
            "params": {}
        });
        client.handle_message(stdout("lsp-1", &request)).await;

        let (_, reply) = client.transport.attempts.last().unwrap();
        assert_eq!(reply["id"], 5);
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_window_messages_become_output() {
        let mut client = test_client();
        client.ensure_started("/work/proj").await;

        for (method, kind, text) in [
            ("window/showMessage", 1, "fatal"),
            ("window/showMessage", 3, "hello"),
            ("window/logMessage", 2, "slow"),
            ("window/logMessage", 4, "chatter"),
        ] {
            let notification = json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": { "type": kind, "message": text }
            });
            client.handle_message(stdout("lsp-1", &notification)).await;
        }

        let messages: Vec<(&str, OutputLevel)> = client
            .sink
            .outputs
            .iter()
            .skip(1) // start notice
            .map(|e| (e.message.as_str(), e.level))
            .collect();
        assert_eq!(
            messages,
            [
                ("fatal", OutputLevel::Error),
                ("hello", OutputLevel::Info),
                ("slow", OutputLevel::Warning),
            ]
        );
    }
}
