//! In-memory transport and sink for client tests.

use crate::client::LspClient;
use crate::config::{ClientConfig, ServerConfig};
use crate::transport::{SessionInfo, SessionStatus, Transport, TransportError};
use crate::types::{ClientSink, Diagnostic, OutputEntry, OutputLevel};

struct ScriptedFailure {
    method: &'static str,
    error: &'static str,
    remaining: usize,
}

/// Records every call; fails where told to.
#[derive(Default)]
pub(crate) struct FakeTransport {
    /// `(server, args, root)` per successful start.
    pub launches: Vec<(String, Vec<String>, String)>,
    /// `(session id, message)` for every send attempt, failed ones included.
    pub attempts: Vec<(String, serde_json::Value)>,
    pub terminated: Vec<String>,
    pub fail_start: Option<String>,
    pub fail_terminate: Option<String>,
    failures: Vec<ScriptedFailure>,
    counter: u64,
}

impl FakeTransport {
    /// Fail the next `times` sends of `method` with `error`.
    pub fn fail_sends(&mut self, method: &'static str, error: &'static str, times: usize) {
        self.failures.push(ScriptedFailure {
            method,
            error,
            remaining: times,
        });
    }

    /// Methods of all attempted sends, in order. Responses show up as `""`.
    pub fn methods(&self) -> Vec<String> {
        self.attempts
            .iter()
            .map(|(_, msg)| msg["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Attempted sends of `method`.
    pub fn sent(&self, method: &str) -> Vec<&serde_json::Value> {
        self.attempts
            .iter()
            .filter(|(_, msg)| msg["method"] == method)
            .map(|(_, msg)| msg)
            .collect()
    }
}

impl Transport for FakeTransport {
    async fn start(
        &mut self,
        server: &str,
        args: &[String],
        root: &str,
    ) -> Result<SessionInfo, TransportError> {
        if let Some(error) = &self.fail_start {
            return Err(TransportError::new(error.clone()));
        }
        self.counter += 1;
        self.launches
            .push((server.to_string(), args.to_vec(), root.to_string()));
        Ok(SessionInfo {
            id: format!("lsp-{}", self.counter),
            server: server.to_string(),
            root_path: root.to_string(),
            status: SessionStatus::Running,
        })
    }

    async fn send(&mut self, session_id: &str, payload: &str) -> Result<(), TransportError> {
        let message: serde_json::Value =
            serde_json::from_str(payload).map_err(|e| TransportError::new(e.to_string()))?;
        let method = message["method"].as_str().unwrap_or_default().to_string();
        self.attempts.push((session_id.to_string(), message));

        if let Some(failure) = self
            .failures
            .iter_mut()
            .find(|f| f.method == method && f.remaining > 0)
        {
            failure.remaining -= 1;
            return Err(TransportError::new(failure.error));
        }
        Ok(())
    }

    async fn terminate(&mut self, session_id: &str) -> Result<(), TransportError> {
        self.terminated.push(session_id.to_string());
        match &self.fail_terminate {
            Some(error) => Err(TransportError::new(error.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub diagnostics: Vec<(String, Vec<Diagnostic>)>,
    pub outputs: Vec<OutputEntry>,
}

impl RecordingSink {
    pub fn with_level(&self, level: OutputLevel) -> Vec<&OutputEntry> {
        self.outputs.iter().filter(|e| e.level == level).collect()
    }
}

impl ClientSink for RecordingSink {
    fn on_diagnostics(&mut self, path: &str, diagnostics: Vec<Diagnostic>) {
        self.diagnostics.push((path.to_string(), diagnostics));
    }

    fn on_output(&mut self, entry: OutputEntry) {
        self.outputs.push(entry);
    }
}

pub(crate) fn test_client() -> LspClient<FakeTransport, RecordingSink> {
    let server = ServerConfig::new("rust-analyzer", Vec::new(), "rust").unwrap();
    LspClient::new(
        ClientConfig::new(server),
        FakeTransport::default(),
        RecordingSink::default(),
    )
}
