//! Subprocess-backed [`Transport`]: one child process per session, framed
//! payloads over stdin/stdout, stderr forwarded line by line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};

use crate::codec::{FrameReader, FrameWriter};
use crate::transport::{
    Channel, SessionInfo, SessionStatus, Transport, TransportError, TransportEvent,
};

type SessionMap = Arc<Mutex<HashMap<String, ProcessSession>>>;

struct ProcessSession {
    info: SessionInfo,
    writer: FrameWriter<ChildStdin>,
    child: Child,
}

impl ProcessSession {
    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(session = %self.info.id, "LSP process already gone: {e}");
        }
    }
}

/// Spawns language servers and shuttles their stdio.
///
/// Inbound traffic arrives on the receiver returned by [`StdioTransport::new`].
pub struct StdioTransport {
    sessions: SessionMap,
    counter: u64,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl StdioTransport {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            counter: 0,
            event_tx,
        };
        (transport, event_rx)
    }

    async fn spawn_session(
        &mut self,
        server: &str,
        args: &[String],
        root: &str,
    ) -> Result<SessionInfo> {
        let server_name = server.trim();
        if server_name.is_empty() {
            bail!("LSP server command cannot be empty");
        }

        let resolved_root = canonical_dir(Path::new(root)).await?;
        let resolved_cmd = which::which(server_name)
            .with_context(|| format!("{server_name} not found in PATH"))?;

        let mut child = Command::new(&resolved_cmd)
            .args(args)
            .current_dir(&resolved_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start LSP server `{server_name}`"))?;

        let stdin = child
            .stdin
            .take()
            .context("Failed to capture LSP server stdin")?;
        let stdout = child
            .stdout
            .take()
            .context("Failed to capture LSP server stdout")?;
        let stderr = child
            .stderr
            .take()
            .context("Failed to capture LSP server stderr")?;

        self.counter += 1;
        let info = SessionInfo {
            id: format!("lsp-{}", self.counter),
            server: server_name.to_string(),
            root_path: resolved_root.to_string_lossy().into_owned(),
            status: SessionStatus::Running,
        };

        self.sessions.lock().await.insert(
            info.id.clone(),
            ProcessSession {
                info: info.clone(),
                writer: FrameWriter::new(stdin),
                child,
            },
        );

        tokio::spawn(read_stdout(
            info.id.clone(),
            stdout,
            self.sessions.clone(),
            self.event_tx.clone(),
        ));
        tokio::spawn(read_stderr(
            info.id.clone(),
            stderr,
            self.sessions.clone(),
            self.event_tx.clone(),
        ));

        tracing::info!(session = %info.id, server = %info.server, root = %info.root_path, "LSP process started");
        Ok(info)
    }
}

impl Transport for StdioTransport {
    async fn start(
        &mut self,
        server: &str,
        args: &[String],
        root: &str,
    ) -> Result<SessionInfo, TransportError> {
        self.spawn_session(server, args, root)
            .await
            .map_err(|e| TransportError::new(format!("{e:#}")))
    }

    async fn send(&mut self, session_id: &str, payload: &str) -> Result<(), TransportError> {
        if payload.trim().is_empty() {
            return Err(TransportError::new("LSP payload cannot be empty"));
        }

        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| TransportError::new("LSP session not found"))?;

        if session.info.status != SessionStatus::Running {
            return Err(TransportError::new("LSP session is not running"));
        }

        session
            .writer
            .write_payload(payload)
            .await
            .map_err(|e| TransportError::new(format!("{e:#}")))
    }

    async fn terminate(&mut self, session_id: &str) -> Result<(), TransportError> {
        let removed = self.sessions.lock().await.remove(session_id);
        if let Some(mut session) = removed {
            session.info.status = SessionStatus::Closed;
            session.kill().await;
            tracing::info!(session = %session_id, "LSP process terminated");
        }
        Ok(())
    }
}

async fn canonical_dir(root: &Path) -> Result<PathBuf> {
    let resolved = tokio::fs::canonicalize(root)
        .await
        .with_context(|| format!("Workspace root {} is not accessible", root.display()))?;
    if !resolved.is_dir() {
        bail!("Workspace root {} is not a directory", resolved.display());
    }
    Ok(resolved)
}

/// Remove a session whose streams ended and reap its process.
async fn cleanup_on_disconnect(sessions: &SessionMap, session_id: &str) {
    let removed = sessions.lock().await.remove(session_id);
    if let Some(mut session) = removed {
        if session.info.status == SessionStatus::Running {
            session.info.status = SessionStatus::Disconnected;
        }
        session.kill().await;
        tracing::info!(session = %session_id, "LSP session disconnected");
    }
}

async fn read_stdout(
    session_id: String,
    stdout: ChildStdout,
    sessions: SessionMap,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut reader = FrameReader::new(stdout);
    loop {
        match reader.read_frame().await {
            Ok(Some(payload)) => {
                let event = TransportEvent::new(&session_id, Channel::Stdout, payload, false);
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(session = %session_id, "LSP server closed stdout");
                break;
            }
            Err(e) => {
                tracing::warn!(session = %session_id, "LSP reader error: {e:#}");
                let _ = event_tx.send(TransportEvent::new(
                    &session_id,
                    Channel::System,
                    format!("{e:#}"),
                    true,
                ));
                break;
            }
        }
    }

    cleanup_on_disconnect(&sessions, &session_id).await;
}

async fn read_stderr(
    session_id: String,
    stderr: ChildStderr,
    sessions: SessionMap,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let payload = line.trim();
                if payload.is_empty() {
                    continue;
                }
                let event = TransportEvent::new(&session_id, Channel::Stderr, payload, true);
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = event_tx.send(TransportEvent::new(
                    &session_id,
                    Channel::System,
                    format!("Failed to read LSP stderr: {e}"),
                    true,
                ));
                break;
            }
        }
    }

    cleanup_on_disconnect(&sessions, &session_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::is_dead_session;

    #[tokio::test]
    async fn test_start_rejects_empty_command() {
        let (mut transport, _rx) = StdioTransport::new();
        let err = transport.start("  ", &[], ".").await.unwrap_err();
        assert_eq!(err.message(), "LSP server command cannot be empty");
    }

    #[tokio::test]
    async fn test_start_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let (mut transport, _rx) = StdioTransport::new();
        let err = transport
            .start("rust-analyzer", &[], &missing.to_string_lossy())
            .await
            .unwrap_err();
        assert!(err.message().contains("not accessible"), "{err}");
    }

    #[tokio::test]
    async fn test_start_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.rs");
        std::fs::write(&file, "fn main() {}").unwrap();
        let (mut transport, _rx) = StdioTransport::new();
        let err = transport
            .start("rust-analyzer", &[], &file.to_string_lossy())
            .await
            .unwrap_err();
        assert!(err.message().contains("not a directory"), "{err}");
    }

    #[tokio::test]
    async fn test_start_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let (mut transport, _rx) = StdioTransport::new();
        let err = transport
            .start(
                "quill-definitely-not-a-real-language-server",
                &[],
                &dir.path().to_string_lossy(),
            )
            .await
            .unwrap_err();
        assert!(err.message().contains("not found in PATH"), "{err}");
        assert!(!is_dead_session(&err));
    }

    #[tokio::test]
    async fn test_send_to_unknown_session_is_dead() {
        let (mut transport, _rx) = StdioTransport::new();
        let err = transport.send("lsp-42", "{}").await.unwrap_err();
        assert_eq!(err.message(), "LSP session not found");
        assert!(is_dead_session(&err));
    }

    #[tokio::test]
    async fn test_send_rejects_empty_payload() {
        let (mut transport, _rx) = StdioTransport::new();
        let err = transport.send("lsp-1", "  ").await.unwrap_err();
        assert_eq!(err.message(), "LSP payload cannot be empty");
    }

    #[tokio::test]
    async fn test_terminate_unknown_session_is_ok() {
        let (mut transport, _rx) = StdioTransport::new();
        assert!(transport.terminate("lsp-7").await.is_ok());
    }
}
