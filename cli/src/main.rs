//! quill-lsp-check - run one language server over a set of files and print
//! what it reports.
//!
//! ```text
//! quill-lsp-check [--wait-secs N] <config.toml> <workspace-root> <file>...
//! ```
//!
//! Diagnostics go to stdout as `path:line:col: severity: [source] message`;
//! output entries and logs go to stderr. Files are opened once the server
//! has answered `initialize`; the run ends once the server has been quiet
//! for the wait period.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, path};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use quill_lsp::{
    ClientConfig, ClientSink, Diagnostic, LspClient, OutputEntry, OutputLevel, StdioTransport,
    TransportEvent,
};

const DEFAULT_WAIT_SECS: u64 = 3;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// Run a language server over some files and print its diagnostics.
#[derive(Parser, Debug)]
#[command(name = "quill-lsp-check", version)]
struct Args {
    /// Seconds of server silence that end the run.
    #[arg(long, default_value_t = DEFAULT_WAIT_SECS)]
    wait_secs: u64,
    /// TOML file with the `[server]` table.
    config: PathBuf,
    /// Workspace root the server is started in.
    root: PathBuf,
    /// Files to open.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Args {
    fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }
}

fn load_config(path: &Path) -> Result<ClientConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Prints diagnostics to stdout and each distinct output entry once.
#[derive(Default)]
struct PrintSink {
    seen: HashSet<String>,
}

impl ClientSink for PrintSink {
    fn on_diagnostics(&mut self, path: &str, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            println!("{path}: no diagnostics");
        }
        for diagnostic in diagnostics {
            println!("{diagnostic}");
        }
    }

    fn on_output(&mut self, entry: OutputEntry) {
        if let Some(key) = &entry.dedupe_key
            && !self.seen.insert(key.clone())
        {
            return;
        }
        let level = match entry.level {
            OutputLevel::Info => "info",
            OutputLevel::Warning => "warning",
            OutputLevel::Error => "error",
        };
        eprintln!("[{}] {level}: {}", entry.channel, entry.message);
    }
}

fn display_path(path: &Path) -> Result<String> {
    let absolute =
        path::absolute(path).with_context(|| format!("resolving {}", path.display()))?;
    Ok(absolute.to_string_lossy().into_owned())
}

/// Feed events to the client until the `initialize` response is handled.
///
/// Returns `false` if the session ends or `wait` passes first.
async fn await_handshake<S: ClientSink>(
    client: &mut LspClient<StdioTransport, S>,
    events: &mut UnboundedReceiver<TransportEvent>,
    wait: Duration,
) -> bool {
    let handshake = async {
        while client.session().is_some() && !client.is_initialized() {
            let Some(event) = events.recv().await else {
                break;
            };
            client.handle_message(event).await;
        }
        client.is_initialized()
    };
    tokio::time::timeout(wait, handshake).await.unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    let root = display_path(&args.root)?;

    let (transport, mut events) = StdioTransport::new();
    let mut client = LspClient::new(config, transport, PrintSink::default());

    if !client.ensure_started(&root).await {
        bail!("language server did not start");
    }
    if !await_handshake(&mut client, &mut events, args.wait()).await {
        client.stop().await;
        bail!(
            "language server did not answer initialize within {}s",
            args.wait_secs
        );
    }
    tracing::info!(root = %root, files = args.files.len(), "Handshake complete, opening files");

    let mut opened = Vec::new();
    for file in &args.files {
        let path = display_path(file)?;
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {path}"))?;
        client.sync_document(&path, &text, 1).await;
        opened.push(path);
    }

    while let Ok(Some(event)) = tokio::time::timeout(args.wait(), events.recv()).await {
        client.handle_message(event).await;
    }
    tracing::debug!("Server quiet for {}s, shutting down", args.wait_secs);

    for path in &opened {
        client.close_document(path).await;
    }
    client.stop().await;
    Ok(())
}
