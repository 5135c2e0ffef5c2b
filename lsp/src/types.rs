//! Public types handed to the consumer.
//!
//! The consumer receives [`Diagnostic`]s and [`OutputEntry`]s through the
//! [`ClientSink`] it supplies at construction.

use std::fmt;

use serde::Serialize;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    #[serde(rename = "info")]
    Information = 3,
    Hint = 4,
}

impl DiagnosticSeverity {
    /// Convert from LSP numeric severity (1=Error, 2=Warning, 3=Info, 4=Hint).
    ///
    /// Returns `None` for values outside the LSP-defined range.
    /// Callers decide the fallback policy.
    #[must_use]
    pub fn from_lsp(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Information),
            4 => Some(Self::Hint),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single diagnostic from a language server, normalized for the consumer.
///
/// Line and column are 1-based. `id` is stable within one
/// `publishDiagnostics` batch only; a new batch for the same path replaces the
/// previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    id: String,
    path: String,
    line: u32,
    column: u32,
    severity: DiagnosticSeverity,
    source: String,
    message: String,
    code: Option<String>,
}

impl Diagnostic {
    /// Build a diagnostic; the id is derived from the other fields and the
    /// diagnostic's `index` in its batch.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: String,
        line: u32,
        column: u32,
        severity: DiagnosticSeverity,
        source: String,
        message: String,
        code: Option<String>,
        index: usize,
    ) -> Self {
        let id = format!("{path}:{line}:{column}:{message}:{index}");
        Self {
            id,
            path,
            line,
            column,
            severity,
            source,
            message,
            code,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 1-indexed line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-indexed column.
    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    /// Source of the diagnostic (e.g. "rustc", "clippy").
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl fmt::Display for Diagnostic {
    /// `path:line:col: severity: [source] message`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: [{}] {}",
            self.path, self.line, self.column, self.severity, self.source, self.message
        )?;
        if let Some(code) = &self.code {
            write!(f, " ({code})")?;
        }
        Ok(())
    }
}

/// Level of an [`OutputEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Info,
    Warning,
    Error,
}

/// Fire-and-forget observability message for the consumer's output panel.
///
/// Entries sharing a `dedupe_key` describe the same condition; consumers show
/// one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEntry {
    pub channel: String,
    pub level: OutputLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
}

/// Consumer callbacks.
pub trait ClientSink {
    /// Full replacement of the diagnostics for `path`.
    fn on_diagnostics(&mut self, path: &str, diagnostics: Vec<Diagnostic>);

    fn on_output(&mut self, entry: OutputEntry);
}
