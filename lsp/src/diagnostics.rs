//! `publishDiagnostics` -> [`Diagnostic`] translation.

use serde_json::Value;

use crate::protocol::{LspDiagnostic, PublishDiagnosticsParams};
use crate::types::{Diagnostic, DiagnosticSeverity};
use crate::uri;

/// Translate one notification's params into `(path, diagnostics)`.
///
/// Returns `None` when the params are malformed or the URI does not resolve
/// to a path; the notification is then dropped whole.
pub(crate) fn translate(
    params: Option<Value>,
    fallback_source: &str,
) -> Option<(String, Vec<Diagnostic>)> {
    let params: PublishDiagnosticsParams = match params {
        Some(value) => match serde_json::from_value(value) {
            Ok(params) => params,
            Err(e) => {
                tracing::debug!("Dropping malformed publishDiagnostics: {e}");
                return None;
            }
        },
        None => PublishDiagnosticsParams::default(),
    };

    let Some(path) = params.uri.as_deref().and_then(uri::from_uri) else {
        tracing::debug!(uri = ?params.uri, "Dropping diagnostics without a file URI");
        return None;
    };

    let items = params
        .diagnostics
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, diag)| to_diagnostic(&path, index, diag, fallback_source))
        .collect();

    Some((path, items))
}

fn to_diagnostic(path: &str, index: usize, diag: LspDiagnostic, fallback_source: &str) -> Diagnostic {
    Diagnostic::new(
        path.to_string(),
        diag.range.start.line.saturating_add(1),
        diag.range.start.character.saturating_add(1),
        severity(diag.severity.as_ref()),
        diag.source
            .unwrap_or_else(|| fallback_source.to_string()),
        diag.message.as_ref().map(message_text).unwrap_or_default(),
        diag.code.as_ref().and_then(normalize_code),
        index,
    )
}

fn message_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Unknown or missing severities read as warnings, not errors.
fn severity(value: Option<&Value>) -> DiagnosticSeverity {
    value
        .and_then(Value::as_u64)
        .and_then(DiagnosticSeverity::from_lsp)
        .unwrap_or(DiagnosticSeverity::Warning)
}

/// `"E0425"`, `42` and `{"value": ...}` carry a code; anything else does not.
fn normalize_code(code: &Value) -> Option<String> {
    match code {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => match map.get("value")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        _ => None,
    }
}
