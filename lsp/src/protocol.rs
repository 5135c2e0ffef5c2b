//! Internal LSP message serde types for JSON-RPC communication.

use serde::{Deserialize, Serialize};

pub(crate) const INITIALIZE: &str = "initialize";
pub(crate) const INITIALIZED: &str = "initialized";
pub(crate) const DID_OPEN: &str = "textDocument/didOpen";
pub(crate) const DID_CHANGE: &str = "textDocument/didChange";
pub(crate) const DID_CLOSE: &str = "textDocument/didClose";
pub(crate) const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";
pub(crate) const SHOW_MESSAGE: &str = "window/showMessage";
pub(crate) const LOG_MESSAGE: &str = "window/logMessage";

/// JSON-RPC error code for an unsupported server-to-client request.
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Reply to a server-initiated request the client does not implement.
pub(crate) fn method_not_found(id: &serde_json::Value, method: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}")
        }
    })
}

pub(crate) fn initialize_params(
    root_uri: &str,
    folder_name: &str,
    client_name: &str,
    client_version: &str,
) -> serde_json::Value {
    serde_json::json!({
        "processId": null,
        "clientInfo": {
            "name": client_name,
            "version": client_version
        },
        "rootUri": root_uri,
        "workspaceFolders": [{
            "uri": root_uri,
            "name": folder_name
        }],
        "capabilities": {
            "workspace": {
                "workspaceFolders": true
            },
            "textDocument": {
                "publishDiagnostics": {
                    "relatedInformation": true
                }
            }
        }
    })
}

pub(crate) fn did_open_params(
    uri: &str,
    language_id: &str,
    version: i32,
    text: &str,
) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn did_change_params(uri: &str, version: i32, text: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "version": version
        },
        "contentChanges": [{
            "text": text
        }]
    })
}

pub(crate) fn did_close_params(uri: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri
        }
    })
}

/// `textDocument/publishDiagnostics` params, read leniently: anything the
/// translator can default is optional here.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PublishDiagnosticsParams {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub diagnostics: Option<Vec<LspDiagnostic>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LspDiagnostic {
    #[serde(default)]
    pub range: LspRange,
    #[serde(default)]
    pub severity: Option<serde_json::Value>,
    #[serde(default)]
    pub source: Option<String>,
    /// A string, or a `MarkupContent`-like object with a `value`.
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LspRange {
    #[serde(default)]
    pub start: LspPosition,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LspPosition {
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub character: u32,
}

/// `window/showMessage` and `window/logMessage` params.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageParams {
    #[serde(rename = "type")]
    pub kind: u8,
    pub message: String,
}
