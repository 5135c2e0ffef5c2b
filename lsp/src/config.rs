//! Client configuration.
//!
//! Raw deserialization structs stay private; validation happens at the
//! deserialization boundary via `#[serde(try_from)]`, so holding a
//! [`ClientConfig`] is proof that the server command and language id are
//! usable.

use serde::Deserialize;

const DEFAULT_CLIENT_NAME: &str = "quill";
const DEFAULT_OUTPUT_CHANNEL: &str = "LSP";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerConfigError {
    #[error("server command must not be empty")]
    EmptyCommand,
    #[error("language_id must not be empty")]
    EmptyLanguageId,
    #[error("client_name must not be empty")]
    EmptyClientName,
}

#[derive(Deserialize)]
struct RawServerConfig {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    language_id: String,
}

/// Validated language server launch configuration.
///
/// Invariant: `command` and `language_id` are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawServerConfig")]
pub struct ServerConfig {
    command: String,
    args: Vec<String>,
    language_id: String,
}

impl TryFrom<RawServerConfig> for ServerConfig {
    type Error = ServerConfigError;

    fn try_from(raw: RawServerConfig) -> Result<Self, Self::Error> {
        Self::new(raw.command, raw.args, raw.language_id)
    }
}

impl ServerConfig {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        language_id: impl Into<String>,
    ) -> Result<Self, ServerConfigError> {
        let command = command.into().trim().to_string();
        let language_id = language_id.into().trim().to_string();
        if command.is_empty() {
            return Err(ServerConfigError::EmptyCommand);
        }
        if language_id.is_empty() {
            return Err(ServerConfigError::EmptyLanguageId);
        }
        Ok(Self {
            command,
            args,
            language_id,
        })
    }

    /// Executable name; also the server name reported to the consumer.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// LSP language identifier sent with `didOpen`.
    #[must_use]
    pub fn language_id(&self) -> &str {
        &self.language_id
    }
}

#[derive(Deserialize)]
struct RawClientConfig {
    server: ServerConfig,
    client_name: Option<String>,
    client_version: Option<String>,
    output_channel: Option<String>,
}

/// Everything the client needs besides its transport and sink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawClientConfig")]
pub struct ClientConfig {
    server: ServerConfig,
    client_name: String,
    client_version: String,
    output_channel: String,
}

impl TryFrom<RawClientConfig> for ClientConfig {
    type Error = ServerConfigError;

    fn try_from(raw: RawClientConfig) -> Result<Self, Self::Error> {
        let mut config = Self::new(raw.server);
        if let Some(name) = raw.client_name {
            if name.trim().is_empty() {
                return Err(ServerConfigError::EmptyClientName);
            }
            config.client_name = name;
        }
        if let Some(version) = raw.client_version {
            config.client_version = version;
        }
        if let Some(channel) = raw.output_channel {
            config.output_channel = channel;
        }
        Ok(config)
    }
}

impl ClientConfig {
    /// Config with default client identity and output channel.
    #[must_use]
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            output_channel: DEFAULT_OUTPUT_CHANNEL.to_string(),
        }
    }

    #[must_use]
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// `clientInfo.name` in the initialize request.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// `clientInfo.version` in the initialize request.
    #[must_use]
    pub fn client_version(&self) -> &str {
        &self.client_version
    }

    /// Channel stamped on every output entry.
    #[must_use]
    pub fn output_channel(&self) -> &str {
        &self.output_channel
    }
}
