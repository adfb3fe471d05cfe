//! McpServer entity - a remote tool server known to the platform

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::ServerId;

/// Connection lifecycle status of a server
///
/// Values match the remote service's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    /// Record exists, no auth configuration saved yet
    #[default]
    Created,
    /// OAuth configured, waiting for the user to finish the provider round-trip
    AwaitingAuth,
    /// Credentials accepted, tool discovery pending
    FetchingTools,
    /// Connected; tool inventory known (possibly empty)
    Connected,
    /// Explicitly disconnected
    Disconnected,
}

impl ServerStatus {
    pub const ALL: [ServerStatus; 5] = [
        Self::Created,
        Self::AwaitingAuth,
        Self::FetchingTools,
        Self::Connected,
        Self::Disconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::AwaitingAuth => "AWAITING_AUTH",
            Self::FetchingTools => "FETCHING_TOOLS",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Tool discovery may only run once this point has been reached
    pub fn allows_discovery(&self) -> bool {
        matches!(self, Self::FetchingTools | Self::Connected)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire transport used to reach the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    #[serde(rename = "STREAMABLE_HTTP")]
    StreamableHttp,
    #[serde(rename = "SSE")]
    ServerSentEvents,
}

/// How the platform authenticates against the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    #[default]
    None,
    ApiToken,
    #[serde(rename = "OAUTH")]
    OAuth,
}

/// Who supplies the credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthPerformer {
    /// One secret held by an administrator, shared by all users
    Admin,
    /// Every user provides their own credentials
    PerUser,
}

/// A tool server as seen by the admin surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServer {
    pub id: ServerId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub server_url: String,
    #[serde(default)]
    pub status: ServerStatus,
    /// Unset until auth configuration is saved
    #[serde(default)]
    pub transport: Option<Transport>,
    #[serde(default)]
    pub auth_type: AuthType,
    /// Present exactly when `auth_type != None`
    #[serde(default)]
    pub auth_performer: Option<AuthPerformer>,
    /// Denormalized count of known tools
    #[serde(default)]
    pub tool_count: usize,
}

impl McpServer {
    /// Auth performer the record should carry for its auth type
    pub fn normalized_performer(
        auth_type: AuthType,
        requested: Option<AuthPerformer>,
    ) -> Option<AuthPerformer> {
        match auth_type {
            AuthType::None => None,
            AuthType::OAuth => Some(AuthPerformer::PerUser),
            AuthType::ApiToken => requested,
        }
    }

    /// Whether the auth fields satisfy the record invariants
    pub fn auth_fields_consistent(&self) -> bool {
        match (self.auth_type, self.auth_performer) {
            (AuthType::None, None) => true,
            (AuthType::OAuth, Some(AuthPerformer::PerUser)) => true,
            (AuthType::ApiToken, Some(_)) => true,
            _ => false,
        }
    }
}

/// User-supplied metadata for a new server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewServer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub server_url: String,
}

impl NewServer {
    pub fn new(name: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            server_url: server_url.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the name is present and the URL is an absolute http(s) URL
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Server name must not be empty".to_string());
        }
        let url = Url::parse(self.server_url.trim())
            .map_err(|e| format!("Invalid server URL '{}': {}", self.server_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "Server URL must use http or https, got '{}'",
                url.scheme()
            ));
        }
        Ok(())
    }
}
