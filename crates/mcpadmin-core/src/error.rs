//! Error taxonomy for the connection lifecycle
//!
//! Remote failures arrive as [`ApiError`] and are always wrapped into one of the
//! operation-level errors before reaching a caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ServerId, ServerStatus, ToolId};

/// Failure talking to the remote admin service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Request never produced a response (connect, timeout, TLS)
    #[error("request failed: {0}")]
    Transport(String),

    /// Remote answered with a non-success status
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Record does not exist remotely
    #[error("{0} not found")]
    NotFound(String),

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Coarse error category, used for logging and UI handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Auth,
    Discovery,
    Tool,
    Precondition,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Discovery => "discovery",
            Self::Tool => "tool",
            Self::Precondition => "precondition",
        }
    }
}

/// An operation was requested while the state machine guard rejects it
///
/// This is a programming or race error, not a user-facing message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} rejected for server {server_id} in status {status:?}: {reason}")]
pub struct PreconditionFailed {
    pub server_id: ServerId,
    pub operation: &'static str,
    /// `None` when the server is not known locally
    pub status: Option<ServerStatus>,
    pub reason: String,
}

impl PreconditionFailed {
    pub fn new(
        server_id: ServerId,
        operation: &'static str,
        status: Option<ServerStatus>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            server_id,
            operation,
            status,
            reason: reason.into(),
        }
    }

    pub fn unknown_server(server_id: ServerId, operation: &'static str) -> Self {
        Self::new(server_id, operation, None, "server is not registered")
    }

    pub fn in_flight(server_id: ServerId, operation: &'static str, status: ServerStatus) -> Self {
        Self::new(
            server_id,
            operation,
            Some(status),
            "another operation is already in flight for this server",
        )
    }

    pub fn stale(server_id: ServerId, operation: &'static str, status: ServerStatus) -> Self {
        Self::new(
            server_id,
            operation,
            Some(status),
            "result discarded, server state changed while the request was in flight",
        )
    }

    /// The server was removed while the request was in flight
    pub fn stale_unknown(server_id: ServerId, operation: &'static str) -> Self {
        Self::new(
            server_id,
            operation,
            None,
            "result discarded, server was removed while the request was in flight",
        )
    }

    /// Whether this rejection only means a late result was dropped
    pub fn is_stale(&self) -> bool {
        self.reason.starts_with("result discarded")
    }
}

/// Invalid or missing credentials for an auth configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("an API token is required when the admin supplies credentials")]
    MissingApiToken,

    #[error("an auth template is required when each user supplies credentials")]
    MissingAuthTemplate,

    #[error("invalid auth template: {0}")]
    InvalidAuthTemplate(String),

    #[error("an auth performer is required for API-token auth")]
    MissingAuthPerformer,

    #[error("invalid server definition: {0}")]
    InvalidServer(String),

    #[error(transparent)]
    Precondition(#[from] PreconditionFailed),

    #[error("failed to save configuration: {0}")]
    Remote(#[from] ApiError),
}

/// OAuth initiation or callback failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("server {0} is not configured for OAuth")]
    NotOAuth(ServerId),

    #[error("invalid return path '{0}', expected a site-relative path")]
    InvalidReturnPath(String),

    #[error("provider returned an unusable redirect URL: {0}")]
    InvalidRedirect(String),

    #[error("invalid OAuth callback: {0}")]
    InvalidCallback(String),

    #[error("authorization failed: {0}")]
    CallbackFailed(String),

    #[error(transparent)]
    Precondition(#[from] PreconditionFailed),

    #[error("OAuth request failed: {0}")]
    Remote(#[from] ApiError),
}

/// Tool discovery failed after reaching `FetchingTools`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error(transparent)]
    Precondition(#[from] PreconditionFailed),

    #[error("tool discovery failed: {0}")]
    Remote(#[from] ApiError),
}

/// Single or bulk tool mutation failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool {0} is not known")]
    UnknownTool(ToolId),

    #[error(transparent)]
    Precondition(#[from] PreconditionFailed),

    #[error("tool update failed: {0}")]
    Remote(#[from] ApiError),
}

macro_rules! impl_classified {
    ($ty:ty, $kind:expr) => {
        impl $ty {
            /// Category of this failure; preconditions are reported separately
            pub fn kind(&self) -> ErrorKind {
                match self.precondition() {
                    Some(_) => ErrorKind::Precondition,
                    None => $kind,
                }
            }

            /// The precondition failure, if that is what this is
            pub fn precondition(&self) -> Option<&PreconditionFailed> {
                match self {
                    Self::Precondition(p) => Some(p),
                    _ => None,
                }
            }

            /// Single human-readable line for the UI
            pub fn user_message(&self) -> String {
                let mut message = self.to_string();
                if let Some(first) = message.get(..1) {
                    let upper = first.to_uppercase();
                    message.replace_range(..1, &upper);
                }
                message
            }
        }
    };
}

impl_classified!(ConfigError, ErrorKind::Config);
impl_classified!(AuthError, ErrorKind::Auth);
impl_classified!(DiscoveryError, ErrorKind::Discovery);
impl_classified!(ToolError, ErrorKind::Tool);
