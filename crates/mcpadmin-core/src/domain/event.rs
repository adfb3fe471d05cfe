//! Domain Events - every observable change to the server inventory
//!
//! Events are emitted by the lifecycle controllers after a change has been
//! applied and are consumed by the presentation layer and by audit logging.
//!
//! # Serialization
//!
//! Events serialize with a `type` field containing the snake_case variant name:
//! ```json
//! { "type": "server_status_changed", "server_id": 3, "from": "CREATED", "to": "AWAITING_AUTH", "flow_id": 1 }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ServerId, ServerStatus};
use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    // ════════════════════════════════════════════════════════════════════════
    // SERVER INVENTORY
    // ════════════════════════════════════════════════════════════════════════
    /// A server record was created
    ServerCreated { server_id: ServerId, name: String },

    /// Auth configuration was saved remotely
    ServerConfigured { server_id: ServerId },

    /// A server and all of its tools were deleted
    ServerDeleted { server_id: ServerId },

    /// The server list was re-read from the remote service
    RegistryRefreshed { server_count: usize },

    // ════════════════════════════════════════════════════════════════════════
    // CONNECTION LIFECYCLE
    // ════════════════════════════════════════════════════════════════════════
    /// Status moved along an edge of the transition table
    ServerStatusChanged {
        server_id: ServerId,
        from: ServerStatus,
        to: ServerStatus,
        flow_id: u64,
    },

    // ════════════════════════════════════════════════════════════════════════
    // TOOLS
    // ════════════════════════════════════════════════════════════════════════
    /// The tool inventory was replaced by discovery
    ToolsChanged { server_id: ServerId, tool_count: usize },

    /// Cached tool state was reconciled with a fresh re-read
    ToolsReconciled {
        server_id: ServerId,
        tool_count: usize,
        /// True when a tentative change was discarded
        rolled_back: bool,
    },

    // ════════════════════════════════════════════════════════════════════════
    // FAILURES
    // ════════════════════════════════════════════════════════════════════════
    /// A user-visible failure, one per failed operation
    OperationFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        server_id: Option<ServerId>,
        operation: String,
        kind: ErrorKind,
        message: String,
    },
}

impl DomainEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ServerCreated { .. } => "server_created",
            Self::ServerConfigured { .. } => "server_configured",
            Self::ServerDeleted { .. } => "server_deleted",
            Self::RegistryRefreshed { .. } => "registry_refreshed",
            Self::ServerStatusChanged { .. } => "server_status_changed",
            Self::ToolsChanged { .. } => "tools_changed",
            Self::ToolsReconciled { .. } => "tools_reconciled",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }

    pub fn server_id(&self) -> Option<ServerId> {
        match self {
            Self::ServerCreated { server_id, .. }
            | Self::ServerConfigured { server_id }
            | Self::ServerDeleted { server_id }
            | Self::ServerStatusChanged { server_id, .. }
            | Self::ToolsChanged { server_id, .. }
            | Self::ToolsReconciled { server_id, .. } => Some(*server_id),
            Self::OperationFailed { server_id, .. } => *server_id,
            Self::RegistryRefreshed { .. } => None,
        }
    }
}

/// Event with emission metadata, for audit consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEventEnvelope {
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl DomainEventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            occurred_at: Utc::now(),
            event,
        }
    }
}
