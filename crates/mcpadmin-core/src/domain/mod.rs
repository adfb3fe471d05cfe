//! Domain entities, value objects, and events
//!
//! - Entities (McpServer, ToolSnapshot)
//! - Value Objects (ServerStatus, Transport, AuthType, AuthConfig, ids)
//! - The connection state machine (pure transition table)
//! - Domain Events (DomainEvent enum for event-driven consumers)

mod auth;
mod callback;
mod event;
mod ids;
mod server;
mod tool;
mod transition;

pub use auth::{AuthConfig, AuthTemplate, Secret};
pub use callback::OAuthCallback;
pub use event::{DomainEvent, DomainEventEnvelope};
pub use ids::{ServerId, ToolId};
pub use server::{AuthPerformer, AuthType, McpServer, NewServer, ServerStatus, Transport};
pub use tool::{sort_tools, ToolSnapshot};
pub use transition::{ConnectionStateMachine, StatusEvent, TransitionRejected};
