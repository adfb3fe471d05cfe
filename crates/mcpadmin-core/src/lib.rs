//! # McpAdmin Core Library
//!
//! Domain types and rules for managing remote MCP tool servers.
//!
//! ## Modules
//!
//! - `domain` - Entities (McpServer, ToolSnapshot), auth configuration, the
//!   connection state machine and domain events
//! - `api` - The remote admin service port (`McpAdminApi`)
//! - `error` - Error taxonomy shared by all controllers
//! - `event_bus` - Broadcast distribution of domain events

pub mod api;
pub mod domain;
pub mod error;
pub mod event_bus;

// Re-export commonly used types
pub use api::*;
pub use domain::*;
pub use error::*;
pub use event_bus::{EventBus, EventReceiver, EventSender, SharedEventBus, DEFAULT_CAPACITY};
