//! # McpAdmin Lifecycle
//!
//! Drives remote MCP servers from creation to a connected, tool-synchronized
//! state against the admin service port in `mcpadmin_core`.
//!
//! ## Modules
//!
//! - `registry` - Owned server/tool state; queries are public, mutations are not
//! - `driver` - Applies state machine transitions, with stale-result detection
//! - `auth` - Auth configuration and the OAuth round-trip
//! - `tools` - Tool discovery and enable/disable
//! - `optimistic` - Tentative tool changes, rollback and background reconcile
//! - `lifecycle` - `ServerLifecycle` entry point and builder
//! - `logging` - Tracing subscriber setup

mod auth;
mod driver;
mod lifecycle;
pub mod logging;
mod optimistic;
mod registry;
mod report;
mod tools;

pub use auth::{AuthenticationOrchestrator, OAuthClient};
pub use lifecycle::{LifecycleConfig, ServerLifecycle, ServerLifecycleBuilder};
pub use logging::{init_tracing, LogConfig};
pub use optimistic::{OptimisticMutationController, ToolPatch};
pub use registry::{ServerRegistry, ServerView};
pub use report::PRECONDITION_TARGET;
pub use tools::ToolSynchronizer;
