//! McpAdmin HTTP client
//!
//! `HttpAdminApi` speaks to the remote admin service over HTTP and implements
//! the `McpAdminApi` port consumed by the lifecycle controllers.

mod config;
mod http;

pub use config::{ClientConfig, ENV_API_TOKEN, ENV_BASE_URL, ENV_TIMEOUT_SECS};
pub use http::HttpAdminApi;
