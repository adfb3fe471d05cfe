//! Test harness for the lifecycle controllers
//!
//! Wires a `ServerLifecycle` to a `MockAdminApi` and keeps an event receiver
//! subscribed from the start.

use std::sync::Arc;

use mcpadmin_core::{
    AuthConfig, AuthType, DomainEvent, EventReceiver, McpServer, NewServer, ServerId,
    ToolSnapshot, Transport,
};
use mcpadmin_lifecycle::{LifecycleConfig, ServerLifecycle};

use crate::mocks::MockAdminApi;

pub struct LifecycleTestHarness {
    /// The lifecycle under test
    pub lifecycle: ServerLifecycle,

    /// Remote service double
    pub api: Arc<MockAdminApi>,

    /// Receiver subscribed before any command ran
    pub events: EventReceiver,
}

impl LifecycleTestHarness {
    pub fn new() -> Self {
        Self::with_config(LifecycleConfig::default())
    }

    pub fn with_config(config: LifecycleConfig) -> Self {
        let api = Arc::new(MockAdminApi::new());
        let lifecycle = ServerLifecycle::builder()
            .with_api(api.clone())
            .with_config(config)
            .build()
            .expect("lifecycle should build");
        let events = lifecycle.subscribe();

        Self {
            lifecycle,
            api,
            events,
        }
    }

    /// Collect all pending events
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        self.events.drain()
    }

    /// Create a server named `name`, still in `Created`
    pub async fn create(&self, name: &str) -> McpServer {
        self.lifecycle
            .create_server(NewServer::new(name, format!("https://{}.example.com/mcp", name.to_lowercase())))
            .await
            .expect("create_server should succeed")
    }

    /// Create a server exposing `tools` and connect it without auth
    ///
    /// `tools` are `(tool id, name)` pairs.
    pub async fn connected_server(&self, name: &str, tools: &[(i64, &str)]) -> McpServer {
        let server = self.create(name).await;
        self.api.set_catalog(server.id, crate::fixtures::tools(server.id, tools));
        self.lifecycle
            .auth()
            .configure(
                server.id,
                Transport::StreamableHttp,
                AuthType::None,
                None,
                AuthConfig::none(),
            )
            .await
            .expect("configure should succeed")
    }

    pub fn cached_tools(&self, id: ServerId) -> Vec<ToolSnapshot> {
        self.lifecycle.registry().tools(id)
    }
}

impl Default for LifecycleTestHarness {
    fn default() -> Self {
        Self::new()
    }
}
