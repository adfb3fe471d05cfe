//! ServerLifecycle - entry point wiring the controllers together
//!
//! Owns the registry and the event bus; the controllers share them. Server
//! inventory commands (create, disconnect, reconnect, delete, refresh) live
//! here, auth and tools are reached through [`ServerLifecycle::auth`] and
//! [`ServerLifecycle::tools`].

use std::sync::Arc;
use tracing::{debug, info, warn};

use mcpadmin_core::{
    ApiError, AuthError, ConfigError, DiscoveryError, DomainEvent, EventBus, EventReceiver,
    EventSender, McpAdminApi, McpServer, NewServer, PreconditionFailed, ServerId, ServerStatus,
    SharedEventBus, StatusEvent, DEFAULT_CAPACITY,
};

use crate::auth::AuthenticationOrchestrator;
use crate::driver::StatusDriver;
use crate::optimistic::OptimisticMutationController;
use crate::registry::ServerRegistry;
use crate::report::report;
use crate::tools::ToolSynchronizer;

const OP_CREATE: &str = "create_server";
const OP_DISCONNECT: &str = "disconnect";
const OP_RECONNECT: &str = "reconnect";
const OP_DELETE: &str = "delete_server";
const OP_REFRESH: &str = "refresh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Ask the provider to bind OAuth tokens to the server URL (RFC 8707)
    pub include_resource_param: bool,
    /// Capacity of the domain event channel
    pub event_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            include_resource_param: true,
            event_capacity: DEFAULT_CAPACITY,
        }
    }
}

pub struct ServerLifecycle {
    config: LifecycleConfig,
    registry: Arc<ServerRegistry>,
    api: Arc<dyn McpAdminApi>,
    event_bus: SharedEventBus,
    events: EventSender,
    driver: Arc<StatusDriver>,
    auth: AuthenticationOrchestrator,
    tools: Arc<ToolSynchronizer>,
    optimistic: Arc<OptimisticMutationController>,
}

impl ServerLifecycle {
    pub fn builder() -> ServerLifecycleBuilder {
        ServerLifecycleBuilder::new()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn auth(&self) -> &AuthenticationOrchestrator {
        &self.auth
    }

    pub fn tools(&self) -> &ToolSynchronizer {
        &self.tools
    }

    pub fn optimistic(&self) -> &OptimisticMutationController {
        &self.optimistic
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Create a server record; it starts in `Created` with no auth
    pub async fn create_server(&self, new: NewServer) -> Result<McpServer, ConfigError> {
        let result = self.create_inner(new).await;
        if let Err(e) = &result {
            report!(&self.events, None, OP_CREATE, e);
        }
        result
    }

    async fn create_inner(&self, new: NewServer) -> Result<McpServer, ConfigError> {
        new.validate().map_err(ConfigError::InvalidServer)?;

        let mut server = self.api.create_server(&new).await?;
        if server.status != ServerStatus::Created {
            warn!(
                server_id = %server.id,
                status = %server.status,
                "[ServerLifecycle] New server did not start in Created"
            );
            server.status = ServerStatus::Created;
        }

        self.registry.insert(server.clone());
        info!(server_id = %server.id, name = %server.name, "[ServerLifecycle] Server created");
        self.events.emit(DomainEvent::ServerCreated {
            server_id: server.id,
            name: server.name.clone(),
        });
        Ok(server)
    }

    /// Move to `Disconnected` from any status
    ///
    /// Not serialized with in-flight operations: their late results are
    /// discarded when they try to commit.
    pub async fn disconnect(&self, id: ServerId) -> Result<McpServer, AuthError> {
        let result = self.disconnect_inner(id).await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_DISCONNECT, e);
        }
        result
    }

    async fn disconnect_inner(&self, id: ServerId) -> Result<McpServer, AuthError> {
        self.driver.disconnect(id, OP_DISCONNECT).await?;
        self.registry
            .get(id)
            .ok_or_else(|| PreconditionFailed::stale_unknown(id, OP_DISCONNECT).into())
    }

    /// Reconnect with the last saved auth configuration
    ///
    /// OAuth servers go back to `AwaitingAuth`; others reconnect directly and
    /// re-discover their tools.
    pub async fn reconnect(&self, id: ServerId) -> Result<McpServer, AuthError> {
        let result = self.reconnect_inner(id).await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_RECONNECT, e);
        }
        result
    }

    async fn reconnect_inner(&self, id: ServerId) -> Result<McpServer, AuthError> {
        let _guard = self.registry.begin_operation(id, OP_RECONNECT)?;
        let server = self
            .registry
            .get(id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, OP_RECONNECT))?;

        let event = StatusEvent::ReconnectRequested {
            auth_type: server.auth_type,
            transport: server.transport,
        };
        let transitioned = self.driver.advance(id, event, OP_RECONNECT, None, None).await?;

        if transitioned.status == ServerStatus::Connected {
            let _ = self.tools.discover_locked(id).await;
        }

        self.registry
            .get(id)
            .ok_or_else(|| PreconditionFailed::stale_unknown(id, OP_RECONNECT).into())
    }

    /// Disconnect, delete remotely, then drop the server and its tools
    pub async fn delete_server(&self, id: ServerId) -> Result<(), ConfigError> {
        let result = self.delete_inner(id).await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_DELETE, e);
        }
        result
    }

    async fn delete_inner(&self, id: ServerId) -> Result<(), ConfigError> {
        if !self.registry.contains(id) {
            return Err(PreconditionFailed::unknown_server(id, OP_DELETE).into());
        }

        self.driver.disconnect(id, OP_DELETE).await?;

        match self.api.delete_server(id).await {
            Ok(()) => {}
            Err(ApiError::NotFound(_)) => {
                debug!(server_id = %id, "[ServerLifecycle] Already deleted remotely");
            }
            Err(e) => return Err(e.into()),
        }

        self.optimistic.cancel(id);
        self.registry.remove(id);
        info!(server_id = %id, "[ServerLifecycle] Server deleted");
        self.events.emit(DomainEvent::ServerDeleted { server_id: id });
        Ok(())
    }

    /// Re-read the server list from the remote service
    pub async fn refresh(&self) -> Result<usize, DiscoveryError> {
        let result = self.registry.refresh(self.api.as_ref(), &self.events).await;
        if let Err(e) = &result {
            report!(&self.events, None, OP_REFRESH, e);
        }
        result
    }
}

/// Builder for [`ServerLifecycle`]
pub struct ServerLifecycleBuilder {
    api: Option<Arc<dyn McpAdminApi>>,
    event_bus: Option<SharedEventBus>,
    registry: Option<Arc<ServerRegistry>>,
    config: LifecycleConfig,
}

impl ServerLifecycleBuilder {
    pub fn new() -> Self {
        Self {
            api: None,
            event_bus: None,
            registry: None,
            config: LifecycleConfig::default(),
        }
    }

    pub fn with_api(mut self, api: Arc<dyn McpAdminApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Share an existing bus; otherwise one is created with the configured capacity
    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Start from a pre-populated registry
    pub fn with_registry(mut self, registry: Arc<ServerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ServerLifecycle, String> {
        let api = self.api.ok_or("api is required")?;
        let config = self.config;
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::with_capacity(config.event_capacity)));
        let registry = self.registry.unwrap_or_default();
        let events = event_bus.sender();

        let driver = Arc::new(StatusDriver::new(registry.clone(), api.clone(), events.clone()));
        let optimistic = Arc::new(OptimisticMutationController::new(
            registry.clone(),
            api.clone(),
            events.clone(),
        ));
        let tools = Arc::new(ToolSynchronizer::new(
            registry.clone(),
            api.clone(),
            driver.clone(),
            optimistic.clone(),
            events.clone(),
        ));
        let auth = AuthenticationOrchestrator::new(
            registry.clone(),
            api.clone(),
            driver.clone(),
            tools.clone(),
            events.clone(),
            config.include_resource_param,
        );

        Ok(ServerLifecycle {
            config,
            registry,
            api,
            event_bus,
            events,
            driver,
            auth,
            tools,
            optimistic,
        })
    }
}

impl Default for ServerLifecycleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
