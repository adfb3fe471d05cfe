//! ToolSynchronizer - tool discovery and enable/disable
//!
//! Discovery replaces a server's tool list wholesale; running it twice against
//! an unchanged remote leaves an identical list. A discovery failure moves a
//! `FetchingTools` server to `Connected` with no tools and is surfaced as a
//! warning, it never blocks the connection.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use mcpadmin_core::{
    ApiResult, DiscoveryError, DomainEvent, EventSender, McpAdminApi, PreconditionFailed,
    ServerId, ServerStatus, StatusEvent, ToolError, ToolId, ToolSnapshot,
};

use crate::driver::StatusDriver;
use crate::optimistic::{OptimisticMutationController, ToolPatch};
use crate::registry::ServerRegistry;
use crate::report::{self, report};

const OP_DISCOVER: &str = "discover";
const OP_RELOAD: &str = "reload_tools";
const OP_SET_ENABLED: &str = "set_enabled";
const OP_DISABLE_ALL: &str = "disable_all";

pub struct ToolSynchronizer {
    registry: Arc<ServerRegistry>,
    api: Arc<dyn McpAdminApi>,
    driver: Arc<StatusDriver>,
    optimistic: Arc<OptimisticMutationController>,
    events: EventSender,
}

impl ToolSynchronizer {
    pub(crate) fn new(
        registry: Arc<ServerRegistry>,
        api: Arc<dyn McpAdminApi>,
        driver: Arc<StatusDriver>,
        optimistic: Arc<OptimisticMutationController>,
        events: EventSender,
    ) -> Self {
        Self {
            registry,
            api,
            driver,
            optimistic,
            events,
        }
    }

    /// Ask the remote to re-discover tools and replace the cached list
    ///
    /// Allowed in `FetchingTools` (completes the connection) and `Connected`.
    pub async fn discover(&self, id: ServerId) -> Result<Vec<ToolSnapshot>, DiscoveryError> {
        let _guard = match self.registry.begin_operation(id, OP_DISCOVER) {
            Ok(guard) => guard,
            Err(p) => {
                report::precondition(&p);
                return Err(p.into());
            }
        };
        self.discover_locked(id).await
    }

    /// Discovery for a caller that already holds the server's operation guard
    ///
    /// Failures are reported here.
    pub(crate) async fn discover_locked(&self, id: ServerId) -> Result<Vec<ToolSnapshot>, DiscoveryError> {
        let result = self.run_discovery(id).await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_DISCOVER, e);
        }
        result
    }

    async fn run_discovery(&self, id: ServerId) -> Result<Vec<ToolSnapshot>, DiscoveryError> {
        let (status, flow) = self
            .registry
            .status_and_flow(id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, OP_DISCOVER))?;
        if !status.allows_discovery() {
            return Err(PreconditionFailed::new(
                id,
                OP_DISCOVER,
                Some(status),
                "tool discovery has not been reached",
            )
            .into());
        }

        debug!(server_id = %id, status = %status, "[ToolSynchronizer] Discovering tools");

        match self.fetch_fresh(id).await {
            Ok(tools) => {
                if status == ServerStatus::FetchingTools {
                    self.driver
                        .advance(id, StatusEvent::DiscoverySucceeded, OP_DISCOVER, Some(flow), Some(tools))
                        .await?;
                } else {
                    self.registry.replace_tools(id, Some(flow), OP_DISCOVER, tools)?;
                }
                let tools = self.registry.tools(id);
                info!(server_id = %id, tool_count = tools.len(), "[ToolSynchronizer] Tools discovered");
                self.events.emit(DomainEvent::ToolsChanged {
                    server_id: id,
                    tool_count: tools.len(),
                });
                Ok(tools)
            }
            Err(api_err) => {
                if status == ServerStatus::FetchingTools {
                    let advanced = self
                        .driver
                        .advance(id, StatusEvent::DiscoveryFailed, OP_DISCOVER, Some(flow), Some(Vec::new()))
                        .await;
                    match advanced {
                        Ok(_) => {
                            self.events.emit(DomainEvent::ToolsChanged {
                                server_id: id,
                                tool_count: 0,
                            });
                        }
                        Err(e) => {
                            let e = DiscoveryError::from(e);
                            report!(&self.events, Some(id), OP_DISCOVER, e);
                        }
                    }
                }
                Err(DiscoveryError::Remote(api_err))
            }
        }
    }

    async fn fetch_fresh(&self, id: ServerId) -> ApiResult<Vec<ToolSnapshot>> {
        self.api.refresh_tools(id).await?;
        self.api.list_tools(id).await
    }

    /// Re-read the cached tool list without asking the remote to re-discover
    pub async fn reload(&self, id: ServerId) -> Result<Vec<ToolSnapshot>, DiscoveryError> {
        let result: Result<Vec<ToolSnapshot>, DiscoveryError> = async {
            let tools = self.api.list_tools(id).await?;
            self.registry.replace_tools(id, None, OP_RELOAD, tools)?;
            Ok(self.registry.tools(id))
        }
        .await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_RELOAD, e);
        }
        result
    }

    /// Enable or disable one tool of a connected server
    pub async fn set_enabled(&self, tool_id: ToolId, enabled: bool) -> Result<(), ToolError> {
        let server_id = self.registry.tool(tool_id).map(|t| t.server_id);
        let result = self.set_enabled_inner(tool_id, enabled).await;
        if let Err(e) = &result {
            report!(&self.events, server_id, OP_SET_ENABLED, e);
        }
        result
    }

    async fn set_enabled_inner(&self, tool_id: ToolId, enabled: bool) -> Result<(), ToolError> {
        let tool = self
            .registry
            .tool(tool_id)
            .ok_or(ToolError::UnknownTool(tool_id))?;
        self.require_connected(tool.server_id, OP_SET_ENABLED)?;

        let api = self.api.clone();
        self.optimistic
            .apply(ToolPatch::set_enabled(tool_id, enabled), || async move {
                api.set_tool_enabled(tool_id, enabled).await
            })
            .await?;

        debug!(
            server_id = %tool.server_id,
            tool_id = %tool_id,
            enabled = enabled,
            "[ToolSynchronizer] Tool updated"
        );
        Ok(())
    }

    /// Disable many tools in one remote call
    ///
    /// Returns how many tools the remote actually updated; ids it no longer
    /// knows are not counted. An empty list makes no remote call.
    pub async fn disable_all(&self, tool_ids: &[ToolId]) -> Result<usize, ToolError> {
        let result = self.disable_all_inner(tool_ids).await;
        if let Err(e) = &result {
            report!(&self.events, None, OP_DISABLE_ALL, e);
        }
        result
    }

    async fn disable_all_inner(&self, tool_ids: &[ToolId]) -> Result<usize, ToolError> {
        if tool_ids.is_empty() {
            debug!("[ToolSynchronizer] Nothing to disable");
            return Ok(0);
        }

        let patch = ToolPatch::disable(tool_ids.iter().copied());
        let servers: BTreeSet<ServerId> = patch
            .tool_ids()
            .into_iter()
            .filter_map(|id| self.registry.tool(id))
            .map(|t| t.server_id)
            .collect();
        for server_id in &servers {
            self.require_connected(*server_id, OP_DISABLE_ALL)?;
        }

        let api = self.api.clone();
        let request_ids = patch.tool_ids();
        let requested = request_ids.len();
        let response = self
            .optimistic
            .apply(patch, || async move { api.disable_tools(&request_ids).await })
            .await?;

        info!(
            requested = requested,
            updated = response.updated_count,
            servers = servers.len(),
            "[ToolSynchronizer] Disabled tools"
        );
        Ok(response.updated_count)
    }

    fn require_connected(&self, id: ServerId, operation: &'static str) -> Result<(), PreconditionFailed> {
        match self.registry.status(id) {
            Some(ServerStatus::Connected) => Ok(()),
            status => Err(PreconditionFailed::new(
                id,
                operation,
                status,
                "tools can only be changed while the server is connected",
            )),
        }
    }
}
