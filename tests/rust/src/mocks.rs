//! Mock admin service for testing
//!
//! In-memory implementation of `McpAdminApi` with failure injection, call
//! recording and gates that pause a call until the test releases it.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

use mcpadmin_core::{
    ApiError, ApiResult, AuthPerformer, AuthType, DisableToolsResponse, McpAdminApi, McpServer,
    NewServer, OAuthConnectRequest, OAuthConnectResponse, ServerConfigRequest, ServerId,
    ServerStatus, ToolId, ToolSnapshot, Transport,
};

/// Remote operations, for failure injection and call assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    ListServers,
    CreateServer,
    SaveConfig,
    SetStatus,
    ConnectOAuth,
    RefreshTools,
    ListTools,
    SetToolEnabled,
    DisableTools,
    DeleteServer,
}

/// Pauses the next call of one operation
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until the paused call has started
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the paused call continue
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct RemoteState {
    servers: BTreeMap<ServerId, McpServer>,
    /// Tools each server exposes upstream, copied on refresh
    catalog: BTreeMap<ServerId, Vec<ToolSnapshot>>,
    /// Tools stored by the service, returned by list_tools
    stored: BTreeMap<ServerId, Vec<ToolSnapshot>>,
    next_id: i64,
}

impl RemoteState {
    fn server(&self, id: ServerId) -> ApiResult<McpServer> {
        let mut server = self
            .servers
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("server {}", id)))?;
        server.tool_count = self.stored.get(&id).map(Vec::len).unwrap_or(0);
        Ok(server)
    }

    fn stored_tool(&mut self, tool_id: ToolId) -> Option<&mut ToolSnapshot> {
        self.stored
            .values_mut()
            .flat_map(|tools| tools.iter_mut())
            .find(|t| t.id == tool_id)
    }
}

#[derive(Default)]
pub struct MockAdminApi {
    state: Mutex<RemoteState>,
    failures: Mutex<HashMap<ApiOp, VecDeque<ApiError>>>,
    gates: Mutex<HashMap<ApiOp, Arc<Gate>>>,
    calls: Mutex<Vec<ApiOp>>,
    status_calls: Mutex<Vec<(ServerId, ServerStatus)>>,
    saved_configs: Mutex<Vec<ServerConfigRequest>>,
    oauth_requests: Mutex<Vec<OAuthConnectRequest>>,
    disable_requests: Mutex<Vec<Vec<ToolId>>>,
    oauth_url: Mutex<Option<String>>,
}

impl MockAdminApi {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Remote state setup
    // ------------------------------------------------------------------------

    /// Insert a server as if created by another admin
    pub fn seed_server(&self, server: McpServer) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(server.id.get());
        state.servers.insert(server.id, server);
    }

    /// Tools the server will report on the next refresh
    pub fn set_catalog(&self, id: ServerId, tools: Vec<ToolSnapshot>) {
        self.state.lock().catalog.insert(id, tools);
    }

    /// Tools already stored by the service, without a refresh
    pub fn set_stored_tools(&self, id: ServerId, tools: Vec<ToolSnapshot>) {
        self.state.lock().stored.insert(id, tools);
    }

    /// Delete a tool behind the controllers' back
    pub fn delete_remote_tool(&self, tool_id: ToolId) {
        let mut state = self.state.lock();
        for tools in state.stored.values_mut() {
            tools.retain(|t| t.id != tool_id);
        }
        for tools in state.catalog.values_mut() {
            tools.retain(|t| t.id != tool_id);
        }
    }

    /// Change a server's status behind the controllers' back
    pub fn set_remote_status(&self, id: ServerId, status: ServerStatus) {
        if let Some(server) = self.state.lock().servers.get_mut(&id) {
            server.status = status;
        }
    }

    pub fn remove_remote_server(&self, id: ServerId) {
        let mut state = self.state.lock();
        state.servers.remove(&id);
        state.stored.remove(&id);
        state.catalog.remove(&id);
    }

    pub fn set_oauth_url(&self, url: impl Into<String>) {
        *self.oauth_url.lock() = Some(url.into());
    }

    // ------------------------------------------------------------------------
    // Failure injection and gates
    // ------------------------------------------------------------------------

    /// Fail the next call of `op` with `err`; queued per operation
    pub fn fail_next(&self, op: ApiOp, err: ApiError) {
        self.failures.lock().entry(op).or_default().push_back(err);
    }

    /// Pause the next call of `op` until the returned gate is released
    pub fn hold(&self, op: ApiOp) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().insert(op, gate.clone());
        gate
    }

    async fn checkpoint(&self, op: ApiOp) -> ApiResult<()> {
        self.calls.lock().push(op);

        let gate = self.gates.lock().remove(&op);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        match self.failures.lock().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<ApiOp> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, op: ApiOp) -> usize {
        self.calls.lock().iter().filter(|c| **c == op).count()
    }

    pub fn status_calls(&self) -> Vec<(ServerId, ServerStatus)> {
        self.status_calls.lock().clone()
    }

    pub fn saved_configs(&self) -> Vec<ServerConfigRequest> {
        self.saved_configs.lock().clone()
    }

    pub fn oauth_requests(&self) -> Vec<OAuthConnectRequest> {
        self.oauth_requests.lock().clone()
    }

    pub fn disable_requests(&self) -> Vec<Vec<ToolId>> {
        self.disable_requests.lock().clone()
    }

    pub fn remote_server(&self, id: ServerId) -> Option<McpServer> {
        self.state.lock().server(id).ok()
    }

    pub fn remote_tools(&self, id: ServerId) -> Vec<ToolSnapshot> {
        self.state.lock().stored.get(&id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl McpAdminApi for MockAdminApi {
    async fn list_servers(&self) -> ApiResult<Vec<McpServer>> {
        self.checkpoint(ApiOp::ListServers).await?;
        let state = self.state.lock();
        state.servers.keys().map(|id| state.server(*id)).collect()
    }

    async fn create_server(&self, server: &NewServer) -> ApiResult<McpServer> {
        self.checkpoint(ApiOp::CreateServer).await?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let record = McpServer {
            id: ServerId::new(state.next_id),
            name: server.name.clone(),
            description: server.description.clone(),
            server_url: server.server_url.clone(),
            status: ServerStatus::Created,
            transport: None,
            auth_type: AuthType::None,
            auth_performer: None,
            tool_count: 0,
        };
        state.servers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn save_server_config(&self, request: &ServerConfigRequest) -> ApiResult<McpServer> {
        self.checkpoint(ApiOp::SaveConfig).await?;
        self.saved_configs.lock().push(request.clone());

        let mut state = self.state.lock();
        let server = state
            .servers
            .get_mut(&request.id)
            .ok_or_else(|| ApiError::NotFound(format!("server {}", request.id)))?;
        server.transport = Some(request.transport);
        server.auth_type = request.auth_type;
        server.auth_performer = request.auth_performer;
        state.server(request.id)
    }

    async fn set_status(&self, id: ServerId, status: ServerStatus) -> ApiResult<McpServer> {
        self.checkpoint(ApiOp::SetStatus).await?;
        self.status_calls.lock().push((id, status));

        let mut state = self.state.lock();
        let server = state
            .servers
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("server {}", id)))?;
        server.status = status;
        state.server(id)
    }

    async fn connect_oauth(&self, request: &OAuthConnectRequest) -> ApiResult<OAuthConnectResponse> {
        self.checkpoint(ApiOp::ConnectOAuth).await?;
        self.oauth_requests.lock().push(request.clone());

        let oauth_url = self.oauth_url.lock().clone().unwrap_or_else(|| {
            format!(
                "https://auth.example.com/authorize?client_id={}&state=server-{}",
                request.oauth_client_id.as_deref().unwrap_or("default"),
                request.server_id
            )
        });
        Ok(OAuthConnectResponse { oauth_url })
    }

    async fn refresh_tools(&self, id: ServerId) -> ApiResult<()> {
        self.checkpoint(ApiOp::RefreshTools).await?;
        let mut state = self.state.lock();
        state.server(id)?;

        let previous = state.stored.remove(&id).unwrap_or_default();
        let refreshed = state
            .catalog
            .get(&id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut tool| {
                if let Some(old) = previous.iter().find(|p| p.id == tool.id) {
                    tool.enabled = old.enabled;
                }
                tool
            })
            .collect();
        state.stored.insert(id, refreshed);
        Ok(())
    }

    async fn list_tools(&self, id: ServerId) -> ApiResult<Vec<ToolSnapshot>> {
        self.checkpoint(ApiOp::ListTools).await?;
        let state = self.state.lock();
        state.server(id)?;
        Ok(state.stored.get(&id).cloned().unwrap_or_default())
    }

    async fn set_tool_enabled(&self, tool_id: ToolId, enabled: bool) -> ApiResult<()> {
        self.checkpoint(ApiOp::SetToolEnabled).await?;
        let mut state = self.state.lock();
        let tool = state
            .stored_tool(tool_id)
            .ok_or_else(|| ApiError::NotFound(format!("tool {}", tool_id)))?;
        tool.enabled = enabled;
        Ok(())
    }

    async fn disable_tools(&self, tool_ids: &[ToolId]) -> ApiResult<DisableToolsResponse> {
        self.checkpoint(ApiOp::DisableTools).await?;
        self.disable_requests.lock().push(tool_ids.to_vec());

        let mut state = self.state.lock();
        let mut updated_count = 0;
        for tool_id in tool_ids {
            if let Some(tool) = state.stored_tool(*tool_id) {
                tool.enabled = false;
                updated_count += 1;
            }
        }
        Ok(DisableToolsResponse { updated_count })
    }

    async fn delete_server(&self, id: ServerId) -> ApiResult<()> {
        self.checkpoint(ApiOp::DeleteServer).await?;
        let mut state = self.state.lock();
        state
            .servers
            .remove(&id)
            .ok_or_else(|| ApiError::NotFound(format!("server {}", id)))?;
        state.stored.remove(&id);
        state.catalog.remove(&id);
        Ok(())
    }
}

/// A server record as the remote would return it
pub fn remote_server(id: i64, name: &str, status: ServerStatus) -> McpServer {
    McpServer {
        id: ServerId::new(id),
        name: name.to_string(),
        description: None,
        server_url: format!("https://{}.example.com/mcp", name.to_lowercase()),
        status,
        transport: Some(Transport::StreamableHttp),
        auth_type: AuthType::ApiToken,
        auth_performer: Some(AuthPerformer::Admin),
        tool_count: 0,
    }
}
