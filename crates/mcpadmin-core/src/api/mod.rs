//! Remote admin service port
//!
//! This trait defines the contract consumed from the remote service without
//! specifying the transport (HTTP, in-memory, etc.)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{
    AuthConfig, AuthPerformer, AuthTemplate, AuthType, McpServer, NewServer, Secret, ServerId,
    ServerStatus, ToolId, ToolSnapshot, Transport,
};
use crate::error::ApiError;

/// Result type for remote operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Body of `POST /server` when saving an auth configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfigRequest {
    pub id: ServerId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub server_url: String,
    pub transport: Transport,
    pub auth_type: AuthType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_performer: Option<AuthPerformer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_template: Option<AuthTemplate>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub user_credentials: BTreeMap<String, Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_client_secret: Option<Secret>,
}

impl ServerConfigRequest {
    /// Build the request for `server`, keeping only the credentials that
    /// belong to the chosen auth type and performer
    pub fn new(
        server: &McpServer,
        transport: Transport,
        auth_type: AuthType,
        auth_performer: Option<AuthPerformer>,
        config: AuthConfig,
    ) -> Self {
        let AuthConfig {
            api_token,
            auth_template,
            user_credentials,
            oauth_client_id,
            oauth_client_secret,
        } = config;

        let mut request = Self {
            id: server.id,
            name: server.name.clone(),
            description: server.description.clone(),
            server_url: server.server_url.clone(),
            transport,
            auth_type,
            auth_performer,
            api_token: None,
            auth_template: None,
            user_credentials: BTreeMap::new(),
            oauth_client_id: None,
            oauth_client_secret: None,
        };

        match (auth_type, auth_performer) {
            (AuthType::ApiToken, Some(AuthPerformer::Admin)) => request.api_token = api_token,
            (AuthType::ApiToken, Some(AuthPerformer::PerUser)) => {
                request.auth_template = auth_template;
                request.user_credentials = user_credentials;
            }
            (AuthType::OAuth, _) => {
                request.oauth_client_id = oauth_client_id;
                request.oauth_client_secret = oauth_client_secret;
            }
            _ => {}
        }
        request
    }
}

/// Body of `POST /oauth/connect`
#[derive(Debug, Clone, Serialize)]
pub struct OAuthConnectRequest {
    pub server_id: ServerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_client_secret: Option<Secret>,
    pub return_path: String,
    pub include_resource_param: bool,
}

/// Response of `POST /oauth/connect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConnectResponse {
    pub oauth_url: String,
}

/// Body of `POST /tools/disable-all`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableToolsRequest {
    pub tool_ids: Vec<ToolId>,
}

/// Response of `POST /tools/disable-all`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableToolsResponse {
    pub updated_count: usize,
}

/// Remote admin service consumed by the lifecycle controllers
#[async_trait]
pub trait McpAdminApi: Send + Sync {
    /// `GET /servers`
    async fn list_servers(&self) -> ApiResult<Vec<McpServer>>;

    /// `POST /server` without an id; the record starts in `Created`
    async fn create_server(&self, server: &NewServer) -> ApiResult<McpServer>;

    /// `POST /server` with the auth configuration
    async fn save_server_config(&self, request: &ServerConfigRequest) -> ApiResult<McpServer>;

    /// `PATCH /server/{id}/status?status={status}`
    async fn set_status(&self, id: ServerId, status: ServerStatus) -> ApiResult<McpServer>;

    /// `POST /oauth/connect`
    async fn connect_oauth(&self, request: &OAuthConnectRequest) -> ApiResult<OAuthConnectResponse>;

    /// `POST /server/{id}/tools/refresh`; the caller re-reads the tool list
    async fn refresh_tools(&self, id: ServerId) -> ApiResult<()>;

    /// `GET /server/{id}/tools`
    async fn list_tools(&self, id: ServerId) -> ApiResult<Vec<ToolSnapshot>>;

    /// `PATCH /tool/{id}?enabled={bool}`
    async fn set_tool_enabled(&self, tool_id: ToolId, enabled: bool) -> ApiResult<()>;

    /// `POST /tools/disable-all`
    async fn disable_tools(&self, tool_ids: &[ToolId]) -> ApiResult<DisableToolsResponse>;

    /// `DELETE /server/{id}`; cascades to the server's tools
    async fn delete_server(&self, id: ServerId) -> ApiResult<()>;
}
