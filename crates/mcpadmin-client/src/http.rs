//! HTTP implementation of the admin service port

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use mcpadmin_core::{
    ApiError, ApiResult, DisableToolsRequest, DisableToolsResponse, McpAdminApi, McpServer,
    NewServer, OAuthConnectRequest, OAuthConnectResponse, ServerConfigRequest, ServerId,
    ServerStatus, ToolId, ToolSnapshot,
};

use crate::config::ClientConfig;

/// Error body shape returned by the admin service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    detail: serde_json::Value,
}

/// reqwest-backed [`McpAdminApi`]
pub struct HttpAdminApi {
    config: ClientConfig,
    client: reqwest::Client,
}

impl HttpAdminApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self
            .config
            .endpoint(path)
            .map_err(|e| ApiError::Transport(format!("{:#}", e)))?;

        debug!(method = %method, url = %url, "[HttpAdminApi] Request");

        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.config.bearer_token {
            builder = builder.bearer_auth(token.expose());
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> ApiResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        warn!(
            status = status.as_u16(),
            what = what,
            message = %message,
            "[HttpAdminApi] Remote returned an error"
        );

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(what.to_string()));
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> ApiResult<T> {
        self.send(builder, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{}: {}", what, e)))
    }
}

fn error_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => Some(s),
        Ok(ErrorBody { detail }) => Some(detail.to_string()),
        Err(_) => Some(body.trim().to_string()),
    }
}

#[async_trait]
impl McpAdminApi for HttpAdminApi {
    async fn list_servers(&self) -> ApiResult<Vec<McpServer>> {
        let builder = self.request(Method::GET, "servers")?;
        self.send_json(builder, "servers").await
    }

    async fn create_server(&self, server: &NewServer) -> ApiResult<McpServer> {
        let builder = self.request(Method::POST, "server")?.json(server);
        self.send_json(builder, "server").await
    }

    async fn save_server_config(&self, request: &ServerConfigRequest) -> ApiResult<McpServer> {
        let builder = self.request(Method::POST, "server")?.json(request);
        self.send_json(builder, &format!("server {}", request.id)).await
    }

    async fn set_status(&self, id: ServerId, status: ServerStatus) -> ApiResult<McpServer> {
        let builder = self
            .request(Method::PATCH, &format!("server/{}/status", id))?
            .query(&[("status", status.as_str())]);
        self.send_json(builder, &format!("server {}", id)).await
    }

    async fn connect_oauth(&self, request: &OAuthConnectRequest) -> ApiResult<OAuthConnectResponse> {
        let builder = self.request(Method::POST, "oauth/connect")?.json(request);
        self.send_json(builder, &format!("server {}", request.server_id))
            .await
    }

    async fn refresh_tools(&self, id: ServerId) -> ApiResult<()> {
        let builder = self.request(Method::POST, &format!("server/{}/tools/refresh", id))?;
        self.send(builder, &format!("server {}", id)).await?;
        Ok(())
    }

    async fn list_tools(&self, id: ServerId) -> ApiResult<Vec<ToolSnapshot>> {
        let builder = self.request(Method::GET, &format!("server/{}/tools", id))?;
        self.send_json(builder, &format!("server {}", id)).await
    }

    async fn set_tool_enabled(&self, tool_id: ToolId, enabled: bool) -> ApiResult<()> {
        let builder = self
            .request(Method::PATCH, &format!("tool/{}", tool_id))?
            .query(&[("enabled", enabled)]);
        self.send(builder, &format!("tool {}", tool_id)).await?;
        Ok(())
    }

    async fn disable_tools(&self, tool_ids: &[ToolId]) -> ApiResult<DisableToolsResponse> {
        let body = DisableToolsRequest {
            tool_ids: tool_ids.to_vec(),
        };
        let builder = self.request(Method::POST, "tools/disable-all")?.json(&body);
        self.send_json(builder, "tools").await
    }

    async fn delete_server(&self, id: ServerId) -> ApiResult<()> {
        let builder = self.request(Method::DELETE, &format!("server/{}", id))?;
        self.send(builder, &format!("server {}", id)).await?;
        Ok(())
    }
}
