//! AuthenticationOrchestrator - auth configuration and the OAuth round-trip
//!
//! Commands:
//! - configure: validate and persist credentials, then move the server along
//!   the state machine (OAuth waits for the user, everything else discovers tools)
//! - initiate_oauth: obtain the provider redirect for an `AwaitingAuth` server
//! - complete_oauth_callback / fail_oauth_callback: the two outcomes of the return
//! - handle_oauth_return: parse a return URL and dispatch to one of the above
//!
//! The OAuth callback is one-shot per round-trip: a re-run of the return handler
//! (page reload, duplicate navigation) is acknowledged without side effects.

use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use mcpadmin_core::{
    AuthConfig, AuthError, AuthPerformer, AuthType, ConfigError, ConnectionStateMachine,
    DomainEvent, EventSender, McpAdminApi, McpServer, OAuthCallback, OAuthConnectRequest,
    PreconditionFailed, Secret, ServerConfigRequest, ServerId, ServerStatus, StatusEvent,
    Transport,
};

use crate::driver::StatusDriver;
use crate::registry::{CallbackClaim, ServerRegistry};
use crate::report::report;
use crate::tools::ToolSynchronizer;

const OP_CONFIGURE: &str = "configure";
const OP_INITIATE: &str = "initiate_oauth";
const OP_COMPLETE: &str = "complete_oauth_callback";
const OP_FAIL: &str = "fail_oauth_callback";
const OP_RETURN: &str = "handle_oauth_return";

/// OAuth client registration passed to the provider on connect
#[derive(Debug, Clone, Default)]
pub struct OAuthClient {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret>,
}

impl OAuthClient {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(Secret::new(secret));
        self
    }
}

pub struct AuthenticationOrchestrator {
    registry: Arc<ServerRegistry>,
    api: Arc<dyn McpAdminApi>,
    driver: Arc<StatusDriver>,
    tools: Arc<ToolSynchronizer>,
    events: EventSender,
    include_resource_param: bool,
}

impl AuthenticationOrchestrator {
    pub(crate) fn new(
        registry: Arc<ServerRegistry>,
        api: Arc<dyn McpAdminApi>,
        driver: Arc<StatusDriver>,
        tools: Arc<ToolSynchronizer>,
        events: EventSender,
        include_resource_param: bool,
    ) -> Self {
        Self {
            registry,
            api,
            driver,
            tools,
            events,
            include_resource_param,
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Persist an auth configuration and move the server along
    ///
    /// `auth_performer` is forced to `PerUser` for OAuth and cleared for `None`.
    /// Credentials are validated before anything is sent; a remote failure
    /// leaves the server exactly as it was.
    pub async fn configure(
        &self,
        id: ServerId,
        transport: Transport,
        auth_type: AuthType,
        auth_performer: Option<AuthPerformer>,
        config: AuthConfig,
    ) -> Result<McpServer, ConfigError> {
        let result = self
            .configure_inner(id, transport, auth_type, auth_performer, config)
            .await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_CONFIGURE, e);
        }
        result
    }

    async fn configure_inner(
        &self,
        id: ServerId,
        transport: Transport,
        auth_type: AuthType,
        requested: Option<AuthPerformer>,
        config: AuthConfig,
    ) -> Result<McpServer, ConfigError> {
        let performer = McpServer::normalized_performer(auth_type, requested);
        if requested.is_some() && requested != performer {
            debug!(
                server_id = %id,
                auth_type = ?auth_type,
                requested = ?requested,
                effective = ?performer,
                "[AuthOrchestrator] Overriding requested auth performer"
            );
        }
        config.validate(auth_type, performer)?;

        let _guard = self.registry.begin_operation(id, OP_CONFIGURE)?;
        let view = self
            .registry
            .view(id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, OP_CONFIGURE))?;

        let event = StatusEvent::AuthConfigSaved {
            auth_type,
            transport: Some(transport),
        };
        // Checked before the save so an illegal transition never persists credentials
        ConnectionStateMachine::next(view.server.status, event).map_err(|r| {
            PreconditionFailed::new(id, OP_CONFIGURE, Some(view.server.status), r.to_string())
        })?;

        let request = ServerConfigRequest::new(&view.server, transport, auth_type, performer, config);
        self.api.save_server_config(&request).await?;
        self.registry
            .record_auth_config(id, view.flow_id, OP_CONFIGURE, transport, auth_type, performer)?;

        info!(
            server_id = %id,
            transport = ?transport,
            auth_type = ?auth_type,
            auth_performer = ?performer,
            "[AuthOrchestrator] Auth configuration saved"
        );
        self.events.emit(DomainEvent::ServerConfigured { server_id: id });

        let transitioned = self
            .driver
            .advance(id, event, OP_CONFIGURE, Some(view.flow_id), None)
            .await?;

        // Reported by the synchronizer; a failed discovery never fails the save
        if transitioned.needs_discovery || transitioned.status == ServerStatus::Connected {
            let _ = self.tools.discover_locked(id).await;
        }

        self.registry
            .get(id)
            .ok_or_else(|| PreconditionFailed::stale_unknown(id, OP_CONFIGURE).into())
    }

    // =========================================================================
    // OAuth round-trip
    // =========================================================================

    /// Request the provider authorization URL for an `AwaitingAuth` server
    ///
    /// `return_path` must be site-relative; the provider sends the user agent
    /// back there with the server id in the query string.
    pub async fn initiate_oauth(
        &self,
        id: ServerId,
        client: OAuthClient,
        return_path: &str,
    ) -> Result<Url, AuthError> {
        let result = self.initiate_inner(id, client, return_path).await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_INITIATE, e);
        }
        result
    }

    async fn initiate_inner(
        &self,
        id: ServerId,
        client: OAuthClient,
        return_path: &str,
    ) -> Result<Url, AuthError> {
        validate_return_path(return_path)?;

        let _guard = self.registry.begin_operation(id, OP_INITIATE)?;
        let view = self
            .registry
            .view(id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, OP_INITIATE))?;

        if view.server.auth_type != AuthType::OAuth {
            return Err(AuthError::NotOAuth(id));
        }
        if view.server.status != ServerStatus::AwaitingAuth {
            return Err(PreconditionFailed::new(
                id,
                OP_INITIATE,
                Some(view.server.status),
                "server is not awaiting authorization",
            )
            .into());
        }

        let request = OAuthConnectRequest {
            server_id: id,
            oauth_client_id: client.client_id,
            oauth_client_secret: client.client_secret,
            return_path: return_path.to_string(),
            include_resource_param: self.include_resource_param,
        };
        let response = self.api.connect_oauth(&request).await?;
        let redirect = parse_redirect(&response.oauth_url)?;

        match self.registry.status_and_flow(id) {
            Some((ServerStatus::AwaitingAuth, flow)) if flow == view.flow_id => {}
            Some((status, _)) => return Err(PreconditionFailed::stale(id, OP_INITIATE, status).into()),
            None => return Err(PreconditionFailed::stale_unknown(id, OP_INITIATE).into()),
        }
        self.registry.reset_oauth_callback(id);

        info!(
            server_id = %id,
            provider = redirect.host_str().unwrap_or_default(),
            "[AuthOrchestrator] OAuth redirect ready"
        );
        Ok(redirect)
    }

    /// The provider reported success: move to `FetchingTools` and discover
    ///
    /// Runs at most once per round-trip; later calls return `Ok` and do nothing.
    pub async fn complete_oauth_callback(&self, id: ServerId) -> Result<(), AuthError> {
        let result = self.complete_inner(id).await;
        if let Err(e) = &result {
            report!(&self.events, Some(id), OP_COMPLETE, e);
        }
        result
    }

    async fn complete_inner(&self, id: ServerId) -> Result<(), AuthError> {
        if self.registry.claim_oauth_callback(id, OP_COMPLETE)? == CallbackClaim::AlreadyHandled {
            debug!(server_id = %id, "[AuthOrchestrator] OAuth callback already handled");
            return Ok(());
        }

        let _guard = match self.registry.begin_operation(id, OP_COMPLETE) {
            Ok(guard) => guard,
            Err(p) => {
                self.registry.release_oauth_callback(id);
                return Err(p.into());
            }
        };

        let transitioned = match self
            .driver
            .advance(id, StatusEvent::OAuthCallbackSucceeded, OP_COMPLETE, None, None)
            .await
        {
            Ok(t) => t,
            Err(e) => {
                self.registry.release_oauth_callback(id);
                return Err(e.into());
            }
        };

        info!(server_id = %id, "[AuthOrchestrator] OAuth completed");
        if transitioned.needs_discovery {
            let _ = self.tools.discover_locked(id).await;
        }
        Ok(())
    }

    /// The provider reported failure: stay in `AwaitingAuth` and surface it
    ///
    /// Returns the error that was surfaced.
    pub async fn fail_oauth_callback(&self, id: ServerId, message: impl Into<String>) -> AuthError {
        let message = message.into();
        let err = match self
            .driver
            .advance(id, StatusEvent::OAuthCallbackFailed, OP_FAIL, None, None)
            .await
        {
            Ok(_) => AuthError::CallbackFailed(message),
            Err(e) => e.into(),
        };
        report!(&self.events, Some(id), OP_FAIL, err);
        err
    }

    /// Dispatch an OAuth return URL (absolute, or a path with query string)
    pub async fn handle_oauth_return(&self, return_url: &str) -> Result<ServerId, AuthError> {
        let callback = match OAuthCallback::from_return_url(return_url) {
            Ok(callback) => callback,
            Err(e) => {
                report!(&self.events, None, OP_RETURN, e);
                return Err(e);
            }
        };

        if let Some(error) = callback.error {
            return Err(self.fail_oauth_callback(callback.server_id, error).await);
        }
        if !callback.trigger_fetch {
            debug!(server_id = %callback.server_id, "[AuthOrchestrator] Return without fetch trigger");
            return Ok(callback.server_id);
        }
        self.complete_oauth_callback(callback.server_id).await?;
        Ok(callback.server_id)
    }
}

fn validate_return_path(path: &str) -> Result<(), AuthError> {
    let site_relative = path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_whitespace);
    if site_relative {
        Ok(())
    } else {
        Err(AuthError::InvalidReturnPath(path.to_string()))
    }
}

fn parse_redirect(raw: &str) -> Result<Url, AuthError> {
    let url = Url::parse(raw.trim()).map_err(|e| AuthError::InvalidRedirect(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AuthError::InvalidRedirect(raw.to_string()));
    }
    Ok(url)
}
