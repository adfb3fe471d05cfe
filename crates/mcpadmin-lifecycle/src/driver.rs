//! StatusDriver - applies state machine transitions to live servers
//!
//! Every status change goes through here:
//! 1. Compute the target with `ConnectionStateMachine::next` (rejections become
//!    `PreconditionFailed`)
//! 2. Persist the new status remotely; a remote failure leaves local state untouched
//! 3. Commit locally only if the flow id captured in step 1 is unchanged
//! 4. Emit `ServerStatusChanged`
//!
//! If step 3 finds the server moved on (disconnect won the race), the remote
//! status is re-asserted from the local one.

use std::sync::Arc;
use tracing::{debug, info, warn};

use mcpadmin_core::{
    ApiError, AuthError, ConfigError, ConnectionStateMachine, DiscoveryError, DomainEvent,
    EventSender, McpAdminApi, PreconditionFailed, ServerId, ServerStatus, StatusEvent, ToolError,
    ToolSnapshot,
};

use crate::registry::{Committed, Expected, ServerRegistry};

/// Why a transition was not applied
#[derive(Debug, Clone)]
pub(crate) enum DriveError {
    Precondition(PreconditionFailed),
    Remote(ApiError),
}

impl From<PreconditionFailed> for DriveError {
    fn from(p: PreconditionFailed) -> Self {
        Self::Precondition(p)
    }
}

impl From<ApiError> for DriveError {
    fn from(e: ApiError) -> Self {
        Self::Remote(e)
    }
}

macro_rules! impl_from_drive_error {
    ($($ty:ty),*) => {
        $(
            impl From<DriveError> for $ty {
                fn from(e: DriveError) -> Self {
                    match e {
                        DriveError::Precondition(p) => Self::Precondition(p),
                        DriveError::Remote(r) => Self::Remote(r),
                    }
                }
            }
        )*
    };
}

impl_from_drive_error!(ConfigError, AuthError, DiscoveryError, ToolError);

/// A transition that was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transitioned {
    pub from: ServerStatus,
    pub status: ServerStatus,
    pub flow_id: u64,
    /// Set exactly once per entry into `FetchingTools`; the caller holding the
    /// operation guard runs discovery next
    pub needs_discovery: bool,
}

pub(crate) struct StatusDriver {
    registry: Arc<ServerRegistry>,
    api: Arc<dyn McpAdminApi>,
    events: EventSender,
}

impl StatusDriver {
    pub fn new(registry: Arc<ServerRegistry>, api: Arc<dyn McpAdminApi>, events: EventSender) -> Self {
        Self {
            registry,
            api,
            events,
        }
    }

    /// Apply `event`, optionally requiring the server to still be at `flow`
    ///
    /// `tools` is installed atomically with the move into `Connected`.
    pub async fn advance(
        &self,
        id: ServerId,
        event: StatusEvent,
        operation: &'static str,
        flow: Option<u64>,
        tools: Option<Vec<ToolSnapshot>>,
    ) -> Result<Transitioned, DriveError> {
        let (from, current_flow) = self
            .registry
            .status_and_flow(id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, operation))?;

        if flow.is_some_and(|f| f != current_flow) {
            return Err(PreconditionFailed::stale(id, operation, from).into());
        }

        let to = ConnectionStateMachine::next(from, event)
            .map_err(|r| PreconditionFailed::new(id, operation, Some(from), r.to_string()))?;

        let remote = if to != from {
            Some(self.api.set_status(id, to).await?)
        } else {
            None
        };

        let expected = Expected::Flow {
            flow_id: current_flow,
            from,
        };
        match self
            .registry
            .commit_status(id, expected, to, operation, remote, tools)
        {
            Ok(committed) => {
                self.announce(id, event, committed);
                Ok(Transitioned {
                    from,
                    status: to,
                    flow_id: committed.flow_id,
                    needs_discovery: to == ServerStatus::FetchingTools
                        && from != ServerStatus::FetchingTools,
                })
            }
            Err(stale) => {
                if to != from {
                    self.compensate(id, operation).await;
                }
                Err(stale.into())
            }
        }
    }

    /// Move to `Disconnected` from whatever the current status is
    ///
    /// Returns `None` when the server was already disconnected.
    pub async fn disconnect(
        &self,
        id: ServerId,
        operation: &'static str,
    ) -> Result<Option<Committed>, DriveError> {
        let from = self
            .registry
            .status(id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, operation))?;
        if from == ServerStatus::Disconnected {
            debug!(server_id = %id, "[StatusDriver] Already disconnected");
            return Ok(None);
        }

        let remote = self.api.set_status(id, ServerStatus::Disconnected).await?;
        let committed = self.registry.commit_status(
            id,
            Expected::Any,
            ServerStatus::Disconnected,
            operation,
            Some(remote),
            None,
        )?;
        self.announce(id, StatusEvent::DisconnectRequested, committed);
        Ok(Some(committed))
    }

    fn announce(&self, id: ServerId, event: StatusEvent, committed: Committed) {
        if committed.from == committed.to {
            debug!(
                server_id = %id,
                status = %committed.to,
                event = event.name(),
                "[StatusDriver] Status unchanged"
            );
            return;
        }
        info!(
            server_id = %id,
            from = %committed.from,
            to = %committed.to,
            event = event.name(),
            flow_id = committed.flow_id,
            "[StatusDriver] Status changed"
        );
        self.events.emit(DomainEvent::ServerStatusChanged {
            server_id: id,
            from: committed.from,
            to: committed.to,
            flow_id: committed.flow_id,
        });
    }

    /// Re-assert the local status remotely after a lost race
    async fn compensate(&self, id: ServerId, operation: &'static str) {
        let Some(local) = self.registry.status(id) else {
            return;
        };
        match self.api.set_status(id, local).await {
            Ok(_) => debug!(
                server_id = %id,
                status = %local,
                operation = operation,
                "[StatusDriver] Re-asserted remote status"
            ),
            Err(e) => warn!(
                server_id = %id,
                status = %local,
                operation = operation,
                error = %e,
                "[StatusDriver] Failed to re-assert remote status"
            ),
        }
    }
}
