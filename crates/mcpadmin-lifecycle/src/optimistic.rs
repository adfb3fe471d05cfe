//! OptimisticMutationController - tentative tool changes with reconciliation
//!
//! A patch is applied to the registry before the remote call so the UI reflects
//! it immediately. Afterwards the cached tools are re-read:
//! - On success: in the background, tracked per server. A newer reconcile aborts
//!   an older one still running for the same server.
//! - On failure: inline, before the error is returned, so the rollback is visible
//!   to the caller. If the re-read fails too, the overwritten values are restored.

use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcpadmin_core::{
    ApiError, ApiResult, DomainEvent, EventSender, McpAdminApi, ServerId, ToolId,
};

use crate::registry::{PatchSnapshot, ServerRegistry};
use crate::report;

/// Tentative change to the `enabled` flag of one or more tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPatch {
    changes: BTreeMap<ToolId, bool>,
}

impl ToolPatch {
    pub fn set_enabled(tool_id: ToolId, enabled: bool) -> Self {
        Self {
            changes: BTreeMap::from([(tool_id, enabled)]),
        }
    }

    pub fn disable(tool_ids: impl IntoIterator<Item = ToolId>) -> Self {
        Self {
            changes: tool_ids.into_iter().map(|id| (id, false)).collect(),
        }
    }

    pub fn change_for(&self, tool_id: ToolId) -> Option<bool> {
        self.changes.get(&tool_id).copied()
    }

    pub fn tool_ids(&self) -> Vec<ToolId> {
        self.changes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

pub struct OptimisticMutationController {
    registry: Arc<ServerRegistry>,
    api: Arc<dyn McpAdminApi>,
    events: EventSender,
    /// Background reconcile per server
    pending: DashMap<ServerId, JoinHandle<()>>,
}

impl OptimisticMutationController {
    pub(crate) fn new(
        registry: Arc<ServerRegistry>,
        api: Arc<dyn McpAdminApi>,
        events: EventSender,
    ) -> Self {
        Self {
            registry,
            api,
            events,
            pending: DashMap::new(),
        }
    }

    /// Apply `patch` locally, then run `remote`
    ///
    /// Tools the registry does not know are left to the remote call.
    pub async fn apply<T, F, Fut>(&self, patch: ToolPatch, remote: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let snapshot = self.registry.apply_tool_patch(&patch);
        let servers = snapshot.servers();
        debug!(
            changes = patch.len(),
            cached = snapshot.previous.len(),
            servers = servers.len(),
            "[Optimistic] Applied tentative patch"
        );

        match remote().await {
            Ok(value) => {
                for server_id in servers {
                    self.schedule_reconcile(server_id);
                }
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "[Optimistic] Remote mutation failed, rolling back");
                self.rollback(&servers, &snapshot).await;
                Err(e)
            }
        }
    }

    /// Wait for the background reconcile of `server_id`, if one is pending
    pub async fn wait_reconciled(&self, server_id: ServerId) {
        let Some((_, handle)) = self.pending.remove(&server_id) else {
            return;
        };
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                warn!(server_id = %server_id, error = %e, "[Optimistic] Reconcile task failed");
            }
        }
    }

    /// Servers with a reconcile scheduled and not yet awaited
    pub fn pending_servers(&self) -> BTreeSet<ServerId> {
        self.pending.iter().map(|e| *e.key()).collect()
    }

    pub(crate) fn cancel(&self, server_id: ServerId) {
        if let Some((_, handle)) = self.pending.remove(&server_id) {
            handle.abort();
        }
    }

    fn schedule_reconcile(&self, server_id: ServerId) {
        let registry = self.registry.clone();
        let api = self.api.clone();
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            match reconcile(&registry, api.as_ref(), server_id).await {
                Ok(Some(tool_count)) => {
                    events.emit(DomainEvent::ToolsReconciled {
                        server_id,
                        tool_count,
                        rolled_back: false,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(
                    server_id = %server_id,
                    error = %e,
                    "[Optimistic] Background re-read failed, keeping applied state"
                ),
            }
        });

        if let Some(previous) = self.pending.insert(server_id, handle) {
            previous.abort();
        }
    }

    async fn rollback(&self, servers: &BTreeSet<ServerId>, snapshot: &PatchSnapshot) {
        for &server_id in servers {
            // Our inline re-read supersedes anything still in flight
            self.cancel(server_id);

            let tool_count = match reconcile(&self.registry, self.api.as_ref(), server_id).await {
                Ok(Some(count)) => count,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        server_id = %server_id,
                        error = %e,
                        "[Optimistic] Re-read failed, restoring previous values"
                    );
                    self.registry.restore_tools(&snapshot.for_server(server_id));
                    self.registry.tools(server_id).len()
                }
            };
            self.events.emit(DomainEvent::ToolsReconciled {
                server_id,
                tool_count,
                rolled_back: true,
            });
        }
    }
}

impl Drop for OptimisticMutationController {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.value().abort();
        }
    }
}

/// Replace the cached tools of `server_id` with a fresh re-read
///
/// `Ok(None)` when the server can no longer hold tools (removed meanwhile).
async fn reconcile(
    registry: &ServerRegistry,
    api: &dyn McpAdminApi,
    server_id: ServerId,
) -> ApiResult<Option<usize>> {
    let tools = api.list_tools(server_id).await?;
    match registry.replace_tools(server_id, None, "reconcile", tools) {
        Ok(count) => Ok(Some(count)),
        Err(p) => {
            report::precondition(&p);
            Ok(None)
        }
    }
}
