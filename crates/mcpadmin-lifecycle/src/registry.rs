//! ServerRegistry - the owned, single source of truth for servers and tools
//!
//! Queries are public. Every mutation is crate-private and goes through the
//! controllers, so callers never observe a partially-updated server.
//!
//! Per-server bookkeeping:
//! - flow_id: Monotonic counter, bumped on every status change; results of remote
//!   calls are committed only if the flow id captured before the call is unchanged
//! - op_mutex: Taken with `try_lock_owned` for the duration of configure/discover
//!   style operations so at most one is in flight per server
//! - busy: Set while an `OperationGuard` is alive; queries read it instead of
//!   probing the mutex
//! - oauth_callback_consumed: One-shot flag guarding callback-triggered discovery

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use mcpadmin_core::{
    sort_tools, AuthPerformer, AuthType, DiscoveryError, DomainEvent, EventSender, McpAdminApi,
    McpServer, PreconditionFailed, ServerId, ServerStatus, ToolId, ToolSnapshot, Transport,
};

use crate::optimistic::ToolPatch;

struct ServerEntry {
    server: McpServer,
    tools: Vec<ToolSnapshot>,
    flow_id: u64,
    has_connected_before: bool,
    oauth_callback_consumed: bool,
    op_mutex: Arc<Mutex<()>>,
    busy: Arc<AtomicBool>,
}

impl ServerEntry {
    fn new(server: McpServer) -> Self {
        let has_connected_before = server.status == ServerStatus::Connected;
        Self {
            server,
            tools: Vec::new(),
            flow_id: 0,
            has_connected_before,
            oauth_callback_consumed: false,
            op_mutex: Arc::new(Mutex::new(())),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    fn in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn set_tools(&mut self, tools: Vec<ToolSnapshot>) {
        self.tools = tools;
        self.server.tool_count = self.tools.len();
    }
}

/// Point-in-time view of one server's lifecycle state
#[derive(Debug, Clone, PartialEq)]
pub struct ServerView {
    pub server: McpServer,
    pub flow_id: u64,
    pub has_connected_before: bool,
    pub operation_in_flight: bool,
}

/// Held while a serialized operation runs; dropping it releases the server
pub struct OperationGuard {
    server_id: ServerId,
    operation: &'static str,
    busy: Arc<AtomicBool>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        // Cleared before the mutex guard field is released
        self.busy.store(false, Ordering::Release);
        debug!(
            server_id = %self.server_id,
            operation = self.operation,
            "[ServerRegistry] Operation finished"
        );
    }
}

/// What a status commit must still find to be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expected {
    /// Nothing changed since the caller read `from` at `flow_id`
    Flow { flow_id: u64, from: ServerStatus },
    /// Apply from whatever the current status is (disconnect)
    Any,
}

/// Result of a committed status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Committed {
    pub from: ServerStatus,
    pub to: ServerStatus,
    pub flow_id: u64,
}

/// Outcome of claiming the one-shot OAuth callback flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackClaim {
    /// First run for this round-trip; the caller owns the completion
    Claimed,
    /// Already handled by an earlier run of the callback handler
    AlreadyHandled,
}

/// Previous `enabled` values of tools touched by an optimistic patch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PatchSnapshot {
    pub previous: BTreeMap<ToolId, (ServerId, bool)>,
}

impl PatchSnapshot {
    pub fn servers(&self) -> BTreeSet<ServerId> {
        self.previous.values().map(|(server_id, _)| *server_id).collect()
    }

    pub fn for_server(&self, server_id: ServerId) -> PatchSnapshot {
        PatchSnapshot {
            previous: self
                .previous
                .iter()
                .filter(|(_, (owner, _))| *owner == server_id)
                .map(|(tool_id, value)| (*tool_id, *value))
                .collect(),
        }
    }
}

/// Registry of known servers and their tool inventories
#[derive(Default)]
pub struct ServerRegistry {
    entries: RwLock<BTreeMap<ServerId, ServerEntry>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn list(&self) -> Vec<McpServer> {
        self.entries.read().values().map(|e| e.server.clone()).collect()
    }

    pub fn get(&self, id: ServerId) -> Option<McpServer> {
        self.entries.read().get(&id).map(|e| e.server.clone())
    }

    pub fn view(&self, id: ServerId) -> Option<ServerView> {
        self.entries.read().get(&id).map(|e| ServerView {
            server: e.server.clone(),
            flow_id: e.flow_id,
            has_connected_before: e.has_connected_before,
            operation_in_flight: e.in_flight(),
        })
    }

    pub fn status(&self, id: ServerId) -> Option<ServerStatus> {
        self.entries.read().get(&id).map(|e| e.server.status)
    }

    pub fn contains(&self, id: ServerId) -> bool {
        self.entries.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn tools(&self, id: ServerId) -> Vec<ToolSnapshot> {
        self.entries
            .read()
            .get(&id)
            .map(|e| e.tools.clone())
            .unwrap_or_default()
    }

    pub fn tool(&self, tool_id: ToolId) -> Option<ToolSnapshot> {
        self.entries
            .read()
            .values()
            .flat_map(|e| e.tools.iter())
            .find(|t| t.id == tool_id)
            .cloned()
    }

    pub fn tools_matching(&self, id: ServerId, query: &str) -> Vec<ToolSnapshot> {
        self.entries
            .read()
            .get(&id)
            .map(|e| e.tools.iter().filter(|t| t.matches(query)).cloned().collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Source-of-truth refresh
    // =========================================================================

    /// Re-read the server list from the remote service
    ///
    /// Servers missing remotely are dropped with their tools. Servers with an
    /// operation in flight keep their local status; the rest adopt the remote
    /// status and have their flow id bumped so stale results are discarded.
    pub async fn refresh(
        &self,
        api: &dyn McpAdminApi,
        events: &EventSender,
    ) -> Result<usize, DiscoveryError> {
        let servers = api.list_servers().await.map_err(DiscoveryError::Remote)?;
        let count = self.sync_from(servers);
        info!(server_count = count, "[ServerRegistry] Refreshed");
        events.emit(DomainEvent::RegistryRefreshed { server_count: count });
        Ok(count)
    }

    pub(crate) fn sync_from(&self, servers: Vec<McpServer>) -> usize {
        let mut entries = self.entries.write();
        let remote_ids: BTreeSet<ServerId> = servers.iter().map(|s| s.id).collect();

        entries.retain(|id, _| {
            let keep = remote_ids.contains(id);
            if !keep {
                debug!(server_id = %id, "[ServerRegistry] Dropping server missing remotely");
            }
            keep
        });

        for remote in servers {
            match entries.get_mut(&remote.id) {
                Some(entry) => {
                    let local_status = entry.server.status;
                    let in_flight = entry.in_flight();
                    let tools_loaded = entry.has_connected_before;
                    let tool_count = entry.server.tool_count;

                    entry.server = remote;
                    if tools_loaded {
                        entry.server.tool_count = tool_count;
                    }
                    if in_flight {
                        entry.server.status = local_status;
                    } else if entry.server.status != local_status {
                        entry.flow_id += 1;
                        if entry.server.status == ServerStatus::AwaitingAuth {
                            entry.oauth_callback_consumed = false;
                        }
                        debug!(
                            server_id = %entry.server.id,
                            local = ?local_status,
                            remote = ?entry.server.status,
                            "[ServerRegistry] Adopted remote status"
                        );
                    }
                    if entry.server.status == ServerStatus::Connected {
                        entry.has_connected_before = true;
                    }
                }
                None => {
                    entries.insert(remote.id, ServerEntry::new(remote));
                }
            }
        }
        entries.len()
    }

    // =========================================================================
    // Crate-private mutations
    // =========================================================================

    pub(crate) fn insert(&self, server: McpServer) {
        self.entries.write().insert(server.id, ServerEntry::new(server));
    }

    /// Remove a server and, with it, all of its tools
    pub(crate) fn remove(&self, id: ServerId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    pub(crate) fn begin_operation(
        &self,
        id: ServerId,
        operation: &'static str,
    ) -> Result<OperationGuard, PreconditionFailed> {
        let entries = self.entries.read();
        let entry = entries
            .get(&id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, operation))?;
        let guard = entry
            .op_mutex
            .clone()
            .try_lock_owned()
            .map_err(|_| PreconditionFailed::in_flight(id, operation, entry.server.status))?;
        entry.busy.store(true, Ordering::Release);
        Ok(OperationGuard {
            server_id: id,
            operation,
            busy: entry.busy.clone(),
            _guard: guard,
        })
    }

    pub(crate) fn status_and_flow(&self, id: ServerId) -> Option<(ServerStatus, u64)> {
        self.entries
            .read()
            .get(&id)
            .map(|e| (e.server.status, e.flow_id))
    }

    /// Apply a status change computed by the state machine
    ///
    /// `remote` carries the record returned by the remote service; its metadata
    /// is adopted but the committed status always wins. `tools` may only be
    /// installed together with a move into `Connected`.
    pub(crate) fn commit_status(
        &self,
        id: ServerId,
        expected: Expected,
        to: ServerStatus,
        operation: &'static str,
        remote: Option<McpServer>,
        tools: Option<Vec<ToolSnapshot>>,
    ) -> Result<Committed, PreconditionFailed> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| PreconditionFailed::stale_unknown(id, operation))?;

        let from = entry.server.status;
        if let Expected::Flow { flow_id, from: expected_from } = expected {
            if entry.flow_id != flow_id || from != expected_from {
                return Err(PreconditionFailed::stale(id, operation, from));
            }
        }

        if let Some(remote) = remote {
            let tool_count = entry.server.tool_count;
            entry.server = remote;
            entry.server.tool_count = tool_count;
        }
        entry.server.status = to;

        if to != from {
            entry.flow_id += 1;
        }
        if to == ServerStatus::AwaitingAuth && from != ServerStatus::AwaitingAuth {
            entry.oauth_callback_consumed = false;
        }
        if to == ServerStatus::Connected {
            entry.has_connected_before = true;
            if let Some(tools) = tools {
                entry.set_tools(normalize_tools(id, tools));
            }
        }

        Ok(Committed {
            from,
            to,
            flow_id: entry.flow_id,
        })
    }

    /// Mirror a saved auth configuration locally
    pub(crate) fn record_auth_config(
        &self,
        id: ServerId,
        flow_id: u64,
        operation: &'static str,
        transport: Transport,
        auth_type: AuthType,
        auth_performer: Option<AuthPerformer>,
    ) -> Result<(), PreconditionFailed> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| PreconditionFailed::stale_unknown(id, operation))?;
        if entry.flow_id != flow_id {
            return Err(PreconditionFailed::stale(id, operation, entry.server.status));
        }
        entry.server.transport = Some(transport);
        entry.server.auth_type = auth_type;
        entry.server.auth_performer = auth_performer;
        Ok(())
    }

    /// Replace a connected server's tool list wholesale
    ///
    /// With `expected_flow`, the replacement is discarded if the server moved on.
    pub(crate) fn replace_tools(
        &self,
        id: ServerId,
        expected_flow: Option<u64>,
        operation: &'static str,
        tools: Vec<ToolSnapshot>,
    ) -> Result<usize, PreconditionFailed> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| PreconditionFailed::stale_unknown(id, operation))?;
        if expected_flow.is_some_and(|flow| flow != entry.flow_id) {
            return Err(PreconditionFailed::stale(id, operation, entry.server.status));
        }
        if !entry.has_connected_before {
            return Err(PreconditionFailed::new(
                id,
                operation,
                Some(entry.server.status),
                "tools can only be stored for a server that has connected",
            ));
        }
        entry.set_tools(normalize_tools(id, tools));
        Ok(entry.tools.len())
    }

    pub(crate) fn claim_oauth_callback(
        &self,
        id: ServerId,
        operation: &'static str,
    ) -> Result<CallbackClaim, PreconditionFailed> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| PreconditionFailed::unknown_server(id, operation))?;

        if entry.oauth_callback_consumed {
            return Ok(CallbackClaim::AlreadyHandled);
        }
        if entry.server.status != ServerStatus::AwaitingAuth {
            return Err(PreconditionFailed::new(
                id,
                operation,
                Some(entry.server.status),
                "server is not awaiting authorization",
            ));
        }
        entry.oauth_callback_consumed = true;
        Ok(CallbackClaim::Claimed)
    }

    /// Undo a claim whose completion failed, so the callback can be retried
    pub(crate) fn release_oauth_callback(&self, id: ServerId) {
        if let Some(entry) = self.entries.write().get_mut(&id) {
            entry.oauth_callback_consumed = false;
        }
    }

    /// Arm the one-shot flag for a new OAuth round-trip
    pub(crate) fn reset_oauth_callback(&self, id: ServerId) {
        self.release_oauth_callback(id);
    }

    /// Apply a tentative tool change and return what it overwrote
    pub(crate) fn apply_tool_patch(&self, patch: &ToolPatch) -> PatchSnapshot {
        let mut entries = self.entries.write();
        let mut snapshot = PatchSnapshot::default();
        for entry in entries.values_mut() {
            let server_id = entry.server.id;
            for tool in entry.tools.iter_mut() {
                if let Some(enabled) = patch.change_for(tool.id) {
                    snapshot.previous.insert(tool.id, (server_id, tool.enabled));
                    tool.enabled = enabled;
                }
            }
        }
        snapshot
    }

    /// Put back the values a patch overwrote, for tools that still exist
    pub(crate) fn restore_tools(&self, snapshot: &PatchSnapshot) {
        let mut entries = self.entries.write();
        for (tool_id, (server_id, enabled)) in &snapshot.previous {
            if let Some(tool) = entries
                .get_mut(server_id)
                .and_then(|e| e.tools.iter_mut().find(|t| t.id == *tool_id))
            {
                tool.enabled = *enabled;
            }
        }
    }
}

fn normalize_tools(id: ServerId, tools: Vec<ToolSnapshot>) -> Vec<ToolSnapshot> {
    let mut seen = BTreeSet::new();
    let mut owned: Vec<ToolSnapshot> = tools
        .into_iter()
        .filter(|t| seen.insert(t.id))
        .filter(|t| {
            let ours = t.server_id == id;
            if !ours {
                warn!(
                    server_id = %id,
                    tool_id = %t.id,
                    owner = %t.server_id,
                    "[ServerRegistry] Ignoring tool owned by another server"
                );
            }
            ours
        })
        .collect();
    sort_tools(&mut owned);
    owned
}
