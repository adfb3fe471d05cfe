//! Shared test utilities and fixtures for McpAdmin integration tests.

pub use mcpadmin_core::{
    DomainEvent, McpServer, ServerId, ServerStatus, ToolId, ToolSnapshot,
};

/// Mock admin service
pub mod mocks;
pub use mocks::{ApiOp, MockAdminApi};

/// Lifecycle test harness
pub mod services;
pub use services::LifecycleTestHarness;

/// Install a test-friendly subscriber; `RUST_LOG` controls verbosity
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Event testing utilities
pub mod events {
    use mcpadmin_core::{DomainEvent, EventReceiver, ServerId, ServerStatus};
    use std::time::Duration;

    /// Collect events until `timeout` elapses or the bus closes
    pub async fn collect_events(rx: &mut EventReceiver, timeout: Duration) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => break, // Bus closed
                Err(_) => break,   // Timeout
            }
        }

        events
    }

    /// Wait for the first event matching `predicate`
    pub async fn wait_for_event<F>(
        rx: &mut EventReceiver,
        timeout: Duration,
        predicate: F,
    ) -> Option<DomainEvent>
    where
        F: Fn(&DomainEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(event)) if predicate(&event) => return Some(event),
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(_) => return None,
            }
        }
    }

    /// Status path of `server_id` as announced by `ServerStatusChanged`
    pub fn status_path(events: &[DomainEvent], server_id: ServerId) -> Vec<ServerStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                DomainEvent::ServerStatusChanged {
                    server_id: id, to, ..
                } if *id == server_id => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Number of `OperationFailed` events for `operation`
    pub fn failures_for(events: &[DomainEvent], operation: &str) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, DomainEvent::OperationFailed { operation: op, .. } if op == operation))
            .count()
    }
}

/// Test fixture utilities
pub mod fixtures {
    use mcpadmin_core::{AuthTemplate, ServerId, ToolId, ToolSnapshot};

    /// Tools for `server_id` from `(tool id, name)` pairs
    pub fn tools(server_id: ServerId, tools: &[(i64, &str)]) -> Vec<ToolSnapshot> {
        tools
            .iter()
            .map(|(id, name)| {
                ToolSnapshot::new(ToolId::new(*id), server_id, *name)
                    .with_description(format!("Test tool: {}", name))
            })
            .collect()
    }

    /// Jira-like catalog with three tools
    pub fn jira_tools() -> &'static [(i64, &'static str)] {
        &[(101, "search_issues"), (102, "create_issue"), (103, "add_comment")]
    }

    /// Per-user bearer header template
    pub fn bearer_template() -> AuthTemplate {
        AuthTemplate::new()
            .with_header("Authorization", "Bearer {api_key}")
            .with_required_field("api_key")
    }
}
