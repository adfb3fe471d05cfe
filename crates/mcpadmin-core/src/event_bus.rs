//! Event Bus - Central event distribution system
//!
//! All lifecycle changes flow through this bus, so the admin UI and audit
//! logging observe the same sequence of facts without sharing state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                Event Bus (broadcast channel)                  │
//! │                                                               │
//! │  Producers:                     Consumers:                    │
//! │  ├─ StatusDriver                ├─ Admin UI bridge            │
//! │  ├─ AuthenticationOrchestrator  ├─ Audit log                  │
//! │  ├─ ToolSynchronizer            └─ Tests                      │
//! │  └─ ServerRegistry                                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let event_bus = EventBus::new();
//! let sender = event_bus.sender();
//! let mut ui = event_bus.subscribe();
//!
//! sender.emit(DomainEvent::ServerConfigured { server_id });
//!
//! while let Some(event) = ui.recv().await { ... }
//! ```

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::DomainEvent;

/// Default channel capacity for the event bus
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast hub for [`DomainEvent`]s
///
/// Every subscriber receives its own copy of every event emitted after it
/// subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Handle for producers; cheap to clone
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the bus
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventSender {
    /// Emit an event, returning how many subscribers received it
    ///
    /// Having no subscribers is not an error.
    pub fn emit(&self, event: DomainEvent) -> usize {
        let type_name = event.type_name();
        let server_id = event.server_id();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(
                    event_type = type_name,
                    server_id = ?server_id,
                    receivers = count,
                    "[EventBus] Emitted event"
                );
                count
            }
            Err(_) => {
                debug!(event_type = type_name, "[EventBus] No receivers for event");
                0
            }
        }
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    /// Subscribe through a sender, for components that only hold one
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Consumer side of the bus
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once every sender is gone
    ///
    /// A lagging receiver skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped_events = skipped, "[EventBus] Receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped_events = skipped, "[EventBus] Receiver lagged on try_recv");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Shared event bus for application-wide use
pub type SharedEventBus = Arc<EventBus>;

// ============================================================================
// TESTS
// ============================================================================
