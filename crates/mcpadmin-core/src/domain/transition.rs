//! Connection state machine - the legal status transitions and their guards
//!
//! ```text
//!   Created ──(config: OAuth)──────────► AwaitingAuth ──(callback ok)──► FetchingTools
//!      │                                    ▲   │ (callback failed: stays)      │
//!      └──(config: None/ApiToken)───────────┼───┼──────────────────────────────►│
//!                                           │   │                               ▼
//!                         (reconnect: OAuth)│   │                           Connected
//!   Disconnected ◄──(disconnect, from any)──┴───┴──── (discovery ok / failed) ──┘
//!      └──(reconnect: None/ApiToken)──► Connected
//! ```
//!
//! Pure functions only; applying a transition to a live server is the
//! lifecycle crate's job.

use super::{AuthType, ServerStatus, Transport};
use std::fmt;

/// Something that happened to a server and may move its status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Auth configuration was persisted remotely
    AuthConfigSaved {
        auth_type: AuthType,
        transport: Option<Transport>,
    },
    OAuthCallbackSucceeded,
    OAuthCallbackFailed,
    DiscoverySucceeded,
    /// Discovery failure never blocks the connection
    DiscoveryFailed,
    DisconnectRequested,
    /// Re-uses the last saved auth configuration
    ReconnectRequested {
        auth_type: AuthType,
        transport: Option<Transport>,
    },
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthConfigSaved { .. } => "auth_config_saved",
            Self::OAuthCallbackSucceeded => "oauth_callback_succeeded",
            Self::OAuthCallbackFailed => "oauth_callback_failed",
            Self::DiscoverySucceeded => "discovery_succeeded",
            Self::DiscoveryFailed => "discovery_failed",
            Self::DisconnectRequested => "disconnect_requested",
            Self::ReconnectRequested { .. } => "reconnect_requested",
        }
    }
}

/// The event is not legal from the current status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRejected {
    pub from: ServerStatus,
    pub event: &'static str,
    pub reason: &'static str,
}

impl fmt::Display for TransitionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not allowed from {}: {}", self.event, self.from, self.reason)
    }
}

impl std::error::Error for TransitionRejected {}

/// Transition table for [`ServerStatus`]
pub struct ConnectionStateMachine;

impl ConnectionStateMachine {
    /// Compute the status reached by applying `event` in `from`
    pub fn next(from: ServerStatus, event: StatusEvent) -> Result<ServerStatus, TransitionRejected> {
        use ServerStatus::*;

        let reject = |reason| TransitionRejected {
            from,
            event: event.name(),
            reason,
        };

        match (from, event) {
            (_, StatusEvent::DisconnectRequested) => Ok(Disconnected),

            (Created, StatusEvent::AuthConfigSaved { auth_type, transport }) => {
                if transport.is_none() {
                    return Err(reject("transport must be set before connecting"));
                }
                Ok(match auth_type {
                    AuthType::OAuth => AwaitingAuth,
                    AuthType::None | AuthType::ApiToken => FetchingTools,
                })
            }
            // Changing OAuth client settings before the round-trip completes
            (AwaitingAuth, StatusEvent::AuthConfigSaved { auth_type: AuthType::OAuth, transport }) => {
                if transport.is_none() {
                    return Err(reject("transport must be set before connecting"));
                }
                Ok(AwaitingAuth)
            }
            (AwaitingAuth, StatusEvent::AuthConfigSaved { .. }) => {
                Err(reject("disconnect before switching away from OAuth"))
            }
            // Saving a new configuration on an established server reconnects with it
            (Connected | Disconnected, StatusEvent::AuthConfigSaved { auth_type, transport })
            | (Connected | Disconnected, StatusEvent::ReconnectRequested { auth_type, transport }) => {
                if transport.is_none() {
                    return Err(reject("no saved transport to reconnect with"));
                }
                Ok(match auth_type {
                    AuthType::OAuth => AwaitingAuth,
                    AuthType::None | AuthType::ApiToken => Connected,
                })
            }
            (FetchingTools, StatusEvent::AuthConfigSaved { .. }) => {
                Err(reject("tool discovery is in progress"))
            }

            (AwaitingAuth, StatusEvent::OAuthCallbackSucceeded) => Ok(FetchingTools),
            (AwaitingAuth, StatusEvent::OAuthCallbackFailed) => Ok(AwaitingAuth),
            (_, StatusEvent::OAuthCallbackSucceeded | StatusEvent::OAuthCallbackFailed) => {
                Err(reject("server is not awaiting authorization"))
            }

            (FetchingTools | Connected, StatusEvent::DiscoverySucceeded | StatusEvent::DiscoveryFailed) => {
                Ok(Connected)
            }
            (_, StatusEvent::DiscoverySucceeded | StatusEvent::DiscoveryFailed) => {
                Err(reject("tool discovery has not been reached"))
            }

            (_, StatusEvent::ReconnectRequested { .. }) => {
                Err(reject("only connected or disconnected servers can reconnect"))
            }
        }
    }

    /// Whether `from -> to` is an edge of the transition table
    pub fn is_legal_edge(from: ServerStatus, to: ServerStatus) -> bool {
        use ServerStatus::*;

        matches!(
            (from, to),
            (_, Disconnected)
                | (Created, AwaitingAuth)
                | (Created, FetchingTools)
                | (AwaitingAuth, AwaitingAuth)
                | (AwaitingAuth, FetchingTools)
                | (FetchingTools, Connected)
                | (Connected, Connected)
                | (Connected | Disconnected, AwaitingAuth)
                | (Disconnected, Connected)
        )
    }
}
