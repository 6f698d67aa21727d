//! Connectivity link state machine.
//!
//! Pure, event-driven lifecycle for the application's single network link:
//! Disconnected → Connecting → Connected → Reconnecting → Failed. Each
//! transition yields the new state, the effects the runtime must execute
//! (start the transport, schedule a retry, announce a failure) and an audit
//! entry. Reconnection is bounded: the attempt count is carried in the
//! state data and capped by the supplied policy. `Failed` is a dead end
//! exited only by an explicit reset.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConnectivityError;
use crate::types::{ClientId, Timestamp};

// ----------------------------------------------------------------------------
// Link State Types
// ----------------------------------------------------------------------------

/// Lifecycle state of the network link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkState {
    /// No link; the initial state and the resting state after an
    /// intentional shutdown
    Disconnected(DisconnectedLink),
    /// A connection attempt is in flight, waiting on the transport
    Connecting(ConnectingLink),
    /// Live link, as client or as host
    Connected(ConnectedLink),
    /// Link lost unexpectedly; a retry is scheduled
    Reconnecting(ReconnectingLink),
    /// Connection attempts exhausted; only an explicit reset leaves this
    Failed(FailedLink),
}

/// State when no link exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectedLink {
    pub since: Timestamp,
    /// When the link was last live, if ever
    pub last_online: Option<Timestamp>,
}

/// State while a connection attempt is in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectingLink {
    pub started: Timestamp,
    /// 0 for a fresh, explicitly requested connection; n for the n-th
    /// automatic reconnect attempt
    pub attempt: u32,
}

/// State while the link is live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedLink {
    pub since: Timestamp,
    pub role: LinkRole,
    /// Transport-assigned id when connected as a client
    pub client_id: Option<ClientId>,
}

/// State while waiting out the interval before a reconnect attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectingLink {
    pub since: Timestamp,
    /// Number of this scheduled attempt, 1-based
    pub attempt: u32,
    pub retry_at: Timestamp,
}

/// State after connection attempts are exhausted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedLink {
    pub failed_at: Timestamp,
    pub reason: String,
}

/// Which side of the transport this process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkRole {
    Client,
    Host,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRole::Client => write!(f, "client"),
            LinkRole::Host => write!(f, "host"),
        }
    }
}

// ----------------------------------------------------------------------------
// Link Events
// ----------------------------------------------------------------------------

/// Events that drive the link state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkEvent {
    /// Network mode was requested; begin connecting
    GoOnline,
    /// The transport reported a client connection
    ClientConnected { client_id: ClientId },
    /// The transport reports this process is already hosting
    AlreadyHosting,
    /// Both client start and host start failed
    StartFailed { reason: String },
    /// The transport dropped an established link unexpectedly
    ConnectionLost {
        client_id: ClientId,
        reason: String,
    },
    /// The reconnect interval elapsed
    RetryElapsed,
    /// Offline mode was requested; shut the link down intentionally
    GoOffline,
    /// Administrative override: clear the retry counter and rest at
    /// Disconnected regardless of the current state
    Reset,
}

impl LinkEvent {
    fn name(&self) -> &'static str {
        match self {
            LinkEvent::GoOnline => "GoOnline",
            LinkEvent::ClientConnected { .. } => "ClientConnected",
            LinkEvent::AlreadyHosting => "AlreadyHosting",
            LinkEvent::StartFailed { .. } => "StartFailed",
            LinkEvent::ConnectionLost { .. } => "ConnectionLost",
            LinkEvent::RetryElapsed => "RetryElapsed",
            LinkEvent::GoOffline => "GoOffline",
            LinkEvent::Reset => "Reset",
        }
    }
}

// ----------------------------------------------------------------------------
// Link Effects & Policy
// ----------------------------------------------------------------------------

/// Side effects the runtime must execute after a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkEffect {
    /// Ask the transport to start (as client, falling back to host)
    StartTransport,
    /// Wait out the interval, then feed `RetryElapsed`
    ScheduleRetry { delay: Duration },
    /// Tear the transport down
    ShutdownTransport,
    /// Surface a connectivity failure to listeners
    AnnounceFailure { reason: String },
}

/// Reconnection policy resolved from the current network preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPolicy {
    /// False under ForceOffline: an unexpected loss never schedules a retry
    pub allow_reconnect: bool,
    /// Cap on scheduled reconnect attempts
    pub max_attempts: u32,
    /// Fixed wait before each reconnect attempt
    pub retry_interval: Duration,
}

// ----------------------------------------------------------------------------
// Transition Results
// ----------------------------------------------------------------------------

/// Result of a link state transition
#[derive(Debug, Clone)]
pub struct LinkTransition {
    pub new_state: LinkState,
    pub effects: Vec<LinkEffect>,
    pub audit_entry: LinkAuditEntry,
}

/// Audit trail entry for link transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkAuditEntry {
    pub timestamp: Timestamp,
    pub from_state: String,
    pub to_state: String,
    pub event: String,
    pub effects_count: usize,
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl LinkState {
    /// Initial state
    pub fn new_disconnected(now: Timestamp) -> Self {
        LinkState::Disconnected(DisconnectedLink {
            since: now,
            last_online: None,
        })
    }

    /// Current state name for logging and audit
    pub fn state_name(&self) -> &'static str {
        match self {
            LinkState::Disconnected(_) => "Disconnected",
            LinkState::Connecting(_) => "Connecting",
            LinkState::Connected(_) => "Connected",
            LinkState::Reconnecting(_) => "Reconnecting",
            LinkState::Failed(_) => "Failed",
        }
    }

    /// Whether the link is live
    pub fn is_online(&self) -> bool {
        matches!(self, LinkState::Connected(_))
    }

    /// Whether the link is at rest with no activity in flight
    pub fn is_offline(&self) -> bool {
        matches!(self, LinkState::Disconnected(_) | LinkState::Failed(_))
    }

    /// Reconnect attempt carried by the current state, 0 when idle
    pub fn reconnect_attempt(&self) -> u32 {
        match self {
            LinkState::Connecting(s) => s.attempt,
            LinkState::Reconnecting(s) => s.attempt,
            _ => 0,
        }
    }

    fn last_online(&self) -> Option<Timestamp> {
        match self {
            LinkState::Disconnected(s) => s.last_online,
            LinkState::Connected(s) => Some(s.since),
            _ => None,
        }
    }

    /// Process an event under the given policy.
    ///
    /// Invalid (state, event) pairs return an error and imply no state
    /// change; the caller keeps the state it has.
    pub fn transition(
        &self,
        event: &LinkEvent,
        policy: &LinkPolicy,
        now: Timestamp,
    ) -> Result<LinkTransition, ConnectivityError> {
        let from_state = self.state_name();

        let (new_state, effects) = match (self, event) {
            // From Disconnected
            (LinkState::Disconnected(_), LinkEvent::GoOnline) => (
                LinkState::Connecting(ConnectingLink {
                    started: now,
                    attempt: 0,
                }),
                vec![LinkEffect::StartTransport],
            ),

            (LinkState::Disconnected(state), LinkEvent::GoOffline) => {
                // Already offline; idempotent
                (LinkState::Disconnected(state.clone()), Vec::new())
            }

            // From Connecting
            (LinkState::Connecting(_), LinkEvent::GoOnline)
            | (LinkState::Reconnecting(_), LinkEvent::GoOnline) => {
                // A connection attempt is already in flight; idempotent
                (self.clone(), Vec::new())
            }

            (LinkState::Connecting(_), LinkEvent::ClientConnected { client_id }) => (
                LinkState::Connected(ConnectedLink {
                    since: now,
                    role: LinkRole::Client,
                    client_id: Some(*client_id),
                }),
                Vec::new(),
            ),

            (LinkState::Connecting(_), LinkEvent::AlreadyHosting) => (
                LinkState::Connected(ConnectedLink {
                    since: now,
                    role: LinkRole::Host,
                    client_id: None,
                }),
                Vec::new(),
            ),

            (LinkState::Connecting(state), LinkEvent::StartFailed { reason }) => {
                if state.attempt > 0
                    && policy.allow_reconnect
                    && state.attempt < policy.max_attempts
                {
                    // A reconnect attempt failed below the cap: schedule
                    // the next one
                    let attempt = state.attempt + 1;
                    (
                        LinkState::Reconnecting(ReconnectingLink {
                            since: now,
                            attempt,
                            retry_at: now + policy.retry_interval.as_millis() as u64,
                        }),
                        vec![LinkEffect::ScheduleRetry {
                            delay: policy.retry_interval,
                        }],
                    )
                } else {
                    let reason = if state.attempt > 0 {
                        format!(
                            "reconnection abandoned after {} attempt(s): {}",
                            state.attempt, reason
                        )
                    } else {
                        format!("transport start failed: {}", reason)
                    };
                    (
                        LinkState::Failed(FailedLink {
                            failed_at: now,
                            reason: reason.clone(),
                        }),
                        vec![LinkEffect::AnnounceFailure { reason }],
                    )
                }
            }

            // From Connected
            (LinkState::Connected(_), LinkEvent::GoOnline) => {
                // Already online; idempotent
                (self.clone(), Vec::new())
            }

            (LinkState::Connected(state), LinkEvent::ConnectionLost { .. }) => {
                if policy.allow_reconnect && policy.max_attempts > 0 {
                    (
                        LinkState::Reconnecting(ReconnectingLink {
                            since: now,
                            attempt: 1,
                            retry_at: now + policy.retry_interval.as_millis() as u64,
                        }),
                        vec![LinkEffect::ScheduleRetry {
                            delay: policy.retry_interval,
                        }],
                    )
                } else {
                    // Reconnection suppressed by policy; rest at Disconnected
                    (
                        LinkState::Disconnected(DisconnectedLink {
                            since: now,
                            last_online: Some(state.since),
                        }),
                        Vec::new(),
                    )
                }
            }

            // From Reconnecting
            (LinkState::Reconnecting(state), LinkEvent::RetryElapsed) => (
                LinkState::Connecting(ConnectingLink {
                    started: now,
                    attempt: state.attempt,
                }),
                vec![LinkEffect::StartTransport],
            ),

            (LinkState::Reconnecting(_), LinkEvent::ClientConnected { client_id }) => {
                // The transport recovered on its own before our retry fired
                (
                    LinkState::Connected(ConnectedLink {
                        since: now,
                        role: LinkRole::Client,
                        client_id: Some(*client_id),
                    }),
                    Vec::new(),
                )
            }

            // Universal: intentional shutdown
            (_, LinkEvent::GoOffline) => (
                LinkState::Disconnected(DisconnectedLink {
                    since: now,
                    last_online: self.last_online(),
                }),
                vec![LinkEffect::ShutdownTransport],
            ),

            // Universal: administrative reset clears the counter and the
            // Failed dead end
            (_, LinkEvent::Reset) => {
                let effects = match self {
                    LinkState::Connected(_)
                    | LinkState::Connecting(_)
                    | LinkState::Reconnecting(_) => vec![LinkEffect::ShutdownTransport],
                    _ => Vec::new(),
                };
                (
                    LinkState::Disconnected(DisconnectedLink {
                        since: now,
                        last_online: self.last_online(),
                    }),
                    effects,
                )
            }

            // Invalid transitions
            (_, event) => {
                return Err(ConnectivityError::InvalidTransition {
                    from_state: from_state.to_string(),
                    event: event.name().to_string(),
                    reason: format!("event {} not valid in state {}", event.name(), from_state),
                });
            }
        };

        let audit_entry = LinkAuditEntry {
            timestamp: now,
            from_state: from_state.to_string(),
            to_state: new_state.state_name().to_string(),
            event: event.name().to_string(),
            effects_count: effects.len(),
        };

        Ok(LinkTransition {
            new_state,
            effects,
            audit_entry,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
