//! Connectivity manager: drives the pure link state machine.
//!
//! Feeds policy-resolved events into [`LinkState`], executes the resulting
//! effects against the transport collaborator, keeps the bounded audit
//! trail, and owns the pause gate. Reconnection is bounded by the
//! configured attempt cap; the wait before each attempt is a cooperative
//! sleep with no cancellation point — only the cap and the ForceOffline
//! policy stop the cycle.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use rally_core::{
    ClientId, ConnectivityConfig, ConnectivityError, EngineEvent, EngineEventSender,
    LinkAuditEntry, LinkEffect, LinkEvent, LinkPolicy, LinkRole, LinkState, LinkTransport,
    NetworkPreference, PauseSink, SystemTimeSource, TimeSource,
};

/// Retained audit entries (older entries are discarded)
const AUDIT_TRAIL_CAP: usize = 1000;

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Counters for connectivity activity
#[derive(Debug, Clone, Default)]
pub struct ConnectivityStats {
    /// Link state transitions applied
    pub transitions: u64,
    /// Reconnect attempts scheduled
    pub reconnects_scheduled: u64,
    /// Failures announced to listeners
    pub failures_announced: u64,
    /// Events rejected as invalid for the current state
    pub invalid_events: u64,
    /// Hybrid-policy divergences reported
    pub divergences_reported: u64,
}

/// A detected mismatch between desired and actual connectivity under the
/// Hybrid policy. Reported only; never acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDivergence {
    pub desired_online: bool,
    pub actually_online: bool,
}

// ----------------------------------------------------------------------------
// Connectivity Manager
// ----------------------------------------------------------------------------

/// Owns the link state, the transport, and the reconnect/pause policy
pub struct ConnectivityManager<T: TimeSource = SystemTimeSource> {
    state: LinkState,
    preference: NetworkPreference,
    transport: Box<dyn LinkTransport>,
    pause_sink: Option<Box<dyn PauseSink>>,
    paused: bool,
    config: ConnectivityConfig,
    time_source: T,
    audit_trail: Vec<LinkAuditEntry>,
    stats: ConnectivityStats,
    events: EngineEventSender,
    pending_retry: Option<Duration>,
}

impl ConnectivityManager<SystemTimeSource> {
    /// Create a manager starting Disconnected under the Auto preference
    pub fn new(
        config: ConnectivityConfig,
        transport: Box<dyn LinkTransport>,
        events: EngineEventSender,
    ) -> Self {
        Self::with_time_source(config, transport, events, SystemTimeSource)
    }
}

impl<T: TimeSource> ConnectivityManager<T> {
    /// Create a manager with an injected time source (for deterministic
    /// audit timestamps in tests)
    pub fn with_time_source(
        config: ConnectivityConfig,
        transport: Box<dyn LinkTransport>,
        events: EngineEventSender,
        time_source: T,
    ) -> Self {
        let state = LinkState::new_disconnected(time_source.now());
        Self {
            state,
            preference: NetworkPreference::Auto,
            transport,
            pause_sink: None,
            paused: false,
            config,
            time_source,
            audit_trail: Vec::new(),
            stats: ConnectivityStats::default(),
            events,
            pending_retry: None,
        }
    }

    /// Attach the host's global pause toggle
    pub fn with_pause_sink(mut self, sink: Box<dyn PauseSink>) -> Self {
        self.pause_sink = Some(sink);
        self
    }

    // ------------------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------------------

    /// Record the desired connectivity policy. Recording alone forces no
    /// transition; the policy-level entry points do the driving.
    pub fn set_network_preference(&mut self, preference: NetworkPreference) {
        info!(%preference, "network preference set");
        self.preference = preference;
    }

    pub fn network_preference(&self) -> NetworkPreference {
        self.preference
    }

    /// The preference with Auto resolved against the configured flag
    fn resolved_preference(&self) -> NetworkPreference {
        match self.preference {
            NetworkPreference::Auto => {
                if self.config.prefer_online {
                    NetworkPreference::ForceOnline
                } else {
                    NetworkPreference::ForceOffline
                }
            }
            other => other,
        }
    }

    fn link_policy(&self) -> LinkPolicy {
        LinkPolicy {
            allow_reconnect: self.resolved_preference() != NetworkPreference::ForceOffline,
            max_attempts: self.config.max_reconnect_attempts,
            retry_interval: self.config.reconnect_interval,
        }
    }

    // ------------------------------------------------------------------------
    // Entry Points
    // ------------------------------------------------------------------------

    /// Begin connecting (client first, host as fallback).
    ///
    /// A logged no-op when the resolved policy is ForceOffline.
    pub fn enable_network_mode(&mut self) -> Result<(), ConnectivityError> {
        if self.resolved_preference() == NetworkPreference::ForceOffline {
            warn!("network mode suppressed by offline policy");
            return Ok(());
        }
        self.apply(LinkEvent::GoOnline)
    }

    /// Shut the link down intentionally; no retry is scheduled
    pub fn enable_offline_mode(&mut self) -> Result<(), ConnectivityError> {
        self.apply(LinkEvent::GoOffline)
    }

    /// Transport callback: a client connection was established
    pub fn handle_client_connected(
        &mut self,
        client_id: ClientId,
    ) -> Result<(), ConnectivityError> {
        self.apply(LinkEvent::ClientConnected { client_id })
    }

    /// Transport callback: a client connection dropped.
    ///
    /// Only an unexpected loss of our own client link triggers the
    /// reconnect policy; a remote client leaving a session we host, or a
    /// stale callback while already offline, is ignored.
    pub fn handle_client_disconnected(
        &mut self,
        client_id: ClientId,
    ) -> Result<(), ConnectivityError> {
        let own_client_link = matches!(
            &self.state,
            LinkState::Connected(link) if link.role == LinkRole::Client
        );
        if !own_client_link {
            debug!(
                %client_id,
                state = self.state.state_name(),
                "disconnect callback ignored"
            );
            return Ok(());
        }
        self.apply(LinkEvent::ConnectionLost {
            client_id,
            reason: "transport reported disconnect".to_string(),
        })
    }

    /// Administrative override: zero the retry counter and rest at
    /// Disconnected regardless of the current state
    pub fn reset_connection_state(&mut self) -> Result<(), ConnectivityError> {
        info!("connection state reset");
        self.apply(LinkEvent::Reset)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn connection_state(&self) -> &LinkState {
        &self.state
    }

    pub fn is_online(&self) -> bool {
        self.state.is_online()
    }

    pub fn stats(&self) -> &ConnectivityStats {
        &self.stats
    }

    /// Most recent audit entries, oldest first
    pub fn recent_audit_entries(&self, limit: usize) -> &[LinkAuditEntry] {
        let start = self.audit_trail.len().saturating_sub(limit);
        &self.audit_trail[start..]
    }

    // ------------------------------------------------------------------------
    // Pause Gate
    // ------------------------------------------------------------------------

    /// Pausing is only defined while the link is actually offline
    pub fn can_pause(&self) -> bool {
        self.state.is_offline()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Engage the pause sink; refused while the link is not offline
    pub fn pause(&mut self) -> Result<(), ConnectivityError> {
        if !self.can_pause() {
            warn!(
                state = self.state.state_name(),
                "pause refused: link is not offline"
            );
            return Err(ConnectivityError::PauseRefusedOnline);
        }
        if !self.paused {
            self.paused = true;
            if let Some(sink) = &self.pause_sink {
                sink.set_paused(true);
            }
        }
        Ok(())
    }

    /// Release the pause sink; always allowed
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(sink) = &self.pause_sink {
                sink.set_paused(false);
            }
        }
    }

    pub fn toggle_pause(&mut self) -> Result<(), ConnectivityError> {
        if self.paused {
            self.resume();
            Ok(())
        } else {
            self.pause()
        }
    }

    // ------------------------------------------------------------------------
    // Hybrid Divergence Check
    // ------------------------------------------------------------------------

    /// Compare desired and actual connectivity under the Hybrid policy.
    ///
    /// Reports a divergence without acting on it; the hybrid policy never
    /// initiates a transition.
    pub fn check_policy_divergence(&mut self) -> Option<PolicyDivergence> {
        if self.preference != NetworkPreference::Hybrid {
            return None;
        }
        let desired_online = self.config.prefer_online;
        let actually_online = self.state.is_online();
        if desired_online == actually_online {
            return None;
        }
        warn!(
            desired_online,
            actually_online, "hybrid policy divergence detected"
        );
        self.stats.divergences_reported += 1;
        Some(PolicyDivergence {
            desired_online,
            actually_online,
        })
    }

    // ------------------------------------------------------------------------
    // Reconnect Scheduling
    // ------------------------------------------------------------------------

    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// Wait out the scheduled reconnect interval, then re-attempt.
    ///
    /// The wait has no cancellation point; a preference change to
    /// ForceOffline during the wait abandons the attempt after it.
    pub async fn drive_retry(&mut self) -> Result<(), ConnectivityError> {
        let Some(delay) = self.pending_retry.take() else {
            return Ok(());
        };
        tokio::time::sleep(delay).await;
        if self.resolved_preference() == NetworkPreference::ForceOffline {
            debug!("reconnect abandoned: offline policy now in force");
            return Ok(());
        }
        self.apply(LinkEvent::RetryElapsed)
    }

    // ------------------------------------------------------------------------
    // Event Application
    // ------------------------------------------------------------------------

    /// Feed one event (and any follow-ups its effects produce) through the
    /// state machine
    fn apply(&mut self, event: LinkEvent) -> Result<(), ConnectivityError> {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let transition =
                match self
                    .state
                    .transition(&event, &self.link_policy(), self.time_source.now())
                {
                    Ok(transition) => transition,
                    Err(err) => {
                        warn!(%err, "link event rejected");
                        self.stats.invalid_events += 1;
                        return Err(err);
                    }
                };

            debug!(
                from = %transition.audit_entry.from_state,
                to = %transition.audit_entry.to_state,
                event = %transition.audit_entry.event,
                "link transition"
            );

            self.audit_trail.push(transition.audit_entry);
            if self.audit_trail.len() > AUDIT_TRAIL_CAP {
                self.audit_trail.remove(0);
            }

            self.state = transition.new_state;
            self.stats.transitions += 1;
            // A scheduled retry only survives while the machine stays in
            // Reconnecting
            if !matches!(self.state, LinkState::Reconnecting(_)) {
                self.pending_retry = None;
            }

            let _ = self.events.send(EngineEvent::ConnectionStateChanged {
                state: self.state.clone(),
            });

            for effect in transition.effects {
                if let Some(follow_up) = self.execute(effect) {
                    queue.push_back(follow_up);
                }
            }
        }

        Ok(())
    }

    /// Execute one effect; may produce a follow-up event
    fn execute(&mut self, effect: LinkEffect) -> Option<LinkEvent> {
        match effect {
            LinkEffect::StartTransport => {
                if self.transport.is_host() || self.transport.is_server() {
                    debug!("transport already hosting");
                    return Some(LinkEvent::AlreadyHosting);
                }
                if self.transport.start_client() {
                    // Confirmation arrives through the transport callback
                    debug!("client start accepted; awaiting connection callback");
                    return None;
                }
                if self.transport.start_host() {
                    info!("client start rejected; hosting instead");
                    return Some(LinkEvent::AlreadyHosting);
                }
                Some(LinkEvent::StartFailed {
                    reason: "client and host start both rejected".to_string(),
                })
            }
            LinkEffect::ScheduleRetry { delay } => {
                info!(
                    attempt = self.state.reconnect_attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnect attempt scheduled"
                );
                self.pending_retry = Some(delay);
                self.stats.reconnects_scheduled += 1;
                None
            }
            LinkEffect::ShutdownTransport => {
                self.transport.shutdown();
                None
            }
            LinkEffect::AnnounceFailure { reason } => {
                warn!(%reason, "connectivity failure");
                self.stats.failures_announced += 1;
                let _ = self
                    .events
                    .send(EngineEvent::TransitionFailed { reason });
                None
            }
        }
    }
}
