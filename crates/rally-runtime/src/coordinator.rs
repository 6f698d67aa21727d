//! Mode coordinator: owns the current mode and runs the transition
//! protocol.
//!
//! A transition commits the new mode first (external reads are atomic),
//! then notifies the registered participants in (tier, registration-order)
//! order, in fixed-size batches with one cooperative yield between batches
//! so the host's frame loop is never blocked by a long participant list.
//! Per-participant failures are isolated; participants dropped by their
//! owners are pruned as the pass touches them. A two-phase transaction API
//! (begin / commit / rollback) stages a single transition.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rally_core::registry::ParticipantHandle;
use rally_core::{
    CoordinatorError, EngineEvent, EngineEventSender, Mode, ModeParticipant, ParticipantProvider,
    ParticipantRegistry, PriorityTier, Timestamp, TransitionConfig, TransitionEffect,
};

// ----------------------------------------------------------------------------
// Coordinator State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinatorPhase {
    Idle,
    Transitioning,
}

/// A staged transition awaiting commit or rollback
#[derive(Debug, Clone, Copy)]
struct PendingTransition {
    target: Mode,
    opened_at: Timestamp,
}

/// Counters for transition activity
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    /// Transitions run to completion
    pub transitions_completed: u64,
    /// Switch calls rejected while another transition was running
    pub transitions_rejected: u64,
    /// Individual participant notifications delivered
    pub participants_notified: u64,
    /// Participant callbacks that returned an error
    pub notification_failures: u64,
    /// Dead registry entries pruned by notification passes
    pub participants_pruned: u64,
}

// ----------------------------------------------------------------------------
// Notification Run
// ----------------------------------------------------------------------------

/// Pull-based batch walk over one transition's participant snapshot.
///
/// Each `advance` call notifies at most one batch; the async driver owns
/// the cooperative yield between calls. Entries whose participant has been
/// dropped are reported back so the registry can prune them once the batch
/// completes.
struct NotificationRun {
    handles: Vec<ParticipantHandle>,
    cursor: usize,
    batch_size: usize,
}

/// What one batch did
struct BatchReport {
    notified: u64,
    failures: u64,
    dead: Vec<u64>,
}

impl NotificationRun {
    fn new(handles: Vec<ParticipantHandle>, batch_size: usize) -> Self {
        Self {
            handles,
            cursor: 0,
            batch_size,
        }
    }

    fn is_finished(&self) -> bool {
        self.cursor >= self.handles.len()
    }

    fn advance(&mut self, new_mode: Mode, previous: Mode) -> BatchReport {
        let mut report = BatchReport {
            notified: 0,
            failures: 0,
            dead: Vec::new(),
        };

        let end = (self.cursor + self.batch_size).min(self.handles.len());
        for handle in &self.handles[self.cursor..end] {
            match handle.participant.upgrade() {
                Some(participant) => {
                    if let Err(err) = participant.on_mode_changed(new_mode, previous) {
                        warn!(%err, "participant failed to apply mode change");
                        report.failures += 1;
                    } else {
                        report.notified += 1;
                    }
                }
                None => report.dead.push(handle.seq),
            }
        }
        self.cursor = end;
        report
    }
}

// ----------------------------------------------------------------------------
// Mode Coordinator
// ----------------------------------------------------------------------------

/// Owns the current mode, the participant registry, and the transition
/// protocol
pub struct ModeCoordinator {
    current: Mode,
    phase: CoordinatorPhase,
    registry: ParticipantRegistry,
    transaction: Option<PendingTransition>,
    effect: Option<Box<dyn TransitionEffect>>,
    events: EngineEventSender,
    config: TransitionConfig,
    stats: CoordinatorStats,
}

impl ModeCoordinator {
    /// Create a coordinator in the transient bootstrap mode
    pub fn new(config: TransitionConfig, events: EngineEventSender) -> Self {
        Self {
            current: Mode::Menu,
            phase: CoordinatorPhase::Idle,
            registry: ParticipantRegistry::new(),
            transaction: None,
            effect: None,
            events,
            config,
            stats: CoordinatorStats::default(),
        }
    }

    /// Attach the visual transition effect collaborator
    pub fn with_transition_effect(mut self, effect: Box<dyn TransitionEffect>) -> Self {
        self.effect = Some(effect);
        self
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a participant under the given tier.
    ///
    /// If a steady mode is already current, the late joiner is synchronized
    /// immediately with one `on_mode_changed(current, current)`.
    pub fn register(
        &mut self,
        participant: &Arc<dyn ModeParticipant>,
        tier: PriorityTier,
    ) -> bool {
        let added = self.registry.register(participant, tier);
        if added && self.current.is_steady() {
            match participant.on_mode_changed(self.current, self.current) {
                Ok(()) => self.stats.participants_notified += 1,
                Err(err) => {
                    warn!(%err, "late-joiner synchronization failed");
                    self.stats.notification_failures += 1;
                }
            }
        }
        added
    }

    /// Remove a participant; idempotent
    pub fn unregister(&mut self, participant: &Arc<dyn ModeParticipant>) -> bool {
        self.registry.unregister(participant)
    }

    /// Pull participants from a provider, registering (and synchronizing)
    /// any not already present. Returns the number of new registrations.
    pub fn discover(&mut self, provider: &dyn ParticipantProvider) -> usize {
        provider
            .participants()
            .iter()
            .filter(|(participant, tier)| self.register(participant, *tier))
            .count()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The externally observed current mode. Never shows an intermediate
    /// value: it flips from previous to target at the commit point of a
    /// transition.
    pub fn current_mode(&self) -> Mode {
        self.current
    }

    pub fn is_switching(&self) -> bool {
        self.phase == CoordinatorPhase::Transitioning
    }

    pub fn is_transaction_active(&self) -> bool {
        self.transaction.is_some()
    }

    /// Target of the staged transaction, if one is active
    pub fn pending_target(&self) -> Option<Mode> {
        self.transaction.map(|pending| pending.target)
    }

    pub fn count(&self) -> usize {
        self.registry.count()
    }

    pub fn count_active_in(&self, mode: Mode) -> usize {
        self.registry.count_active_in(mode)
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    // ------------------------------------------------------------------------
    // Transition Protocol
    // ------------------------------------------------------------------------

    /// Switch the application to `target`.
    ///
    /// Rejected (warning, no state change, no notifications) while another
    /// transition is running, unless `force` is set. Switching to the
    /// current mode without `force` is a silent no-op.
    pub async fn switch_to_mode(
        &mut self,
        target: Mode,
        force: bool,
    ) -> Result<(), CoordinatorError> {
        if target == self.current && !force {
            debug!(%target, "already in target mode");
            return Ok(());
        }

        if self.phase == CoordinatorPhase::Transitioning && !force {
            warn!(
                current = %self.current,
                requested = %target,
                "mode switch rejected: a transition is already running"
            );
            self.stats.transitions_rejected += 1;
            return Err(CoordinatorError::AlreadySwitching {
                current_target: self.current,
                requested: target,
            });
        }

        self.phase = CoordinatorPhase::Transitioning;
        let previous = self.current;
        info!(%previous, %target, force, "mode transition started");

        if let Some(effect) = &self.effect {
            effect.trigger(previous, target);
            tokio::time::sleep(self.config.effect_lead_in).await;
        }

        // Commit point: every external read from here on sees the target.
        self.current = target;

        let mut run = NotificationRun::new(self.registry.snapshot(), self.config.batch_size);
        while !run.is_finished() {
            let report = run.advance(target, previous);
            self.stats.participants_notified += report.notified;
            self.stats.notification_failures += report.failures;
            self.stats.participants_pruned += report.dead.len() as u64;
            self.registry.prune(&report.dead);
            if !run.is_finished() {
                tokio::task::yield_now().await;
            }
        }

        if let Some(effect) = &self.effect {
            while effect.is_transitioning() {
                tokio::time::sleep(self.config.effect_poll_interval).await;
            }
        }

        let _ = self.events.send(EngineEvent::ModeChanged {
            new_mode: target,
            previous,
        });
        self.stats.transitions_completed += 1;
        self.phase = CoordinatorPhase::Idle;
        info!(%target, "mode transition complete");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// Stage a transition without running it
    pub fn begin_transaction(&mut self, target: Mode) -> Result<(), CoordinatorError> {
        if let Some(pending) = &self.transaction {
            warn!(
                pending = %pending.target,
                requested = %target,
                "transaction rejected: one is already active"
            );
            return Err(CoordinatorError::TransactionActive {
                pending: pending.target,
            });
        }
        debug!(%target, "transition transaction staged");
        self.transaction = Some(PendingTransition {
            target,
            opened_at: Timestamp::now(),
        });
        Ok(())
    }

    /// Clear the staged transaction and run the switch to its target
    pub async fn commit_transaction(&mut self) -> Result<(), CoordinatorError> {
        let Some(pending) = self.transaction.take() else {
            warn!("commit rejected: no transaction is active");
            return Err(CoordinatorError::NoTransaction);
        };
        debug!(
            target = %pending.target,
            staged_for_ms = Timestamp::now() - pending.opened_at,
            "committing transition transaction"
        );
        self.switch_to_mode(pending.target, false).await
    }

    /// Clear the staged transaction without any mode change
    pub fn rollback_transaction(&mut self) -> Result<(), CoordinatorError> {
        match self.transaction.take() {
            Some(pending) => {
                debug!(target = %pending.target, "transition transaction rolled back");
                Ok(())
            }
            None => {
                warn!("rollback rejected: no transaction is active");
                Err(CoordinatorError::NoTransaction)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
