//! Participant registry: the set of currently active mode-aware subsystems.
//!
//! The registry holds non-owning references. A participant dropped by its
//! owning subsystem without being unregistered is tolerated and pruned the
//! next time a notification batch touches it.

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::participant::{ModeParticipant, ParticipantProvider};
use crate::types::{Mode, PriorityTier};

// ----------------------------------------------------------------------------
// Registry Entries
// ----------------------------------------------------------------------------

/// One registered participant
struct RegistryEntry {
    participant: Weak<dyn ModeParticipant>,
    tier: PriorityTier,
    /// Registration sequence number; the within-tier ordering key
    seq: u64,
}

/// Weak handle handed to a notification pass.
///
/// The pass upgrades each handle at notification time so that participants
/// destroyed between snapshot and batch are detected and reported back for
/// pruning.
pub struct ParticipantHandle {
    pub participant: Weak<dyn ModeParticipant>,
    pub tier: PriorityTier,
    pub seq: u64,
}

// ----------------------------------------------------------------------------
// Participant Registry
// ----------------------------------------------------------------------------

/// Registry of currently active mode participants
#[derive(Default)]
pub struct ParticipantRegistry {
    entries: Vec<RegistryEntry>,
    next_seq: u64,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant under the given notification tier.
    ///
    /// Identity is by allocation: registering the same `Arc` (or any clone
    /// of it) twice is a no-op. Returns true if the participant was newly
    /// added.
    pub fn register(
        &mut self,
        participant: &Arc<dyn ModeParticipant>,
        tier: PriorityTier,
    ) -> bool {
        if self.contains(participant) {
            debug!(
                participant = participant.label(),
                "participant already registered"
            );
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(RegistryEntry {
            participant: Arc::downgrade(participant),
            tier,
            seq,
        });
        debug!(
            participant = participant.label(),
            %tier,
            "participant registered"
        );
        true
    }

    /// Remove a participant. Idempotent; returns true if it was present.
    pub fn unregister(&mut self, participant: &Arc<dyn ModeParticipant>) -> bool {
        let target = Arc::downgrade(participant);
        let before = self.entries.len();
        self.entries
            .retain(|entry| !Weak::ptr_eq(&entry.participant, &target));
        let removed = self.entries.len() != before;
        if removed {
            debug!(
                participant = participant.label(),
                "participant unregistered"
            );
        }
        removed
    }

    /// Whether the participant is currently registered (by allocation)
    pub fn contains(&self, participant: &Arc<dyn ModeParticipant>) -> bool {
        let target = Arc::downgrade(participant);
        self.entries
            .iter()
            .any(|entry| Weak::ptr_eq(&entry.participant, &target))
    }

    /// Register every participant a provider yields that is not already
    /// present. Returns the number of new registrations.
    pub fn discover(&mut self, provider: &dyn ParticipantProvider) -> usize {
        provider
            .participants()
            .iter()
            .filter(|(participant, tier)| self.register(participant, *tier))
            .count()
    }

    /// Number of distinct, still-live registered participants
    pub fn count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.participant.strong_count() > 0)
            .count()
    }

    /// Number of live participants whose `is_active_in` holds for `mode`
    pub fn count_active_in(&self, mode: Mode) -> usize {
        self.entries
            .iter()
            .filter_map(|entry| entry.participant.upgrade())
            .filter(|participant| participant.is_active_in(mode))
            .count()
    }

    /// Live participants registered under the given tier
    pub fn participants_in_tier(&self, tier: PriorityTier) -> Vec<Arc<dyn ModeParticipant>> {
        self.entries
            .iter()
            .filter(|entry| entry.tier == tier)
            .filter_map(|entry| entry.participant.upgrade())
            .collect()
    }

    /// Snapshot of all entries in notification order: stable by
    /// (tier, registration order). Dead entries are included so the
    /// notification pass can detect and report them for pruning.
    pub fn snapshot(&self) -> Vec<ParticipantHandle> {
        let mut handles: Vec<ParticipantHandle> = self
            .entries
            .iter()
            .map(|entry| ParticipantHandle {
                participant: entry.participant.clone(),
                tier: entry.tier,
                seq: entry.seq,
            })
            .collect();
        handles.sort_by_key(|handle| (handle.tier, handle.seq));
        handles
    }

    /// Remove the entries with the given sequence numbers.
    ///
    /// Called by a notification pass after each batch with the entries it
    /// found dead.
    pub fn prune(&mut self, dead_seqs: &[u64]) {
        if dead_seqs.is_empty() {
            return;
        }
        self.entries
            .retain(|entry| !dead_seqs.contains(&entry.seq));
        debug!(pruned = dead_seqs.len(), "dead participants pruned");
    }

    /// Sweep out every entry whose participant has been dropped
    pub fn prune_dead(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.participant.strong_count() > 0);
        before - self.entries.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
