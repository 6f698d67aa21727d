//! The capability contract implemented by every mode-aware subsystem.

use std::sync::Arc;

use crate::errors::ParticipantError;
use crate::types::{Mode, PriorityTier};

// ----------------------------------------------------------------------------
// Capability Contract
// ----------------------------------------------------------------------------

/// Contract implemented by any subsystem that reacts to mode changes.
///
/// Implementations are owned by their originating subsystem; the registry
/// holds only a weak reference. `on_mode_changed` is invoked once per
/// transition and must not block: a slow participant stalls only its own
/// batch slot. A returned error is logged by the notifying batch and does
/// not abort the transition.
pub trait ModeParticipant: Send + Sync {
    /// Applied once per transition, in (tier, registration-order) order.
    fn on_mode_changed(&self, new_mode: Mode, previous: Mode) -> Result<(), ParticipantError>;

    /// Pure predicate used for aggregate queries; never invoked during the
    /// notification pass itself.
    fn is_active_in(&self, mode: Mode) -> bool;

    /// Short human-readable name used in logs and audit output.
    fn label(&self) -> &str {
        "participant"
    }
}

// ----------------------------------------------------------------------------
// Participant Provider
// ----------------------------------------------------------------------------

/// Source of participants for on-demand discovery.
///
/// Each subsystem's startup code exposes its mode-aware objects through a
/// provider; the registry pulls from providers instead of scanning the
/// runtime for implementers.
pub trait ParticipantProvider {
    /// Participants this provider contributes, with their notification tier
    fn participants(&self) -> Vec<(Arc<dyn ModeParticipant>, PriorityTier)>;
}
