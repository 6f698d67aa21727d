//! Collaborator interfaces consumed by the engine.
//!
//! These are the narrow seams to the subsystems this core deliberately
//! does not own: the visual transition effect, the network transport, and
//! the host's global pause toggle. All three are sync by design; none of
//! their implementations may block the caller for long.

use crate::types::Mode;

// ----------------------------------------------------------------------------
// Transition Effect
// ----------------------------------------------------------------------------

/// Visual transition effect played while switching modes.
///
/// Purely cosmetic: the coordinator triggers it, then only polls whether it
/// is still running. Its outcome never influences the transition.
pub trait TransitionEffect: Send + Sync {
    /// Start the effect for a transition from `previous` to `next`
    fn trigger(&self, previous: Mode, next: Mode);

    /// Whether the effect is still playing
    fn is_transitioning(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Network Transport
// ----------------------------------------------------------------------------

/// Network transport the connectivity machine drives.
///
/// Start calls report immediate acceptance only; an accepted client start
/// is confirmed (or not) later through transport events. Connection
/// attempts have no timeout of their own: "the callback never arrived" is
/// the only failure signal after a successful start call.
pub trait LinkTransport: Send + Sync {
    /// Attempt to start as a client. Returns false if the start was
    /// rejected outright.
    fn start_client(&mut self) -> bool;

    /// Attempt to start as a host. Returns false if the start was rejected
    /// outright.
    fn start_host(&mut self) -> bool;

    /// Tear down any live connection
    fn shutdown(&mut self);

    /// Whether a client connection is currently established
    fn is_connected_client(&self) -> bool;

    /// Whether this process is hosting
    fn is_host(&self) -> bool;

    /// Whether this process is running as a dedicated server
    fn is_server(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Pause Sink
// ----------------------------------------------------------------------------

/// The host's global pause toggle (a time-scale switch or similar).
///
/// The connectivity manager flips this only when the link is offline;
/// pausing a live network session has no defined semantics here.
pub trait PauseSink: Send + Sync {
    fn set_paused(&self, paused: bool);
}
