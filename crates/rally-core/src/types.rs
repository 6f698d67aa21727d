//! Core value types shared by the mode coordinator and the connectivity
//! state machine.

use std::fmt;
use std::ops::{Add, Sub};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Operating Mode
// ----------------------------------------------------------------------------

/// High-level operating mode of the application.
///
/// Exactly one mode is current at any time. `Menu` is a transient bootstrap
/// value the application starts in; it is never a long-lived steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Single-headset play against the machine or a local opponent
    Local,
    /// Networked play against a remote opponent
    Network,
    /// Bootstrap / menu-only state before the first real mode is selected
    Menu,
}

impl Mode {
    /// Whether this mode is a steady operating state (anything but `Menu`).
    ///
    /// Late-joining participants are only synchronized against a steady
    /// mode; while still in `Menu` there is nothing worth reporting.
    pub fn is_steady(&self) -> bool {
        !matches!(self, Mode::Menu)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Local => write!(f, "Local"),
            Mode::Network => write!(f, "Network"),
            Mode::Menu => write!(f, "Menu"),
        }
    }
}

// ----------------------------------------------------------------------------
// Network Preference
// ----------------------------------------------------------------------------

/// Desired connectivity policy, distinct from the actual connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkPreference {
    /// Resolve once to ForceOffline or ForceOnline from configuration
    Auto,
    /// Stay offline; suppress all reconnection
    ForceOffline,
    /// Drive toward Connected with bounded retry
    ForceOnline,
    /// Force neither state; only report divergence between desired and
    /// actual connectivity
    Hybrid,
}

impl fmt::Display for NetworkPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkPreference::Auto => write!(f, "Auto"),
            NetworkPreference::ForceOffline => write!(f, "ForceOffline"),
            NetworkPreference::ForceOnline => write!(f, "ForceOnline"),
            NetworkPreference::Hybrid => write!(f, "Hybrid"),
        }
    }
}

// ----------------------------------------------------------------------------
// Priority Tier
// ----------------------------------------------------------------------------

/// Notification ordering key, supplied explicitly at registration time.
///
/// Lower tiers are notified first during a mode transition. Within a tier,
/// registration order is preserved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PriorityTier(pub u32);

impl PriorityTier {
    /// Environment and state-management participants, notified first
    pub const ENVIRONMENT: PriorityTier = PriorityTier(0);
    /// Participants that only matter for local play
    pub const LOCAL_PLAY: PriorityTier = PriorityTier(1);
    /// Participants that only matter for networked play
    pub const NETWORK_PLAY: PriorityTier = PriorityTier(2);
    /// Participants with no declared ordering requirement
    pub const UNCLASSIFIED: PriorityTier = PriorityTier(10);
    /// Visual transition-effect participants, always notified last
    pub const TRANSITION_FX: PriorityTier = PriorityTier(100);
}

impl Default for PriorityTier {
    fn default() -> Self {
        PriorityTier::UNCLASSIFIED
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Client Identity
// ----------------------------------------------------------------------------

/// Transport-assigned identifier for a connected client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client {}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Timestamps
// ----------------------------------------------------------------------------

/// Millisecond wall-clock timestamp used in audit entries and state data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from milliseconds since the UNIX epoch
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock timestamp
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, millis: u64) -> Timestamp {
        Timestamp(self.0 + millis)
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of timestamps, injectable for deterministic tests.
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Standard library implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_steadiness() {
        assert!(Mode::Local.is_steady());
        assert!(Mode::Network.is_steady());
        assert!(!Mode::Menu.is_steady());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(PriorityTier::ENVIRONMENT < PriorityTier::LOCAL_PLAY);
        assert!(PriorityTier::NETWORK_PLAY < PriorityTier::UNCLASSIFIED);
        assert!(PriorityTier::UNCLASSIFIED < PriorityTier::TRANSITION_FX);
        assert_eq!(PriorityTier::default(), PriorityTier::UNCLASSIFIED);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::new(1_000);
        assert_eq!((t + 500).as_millis(), 1_500);
        assert_eq!((t + 500) - t, 500);
        // saturating on negative differences
        assert_eq!(t - (t + 500), 0);
    }

    #[test]
    fn test_mode_serde_round_trip() {
        let json = serde_json::to_string(&Mode::Network).unwrap();
        let back: Mode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Mode::Network);
    }
}
