//! Centralized configuration for the Rally engine.
//!
//! Consolidates the tunables of the mode coordinator, the connectivity
//! state machine, and the channel layer behind one validated struct.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Transition Configuration
// ----------------------------------------------------------------------------

/// Tunables of the mode transition protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Participants notified per batch before a cooperative yield
    pub batch_size: usize,
    /// Delay granted to the visual transition effect before the mode commit
    pub effect_lead_in: Duration,
    /// Poll interval while waiting for the transition effect to finish
    pub effect_poll_interval: Duration,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            effect_lead_in: Duration::from_millis(400),
            effect_poll_interval: Duration::from_millis(50),
        }
    }
}

impl TransitionConfig {
    /// Configuration for fast, deterministic tests
    pub fn testing() -> Self {
        Self {
            batch_size: 5,
            effect_lead_in: Duration::from_millis(1),
            effect_poll_interval: Duration::from_millis(1),
        }
    }
}

// ----------------------------------------------------------------------------
// Connectivity Configuration
// ----------------------------------------------------------------------------

/// Tunables of the connectivity state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Maximum automatic reconnect attempts before resting at Failed
    pub max_reconnect_attempts: u32,
    /// Fixed wait between a connection loss and the next attempt
    pub reconnect_interval: Duration,
    /// How the Auto preference resolves: true → ForceOnline, false → ForceOffline
    pub prefer_online: bool,
    /// Interval of the Hybrid-policy divergence check
    pub divergence_check_interval: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_interval: Duration::from_secs(5),
            prefer_online: true,
            divergence_check_interval: Duration::from_secs(30),
        }
    }
}

impl ConnectivityConfig {
    /// Configuration for fast, deterministic tests
    pub fn testing() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_interval: Duration::from_millis(1),
            prefer_online: true,
            divergence_check_interval: Duration::from_millis(10),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the engine's channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for transport events (Transport → Connectivity)
    pub transport_event_buffer_size: usize,
    /// Capacity of the broadcast channel carrying engine events to listeners
    pub engine_event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            transport_event_buffer_size: 64,
            engine_event_capacity: 128,
        }
    }
}

impl ChannelConfig {
    /// Configuration for tests
    pub fn testing() -> Self {
        Self {
            transport_event_buffer_size: 100,
            engine_event_capacity: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration for the Rally engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RallyConfig {
    /// Mode transition protocol configuration
    pub transition: TransitionConfig,
    /// Connectivity state machine configuration
    pub connectivity: ConnectivityConfig,
    /// Channel buffer configuration
    pub channels: ChannelConfig,
}

impl RallyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            transition: TransitionConfig::testing(),
            connectivity: ConnectivityConfig::testing(),
            channels: ChannelConfig::testing(),
        }
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), String> {
        if self.transition.batch_size == 0 {
            return Err("Transition batch size cannot be zero".into());
        }
        if self.transition.effect_poll_interval.is_zero() {
            return Err("Effect poll interval cannot be zero".into());
        }
        if self.connectivity.max_reconnect_attempts == 0 {
            return Err("Max reconnect attempts cannot be zero".into());
        }
        if self.channels.transport_event_buffer_size == 0 {
            return Err("Transport event buffer size cannot be zero".into());
        }
        if self.channels.engine_event_capacity == 0 {
            return Err("Engine event capacity cannot be zero".into());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        assert!(RallyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_testing_config_validation() {
        let config = RallyConfig::testing();
        assert!(config.validate().is_ok());
        assert!(config.connectivity.reconnect_interval < Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = RallyConfig::default();
        config.transition.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = RallyConfig::default();
        config.connectivity.max_reconnect_attempts = 0;
        assert!(config.validate().is_err());
    }
}
