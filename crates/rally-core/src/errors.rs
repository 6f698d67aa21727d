//! Error types for the Rally mode engine.
//!
//! Nothing here is fatal to the process: protocol misuse and connectivity
//! failures all degrade to a well-defined resting state, and the errors
//! exist so callers *can* observe a rejection, not because they must
//! handle one.

use crate::types::Mode;

// ----------------------------------------------------------------------------
// Participant Errors
// ----------------------------------------------------------------------------

/// Failure raised by an individual participant's mode-change callback.
///
/// Caught at the notifying batch, logged, and never allowed to abort the
/// transition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("participant '{participant}' failed to apply mode change: {reason}")]
pub struct ParticipantError {
    pub participant: String,
    pub reason: String,
}

impl ParticipantError {
    pub fn new(participant: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Coordinator Errors
// ----------------------------------------------------------------------------

/// Protocol misuse of the mode coordinator's switch and transaction APIs.
///
/// Each variant is logged as a warning at the rejection site and carries no
/// state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("already switching to {current_target}; switch to {requested} rejected")]
    AlreadySwitching {
        current_target: Mode,
        requested: Mode,
    },
    #[error("a transition transaction targeting {pending} is already active")]
    TransactionActive { pending: Mode },
    #[error("no transition transaction is active")]
    NoTransaction,
}

// ----------------------------------------------------------------------------
// Connectivity Errors
// ----------------------------------------------------------------------------

/// Failures of the connectivity state machine and its transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectivityError {
    #[error("invalid link transition from {from_state} on {event}: {reason}")]
    InvalidTransition {
        from_state: String,
        event: String,
        reason: String,
    },
    #[error("transport unavailable: {reason}")]
    TransportUnavailable { reason: String },
    #[error("reconnection abandoned after {attempts} attempt(s)")]
    RetriesExhausted { attempts: u32 },
    #[error("pause refused: a network session is live")]
    PauseRefusedOnline,
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Unified error type for the Rally engine
#[derive(Debug, Clone, thiserror::Error)]
pub enum RallyError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    Participant(#[from] ParticipantError),

    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("event channel closed: {context}")]
    ChannelClosed { context: String },
}

pub type RallyResult<T> = Result<T, RallyError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoordinatorError::AlreadySwitching {
            current_target: Mode::Network,
            requested: Mode::Local,
        };
        assert!(err.to_string().contains("Network"));
        assert!(err.to_string().contains("Local"));

        let err = ConnectivityError::RetriesExhausted { attempts: 3 };
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_unified_conversion() {
        let err: RallyError = CoordinatorError::NoTransaction.into();
        assert!(matches!(err, RallyError::Coordinator(_)));

        let err: RallyError = ConnectivityError::PauseRefusedOnline.into();
        assert!(matches!(err, RallyError::Connectivity(_)));
    }
}
