//! Rally Core
//!
//! Domain layer of the Rally mode coordination and connectivity engine:
//! the operating-mode and policy value types, the capability contract and
//! participant registry, the pure connectivity link state machine, and the
//! collaborator interfaces the runtime wires together. Everything here is
//! synchronous and side-effect free apart from the channel constructors;
//! orchestration lives in `rally-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod link;
pub mod participant;
pub mod registry;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    create_engine_event_channel, create_transport_event_channel, EngineEvent, EngineEventReceiver,
    EngineEventSender, TransportEvent, TransportEventReceiver, TransportEventSender,
};
pub use collaborators::{LinkTransport, PauseSink, TransitionEffect};
pub use config::{ChannelConfig, ConnectivityConfig, RallyConfig, TransitionConfig};
pub use errors::{
    ConnectivityError, CoordinatorError, ParticipantError, RallyError, RallyResult,
};
pub use link::{
    LinkAuditEntry, LinkEffect, LinkEvent, LinkPolicy, LinkRole, LinkState, LinkTransition,
};
pub use participant::{ModeParticipant, ParticipantProvider};
pub use registry::{ParticipantHandle, ParticipantRegistry};
pub use types::{
    ClientId, Mode, NetworkPreference, PriorityTier, SystemTimeSource, TimeSource, Timestamp,
};
