//! Typed channel protocol between the transport, the engine, and its
//! listeners.
//!
//! Transport callbacks arrive as [`TransportEvent`]s over an mpsc channel;
//! the engine publishes its own state changes as [`EngineEvent`]s over a
//! broadcast channel with explicit subscription, giving listeners a defined
//! delivery order and an explicit unsubscribe (dropping the receiver).

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::config::ChannelConfig;
use crate::link::LinkState;
use crate::types::{ClientId, Mode};

// ----------------------------------------------------------------------------
// TransportEvent: Transport → Connectivity
// ----------------------------------------------------------------------------

/// Callbacks raised by the network transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// A client connection was established
    ClientConnected { client_id: ClientId },
    /// A client connection dropped
    ClientDisconnected { client_id: ClientId },
}

// ----------------------------------------------------------------------------
// EngineEvent: Engine → Listeners
// ----------------------------------------------------------------------------

/// State-change notifications published by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The current mode changed (published after all participants were
    /// notified)
    ModeChanged { new_mode: Mode, previous: Mode },
    /// The connectivity link state changed
    ConnectionStateChanged { state: LinkState },
    /// A connectivity transition failed
    TransitionFailed { reason: String },
}

// ----------------------------------------------------------------------------
// Channel Construction
// ----------------------------------------------------------------------------

pub type TransportEventSender = mpsc::Sender<TransportEvent>;
pub type TransportEventReceiver = mpsc::Receiver<TransportEvent>;

pub type EngineEventSender = broadcast::Sender<EngineEvent>;
pub type EngineEventReceiver = broadcast::Receiver<EngineEvent>;

/// Create the transport event channel (Transport → Connectivity)
pub fn create_transport_event_channel(
    config: &ChannelConfig,
) -> (TransportEventSender, TransportEventReceiver) {
    mpsc::channel(config.transport_event_buffer_size)
}

/// Create the engine event channel (Engine → Listeners).
///
/// Listeners subscribe with [`EngineEventSender::subscribe`]; sending with
/// no live subscriber is not an error.
pub fn create_engine_event_channel(
    config: &ChannelConfig,
) -> (EngineEventSender, EngineEventReceiver) {
    broadcast::channel(config.engine_event_capacity)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
