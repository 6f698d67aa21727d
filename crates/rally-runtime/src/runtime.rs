//! Rally runtime facade.
//!
//! Constructs the mode coordinator and the connectivity manager side by
//! side (they share no state), wires the channels, and exposes the
//! engine's public surface: mode switching, transactions, participant
//! registration, the connectivity policy entry points, the pause gate,
//! and event subscription. Built once at application start and passed by
//! reference to collaborators; there is no global instance.

use std::sync::Arc;

use tracing::{info, warn};

use rally_core::{
    create_engine_event_channel, create_transport_event_channel, ClientId, CoordinatorError,
    EngineEventReceiver, EngineEventSender, LinkState, LinkTransport, Mode, ModeParticipant,
    NetworkPreference, ParticipantProvider, PauseSink, PriorityTier, RallyConfig, RallyError,
    RallyResult, TransitionEffect, TransportEvent, TransportEventReceiver, TransportEventSender,
};

use crate::connectivity::{ConnectivityManager, ConnectivityStats, PolicyDivergence};
use crate::coordinator::{CoordinatorStats, ModeCoordinator};

// ----------------------------------------------------------------------------
// Rally Runtime
// ----------------------------------------------------------------------------

/// The engine facade: one mode coordinator and one connectivity manager
pub struct RallyRuntime {
    coordinator: ModeCoordinator,
    connectivity: ConnectivityManager,
    events: EngineEventSender,
    transport_event_sender: Option<TransportEventSender>,
    transport_events: Option<TransportEventReceiver>,
    config: RallyConfig,
}

impl RallyRuntime {
    /// Create a runtime over the given transport
    pub fn new(config: RallyConfig, transport: Box<dyn LinkTransport>) -> RallyResult<Self> {
        config
            .validate()
            .map_err(|reason| RallyError::Configuration { reason })?;

        let (events, _) = create_engine_event_channel(&config.channels);
        let (transport_event_sender, transport_events) =
            create_transport_event_channel(&config.channels);

        let coordinator = ModeCoordinator::new(config.transition.clone(), events.clone());
        let connectivity =
            ConnectivityManager::new(config.connectivity.clone(), transport, events.clone());

        Ok(Self {
            coordinator,
            connectivity,
            events,
            transport_event_sender: Some(transport_event_sender),
            transport_events: Some(transport_events),
            config,
        })
    }

    /// Attach the visual transition effect collaborator
    pub fn with_transition_effect(mut self, effect: Box<dyn TransitionEffect>) -> Self {
        self.coordinator = self.coordinator.with_transition_effect(effect);
        self
    }

    /// Attach the host's global pause toggle
    pub fn with_pause_sink(mut self, sink: Box<dyn PauseSink>) -> Self {
        self.connectivity = self.connectivity.with_pause_sink(sink);
        self
    }

    // ------------------------------------------------------------------------
    // Events & Channels
    // ------------------------------------------------------------------------

    /// Subscribe to engine events; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> EngineEventReceiver {
        self.events.subscribe()
    }

    /// Sender the transport uses to deliver its callbacks
    pub fn transport_event_sender(&self) -> Option<&TransportEventSender> {
        self.transport_event_sender.as_ref()
    }

    /// Hand the callback sender to the transport.
    ///
    /// Once taken, the [`RallyRuntime::run`] pump stops when every clone of
    /// the sender has been dropped.
    pub fn take_transport_event_sender(&mut self) -> Option<TransportEventSender> {
        self.transport_event_sender.take()
    }

    // ------------------------------------------------------------------------
    // Mode Switching
    // ------------------------------------------------------------------------

    pub async fn switch_to_mode(
        &mut self,
        mode: Mode,
        force: bool,
    ) -> Result<(), CoordinatorError> {
        self.coordinator.switch_to_mode(mode, force).await
    }

    pub fn current_mode(&self) -> Mode {
        self.coordinator.current_mode()
    }

    pub fn is_switching(&self) -> bool {
        self.coordinator.is_switching()
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    pub fn begin_transaction(&mut self, target: Mode) -> Result<(), CoordinatorError> {
        self.coordinator.begin_transaction(target)
    }

    pub async fn commit_transaction(&mut self) -> Result<(), CoordinatorError> {
        self.coordinator.commit_transaction().await
    }

    pub fn rollback_transaction(&mut self) -> Result<(), CoordinatorError> {
        self.coordinator.rollback_transaction()
    }

    pub fn is_transaction_active(&self) -> bool {
        self.coordinator.is_transaction_active()
    }

    pub fn pending_target(&self) -> Option<Mode> {
        self.coordinator.pending_target()
    }

    // ------------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------------

    pub fn register(
        &mut self,
        participant: &Arc<dyn ModeParticipant>,
        tier: PriorityTier,
    ) -> bool {
        self.coordinator.register(participant, tier)
    }

    pub fn unregister(&mut self, participant: &Arc<dyn ModeParticipant>) -> bool {
        self.coordinator.unregister(participant)
    }

    pub fn discover(&mut self, provider: &dyn ParticipantProvider) -> usize {
        self.coordinator.discover(provider)
    }

    pub fn count(&self) -> usize {
        self.coordinator.count()
    }

    pub fn count_active_in(&self, mode: Mode) -> usize {
        self.coordinator.count_active_in(mode)
    }

    // ------------------------------------------------------------------------
    // Connectivity Policy
    // ------------------------------------------------------------------------

    /// Go fully offline: suppress reconnection, shut the link down, and
    /// switch to local play
    pub async fn force_offline_mode(&mut self) -> RallyResult<()> {
        info!("forcing offline mode");
        self.connectivity
            .set_network_preference(NetworkPreference::ForceOffline);
        self.connectivity.enable_offline_mode()?;
        self.coordinator.switch_to_mode(Mode::Local, false).await?;
        Ok(())
    }

    /// Go fully online: begin connecting and switch to network play
    pub async fn force_online_mode(&mut self) -> RallyResult<()> {
        info!("forcing online mode");
        self.connectivity
            .set_network_preference(NetworkPreference::ForceOnline);
        self.connectivity.enable_network_mode()?;
        self.coordinator.switch_to_mode(Mode::Network, false).await?;
        Ok(())
    }

    /// Record the hybrid preference; forces neither state. Divergence
    /// between desired and actual connectivity is only reported, by the
    /// periodic check in [`RallyRuntime::run`].
    pub fn enable_hybrid_mode(&mut self) {
        self.connectivity
            .set_network_preference(NetworkPreference::Hybrid);
    }

    pub fn set_network_preference(&mut self, preference: NetworkPreference) {
        self.connectivity.set_network_preference(preference);
    }

    pub fn reset_connection_state(&mut self) -> RallyResult<()> {
        self.connectivity.reset_connection_state()?;
        Ok(())
    }

    pub fn connection_state(&self) -> &LinkState {
        self.connectivity.connection_state()
    }

    // ------------------------------------------------------------------------
    // Pause Gate
    // ------------------------------------------------------------------------

    pub fn can_pause(&self) -> bool {
        self.connectivity.can_pause()
    }

    pub fn is_paused(&self) -> bool {
        self.connectivity.is_paused()
    }

    pub fn pause(&mut self) -> RallyResult<()> {
        self.connectivity.pause()?;
        Ok(())
    }

    pub fn resume(&mut self) {
        self.connectivity.resume()
    }

    pub fn toggle_pause(&mut self) -> RallyResult<()> {
        self.connectivity.toggle_pause()?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------------

    pub fn coordinator_stats(&self) -> &CoordinatorStats {
        self.coordinator.stats()
    }

    pub fn connectivity_stats(&self) -> &ConnectivityStats {
        self.connectivity.stats()
    }

    pub fn config(&self) -> &RallyConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Transport Event Pump
    // ------------------------------------------------------------------------

    /// Dispatch one transport callback into the connectivity machine.
    ///
    /// Invalid events (stale callbacks for a state that moved on) are
    /// logged by the machine and dropped here.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let result = match event {
            TransportEvent::ClientConnected { client_id } => {
                self.handle_client_connected(client_id)
            }
            TransportEvent::ClientDisconnected { client_id } => {
                self.handle_client_disconnected(client_id)
            }
        };
        if let Err(err) = result {
            warn!(%err, "transport event dropped");
        }
    }

    pub fn handle_client_connected(&mut self, client_id: ClientId) -> RallyResult<()> {
        self.connectivity.handle_client_connected(client_id)?;
        Ok(())
    }

    pub fn handle_client_disconnected(&mut self, client_id: ClientId) -> RallyResult<()> {
        self.connectivity.handle_client_disconnected(client_id)?;
        Ok(())
    }

    /// Whether a reconnect attempt is waiting to fire
    pub fn has_pending_retry(&self) -> bool {
        self.connectivity.has_pending_retry()
    }

    /// Wait out and fire the scheduled reconnect attempt, if any
    pub async fn drive_retry(&mut self) -> RallyResult<()> {
        self.connectivity.drive_retry().await?;
        Ok(())
    }

    /// Run the Hybrid divergence check once
    pub fn check_policy_divergence(&mut self) -> Option<PolicyDivergence> {
        self.connectivity.check_policy_divergence()
    }

    /// Main pump: processes transport callbacks, fires scheduled reconnect
    /// attempts, and runs the periodic Hybrid divergence check. Returns
    /// when the transport event channel closes.
    pub async fn run(&mut self) -> RallyResult<()> {
        let mut receiver =
            self.transport_events
                .take()
                .ok_or_else(|| RallyError::ChannelClosed {
                    context: "transport event receiver already taken".to_string(),
                })?;
        let mut divergence_check =
            tokio::time::interval(self.config.connectivity.divergence_check_interval);

        info!("rally runtime pump started");
        loop {
            if self.connectivity.has_pending_retry() {
                // The reconnect wait has no cancellation point; events queue
                // up behind it
                if let Err(err) = self.connectivity.drive_retry().await {
                    warn!(%err, "reconnect attempt rejected");
                }
                continue;
            }

            tokio::select! {
                maybe_event = receiver.recv() => match maybe_event {
                    Some(event) => self.handle_transport_event(event),
                    None => {
                        info!("transport event channel closed, pump stopping");
                        break;
                    }
                },
                _ = divergence_check.tick() => {
                    self.connectivity.check_policy_divergence();
                }
            }
        }

        self.transport_events = Some(receiver);
        Ok(())
    }
}
