//! Integration tests for the runtime facade: policy-level mode sugar,
//! transaction equivalence, tier-ordered batch notification, and the
//! transport event pump.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use rally_core::{
    ClientId, EngineEvent, LinkTransport, Mode, ModeParticipant, ParticipantError, PriorityTier,
    RallyConfig, TransportEvent,
};
use rally_runtime::RallyRuntime;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

/// Transport that accepts client starts and nothing else
struct AcceptingTransport;

impl LinkTransport for AcceptingTransport {
    fn start_client(&mut self) -> bool {
        true
    }

    fn start_host(&mut self) -> bool {
        false
    }

    fn shutdown(&mut self) {}

    fn is_connected_client(&self) -> bool {
        false
    }

    fn is_host(&self) -> bool {
        false
    }

    fn is_server(&self) -> bool {
        false
    }
}

/// Participant that appends its label to a shared order log
struct OrderedParticipant {
    name: String,
    order_log: Arc<Mutex<Vec<String>>>,
    active_in: Vec<Mode>,
}

impl ModeParticipant for OrderedParticipant {
    fn on_mode_changed(&self, _new_mode: Mode, _previous: Mode) -> Result<(), ParticipantError> {
        self.order_log.lock().unwrap().push(self.name.clone());
        Ok(())
    }

    fn is_active_in(&self, mode: Mode) -> bool {
        self.active_in.contains(&mode)
    }

    fn label(&self) -> &str {
        &self.name
    }
}

fn ordered_participant(
    name: &str,
    order_log: &Arc<Mutex<Vec<String>>>,
    active_in: Vec<Mode>,
) -> Arc<dyn ModeParticipant> {
    Arc::new(OrderedParticipant {
        name: name.to_string(),
        order_log: Arc::clone(order_log),
        active_in,
    })
}

fn create_test_runtime() -> RallyRuntime {
    RallyRuntime::new(RallyConfig::testing(), Box::new(AcceptingTransport)).unwrap()
}

// ----------------------------------------------------------------------------
// Policy-Level Mode Sugar
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_force_online_then_callback_connects() {
    let mut runtime = create_test_runtime();
    let mut events = runtime.subscribe();

    runtime.force_online_mode().await.unwrap();
    assert_eq!(runtime.current_mode(), Mode::Network);
    assert_eq!(runtime.connection_state().state_name(), "Connecting");

    runtime.handle_transport_event(TransportEvent::ClientConnected {
        client_id: ClientId(11),
    });
    assert!(runtime.connection_state().is_online());

    // Listeners saw both machines move
    let mut saw_mode_change = false;
    let mut saw_connected = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::ModeChanged { new_mode, previous } => {
                assert_eq!(new_mode, Mode::Network);
                assert_eq!(previous, Mode::Menu);
                saw_mode_change = true;
            }
            EngineEvent::ConnectionStateChanged { state } => {
                if state.is_online() {
                    saw_connected = true;
                }
            }
            EngineEvent::TransitionFailed { reason } => {
                panic!("unexpected failure: {}", reason)
            }
        }
    }
    assert!(saw_mode_change);
    assert!(saw_connected);
}

#[tokio::test]
async fn test_force_offline_rests_local_and_disconnected() {
    let mut runtime = create_test_runtime();

    runtime.force_online_mode().await.unwrap();
    runtime.handle_transport_event(TransportEvent::ClientConnected {
        client_id: ClientId(1),
    });

    runtime.force_offline_mode().await.unwrap();
    assert_eq!(runtime.current_mode(), Mode::Local);
    assert_eq!(runtime.connection_state().state_name(), "Disconnected");

    // A stale disconnect callback changes nothing
    runtime.handle_transport_event(TransportEvent::ClientDisconnected {
        client_id: ClientId(1),
    });
    assert_eq!(runtime.connection_state().state_name(), "Disconnected");
    assert!(!runtime.has_pending_retry());
}

#[tokio::test]
async fn test_hybrid_mode_forces_nothing() {
    let mut runtime = create_test_runtime();

    runtime.enable_hybrid_mode();
    assert_eq!(runtime.current_mode(), Mode::Menu);
    assert_eq!(runtime.connection_state().state_name(), "Disconnected");

    // The periodic check reports the divergence and leaves both machines
    // alone
    let divergence = runtime.check_policy_divergence().unwrap();
    assert!(divergence.desired_online);
    assert!(!divergence.actually_online);
    assert_eq!(runtime.connection_state().state_name(), "Disconnected");
    assert_eq!(runtime.current_mode(), Mode::Menu);
}

// ----------------------------------------------------------------------------
// Transactions
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_transaction_commit_equals_direct_switch() {
    let order_log = Arc::new(Mutex::new(Vec::new()));

    let mut direct = create_test_runtime();
    let direct_participant = ordered_participant("direct", &order_log, vec![Mode::Network]);
    direct.register(&direct_participant, PriorityTier::UNCLASSIFIED);
    direct.switch_to_mode(Mode::Network, false).await.unwrap();

    let mut staged = create_test_runtime();
    let staged_participant = ordered_participant("staged", &order_log, vec![Mode::Network]);
    staged.register(&staged_participant, PriorityTier::UNCLASSIFIED);
    staged.begin_transaction(Mode::Network).unwrap();
    assert_eq!(staged.pending_target(), Some(Mode::Network));
    staged.commit_transaction().await.unwrap();

    assert_eq!(staged.current_mode(), direct.current_mode());
    assert!(!staged.is_transaction_active());
    assert_eq!(
        staged.count_active_in(Mode::Network),
        direct.count_active_in(Mode::Network)
    );
    // Both participants were notified exactly once
    assert_eq!(order_log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_transaction_rollback_leaves_mode_unchanged() {
    let mut runtime = create_test_runtime();

    runtime.begin_transaction(Mode::Network).unwrap();
    assert!(runtime.is_transaction_active());
    runtime.rollback_transaction().unwrap();

    assert_eq!(runtime.current_mode(), Mode::Menu);
    assert!(!runtime.is_transaction_active());
    assert_eq!(runtime.pending_target(), None);
}

// ----------------------------------------------------------------------------
// Tier-Ordered Batched Notification
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_notification_order_across_batches() {
    let mut runtime = create_test_runtime();
    let order_log = Arc::new(Mutex::new(Vec::new()));

    // Twelve participants across tiers, more than two batches worth,
    // registered in deliberately shuffled tier order
    let tiers = [
        ("net-a", PriorityTier::NETWORK_PLAY),
        ("env-a", PriorityTier::ENVIRONMENT),
        ("fx-a", PriorityTier::TRANSITION_FX),
        ("local-a", PriorityTier::LOCAL_PLAY),
        ("env-b", PriorityTier::ENVIRONMENT),
        ("misc-a", PriorityTier::UNCLASSIFIED),
        ("net-b", PriorityTier::NETWORK_PLAY),
        ("env-c", PriorityTier::ENVIRONMENT),
        ("misc-b", PriorityTier::UNCLASSIFIED),
        ("local-b", PriorityTier::LOCAL_PLAY),
        ("fx-b", PriorityTier::TRANSITION_FX),
        ("net-c", PriorityTier::NETWORK_PLAY),
    ];
    let mut handles = Vec::new();
    for (name, tier) in tiers {
        let participant = ordered_participant(name, &order_log, vec![Mode::Local]);
        assert!(runtime.register(&participant, tier));
        handles.push(participant);
    }
    assert_eq!(runtime.count(), 12);

    runtime.switch_to_mode(Mode::Local, false).await.unwrap();

    let observed = order_log.lock().unwrap().clone();
    assert_eq!(
        observed,
        vec![
            "env-a", "env-b", "env-c", "local-a", "local-b", "misc-a", "misc-b", "net-a",
            "net-b", "net-c", "fx-a", "fx-b",
        ]
    );
}

#[tokio::test]
async fn test_unregistered_participant_receives_nothing() {
    let mut runtime = create_test_runtime();
    let order_log = Arc::new(Mutex::new(Vec::new()));

    let stays = ordered_participant("stays", &order_log, vec![Mode::Local]);
    let leaves = ordered_participant("leaves", &order_log, vec![Mode::Local]);
    runtime.register(&stays, PriorityTier::UNCLASSIFIED);
    runtime.register(&leaves, PriorityTier::UNCLASSIFIED);

    assert!(runtime.unregister(&leaves));
    runtime.switch_to_mode(Mode::Local, false).await.unwrap();

    assert_eq!(order_log.lock().unwrap().as_slice(), ["stays"]);
    assert_eq!(runtime.count(), 1);
}

#[tokio::test]
async fn test_late_joiner_synchronized_after_switch() {
    let mut runtime = create_test_runtime();
    let order_log = Arc::new(Mutex::new(Vec::new()));

    runtime.force_offline_mode().await.unwrap();
    assert_eq!(runtime.current_mode(), Mode::Local);

    let late = ordered_participant("late", &order_log, vec![Mode::Local]);
    runtime.register(&late, PriorityTier::UNCLASSIFIED);

    // Synchronized immediately, without waiting for the next transition
    assert_eq!(order_log.lock().unwrap().as_slice(), ["late"]);
}

// ----------------------------------------------------------------------------
// Transport Event Pump
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_run_pump_processes_transport_events() {
    let mut runtime = create_test_runtime();
    runtime.force_online_mode().await.unwrap();

    let sender = runtime.take_transport_event_sender().unwrap();
    let pump = tokio::spawn(async move {
        runtime.run().await.unwrap();
        runtime
    });

    sender
        .send(TransportEvent::ClientConnected {
            client_id: ClientId(3),
        })
        .await
        .unwrap();
    // Closing the channel stops the pump
    drop(sender);

    let runtime = timeout(Duration::from_secs(5), pump)
        .await
        .expect("pump should stop once the channel closes")
        .unwrap();
    assert!(runtime.connection_state().is_online());
}
