//! Rally Runtime
//!
//! Orchestration layer of the Rally mode coordination and connectivity
//! engine. Hosts the [`ModeCoordinator`] (transition protocol, batched
//! participant notification, transactions), the [`ConnectivityManager`]
//! (link lifecycle, bounded reconnection, pause gate), and the
//! [`RallyRuntime`] facade that wires both over a transport.
//!
//! The two machines are deliberately independent: they share channels and
//! a configuration, never state.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod connectivity;
pub mod coordinator;
pub mod runtime;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use connectivity::{ConnectivityManager, ConnectivityStats, PolicyDivergence};
pub use coordinator::{CoordinatorStats, ModeCoordinator};
pub use runtime::RallyRuntime;
