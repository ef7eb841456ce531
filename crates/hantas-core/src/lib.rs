//! Sans-IO connection lifecycle and keyed request queue shared by anything
//! that drives a Hantas connection.
//!
//! No transport I/O and no wall-clock access live here: [`connection`]'s
//! state machine is generic over an `Instant`-like type, and [`queue`]'s
//! blocking primitives are the only place real time (`std::time::Instant`)
//! is read directly, strictly for timeout bookkeeping.

pub mod connection;
pub mod error;
pub mod legacy;
pub mod queue;

pub use connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState};
pub use error::{ConnectionError, QueueError};
pub use legacy::{LegacyProbe, LegacyProbeAction, LegacyProbeState};
pub use queue::{BatchOutcome, CancelToken, DuplicatePolicy, KeyedQueue};
