//! Error types for connection-lifecycle and keyed-queue logic.

use thiserror::Error;

/// Errors raised by [`crate::queue::KeyedQueue`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has been disposed; every further operation fails with this
    /// distinguished error (spec.md §4.6 invariant (c)).
    #[error("queue has been disposed")]
    Disposed,

    /// A caller-supplied key-selector function failed for one item in a
    /// batch enqueue. Carried alongside the item itself in
    /// [`crate::queue::BatchOutcome::failures`], not returned here directly.
    #[error("key selector failed: {0}")]
    KeySelector(String),
}

/// Errors raised by [`crate::connection::Connection`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// An operation that only makes sense in a specific state was attempted
    /// outside of it (for example, calling `connect` while already
    /// `Connecting`).
    #[error("invalid operation {operation} in state {state:?}")]
    InvalidState {
        /// State the connection was in.
        state: crate::connection::ConnectionState,
        /// Operation that was attempted.
        operation: &'static str,
    },
}
