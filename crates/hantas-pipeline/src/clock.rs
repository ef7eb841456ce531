//! Time abstraction for the pipeline's periodic worker.
//!
//! Mirrors the teacher crate's `Environment` trait, trimmed to the one
//! capability the worker actually needs: a monotonic instant type plus an
//! async sleep. Randomness has no role here (`FNV-1a` fingerprints are
//! deterministic), so it is left out rather than carried for symmetry.

use std::{future::Future, time::Duration};

/// Abstract source of monotonic time and async sleep, so the worker loop can
/// be driven by a virtual clock in tests and by the real one in production.
pub trait Clock: Clone + Send + Sync + 'static {
    /// The instant type this clock produces. Production clocks use
    /// [`tokio::time::Instant`]; test doubles use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic: never decreases within one execution).
    fn now(&self) -> Self::Instant;

    /// Sleeps for `duration`. The only async method; protocol logic never
    /// calls it directly, only the worker's tick loop does.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production [`Clock`] backed by Tokio's timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
