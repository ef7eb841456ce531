//! [`VirtualClock`]: a manually-advanced [`hantas_pipeline::Clock`] so
//! scenario tests can drive keep-alive, connect-timeout, and retry logic
//! without sleeping in real time.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use hantas_pipeline::Clock;
use tokio::sync::Notify;

/// An instant produced by [`VirtualClock`]: elapsed virtual time since the
/// clock was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualInstant(Duration);

impl std::ops::Sub for VirtualInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

struct Inner {
    now: Duration,
}

/// A clock whose time only moves when [`VirtualClock::advance`] is called.
/// Cloning shares the same underlying time and waiter set, matching how a
/// pipeline's worker task and the test driving it must agree on "now".
#[derive(Clone)]
pub struct VirtualClock {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

impl VirtualClock {
    /// Creates a clock starting at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { now: Duration::ZERO })), notify: Arc::new(Notify::new()) }
    }

    /// Advances virtual time by `by` and wakes every pending [`Clock::sleep`].
    pub fn advance(&self, by: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.now += by;
        drop(inner);
        self.notify.notify_waiters();
    }

    fn elapsed(&self) -> Duration {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).now
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    type Instant = VirtualInstant;

    fn now(&self) -> VirtualInstant {
        VirtualInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let deadline = self.elapsed() + duration;
        let inner = Arc::clone(&self.inner);
        let notify = Arc::clone(&self.notify);
        async move {
            loop {
                let notified = notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if inner.lock().unwrap_or_else(PoisonError::into_inner).now >= deadline {
                    return;
                }
                notified.await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_resolves_once_advanced_past_deadline() {
        let clock = VirtualClock::new();
        let waiter = clock.clone();
        let handle = tokio::spawn(async move {
            waiter.sleep(Duration::from_millis(100)).await;
        });

        tokio::task::yield_now().await;
        clock.advance(Duration::from_millis(50));
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        clock.advance(Duration::from_millis(50));
        handle.await.unwrap();
    }

    #[test]
    fn subtraction_saturates_rather_than_panicking() {
        let earlier = VirtualInstant(Duration::from_millis(10));
        let later = VirtualInstant(Duration::from_millis(5));
        assert_eq!(earlier - later, Duration::from_millis(5));
        assert_eq!(later - earlier, Duration::ZERO);
    }
}
