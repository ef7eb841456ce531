//! Callback dispatch table (spec.md §9 design note: "zero-or-one subscriber
//! per channel" rather than a generic multi-subscriber event bus). Each
//! channel is an independent optional closure; setting a new one silently
//! replaces whatever was registered before.

use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::{decode::DecodedRecord, error::ErrorKind};

type Slot<T> = Mutex<Option<Arc<T>>>;

/// Subscriber set for one [`crate::pipeline::Pipeline`] instance.
///
/// Every channel defaults to empty: a pipeline with no callbacks registered
/// still runs, it just has nobody to tell.
#[derive(Default)]
pub struct Callbacks {
    connection_changed: Slot<dyn Fn(bool) + Send + Sync>,
    received: Slot<dyn Fn(&DecodedRecord, Option<u16>) + Send + Sync>,
    error: Slot<dyn Fn(ErrorKind, &str) + Send + Sync>,
    tx_raw: Slot<dyn Fn(&[u8]) + Send + Sync>,
    rx_raw: Slot<dyn Fn(&[u8]) + Send + Sync>,
}

impl Callbacks {
    /// Creates a callback set with every channel empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (replacing any prior) the connection-state-change callback.
    pub fn on_connection_changed<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *self.connection_changed.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(Arc::new(callback));
    }

    /// Registers (replacing any prior) the decoded-record callback.
    pub fn on_received<F>(&self, callback: F)
    where
        F: Fn(&DecodedRecord, Option<u16>) + Send + Sync + 'static,
    {
        *self.received.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(Arc::new(callback));
    }

    /// Registers (replacing any prior) the error callback.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(ErrorKind, &str) + Send + Sync + 'static,
    {
        *self.error.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Registers (replacing any prior) the raw-bytes-transmitted callback.
    pub fn on_tx_raw<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self.tx_raw.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Registers (replacing any prior) the raw-bytes-received callback.
    pub fn on_rx_raw<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self.rx_raw.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub(crate) fn connection_changed(&self, connected: bool) {
        if let Some(callback) = self.slot(&self.connection_changed) {
            callback(connected);
        }
    }

    pub(crate) fn received(&self, record: &DecodedRecord, address: Option<u16>) {
        if let Some(callback) = self.slot(&self.received) {
            callback(record, address);
        }
    }

    pub(crate) fn error(&self, kind: ErrorKind, detail: &str) {
        if let Some(callback) = self.slot(&self.error) {
            callback(kind, detail);
        }
    }

    pub(crate) fn tx_raw(&self, bytes: &[u8]) {
        if let Some(callback) = self.slot(&self.tx_raw) {
            callback(bytes);
        }
    }

    pub(crate) fn rx_raw(&self, bytes: &[u8]) {
        if let Some(callback) = self.slot(&self.rx_raw) {
            callback(bytes);
        }
    }

    fn slot<T: ?Sized>(&self, slot: &Slot<T>) -> Option<Arc<T>> {
        slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn registering_a_second_callback_replaces_the_first() {
        let callbacks = Callbacks::new();
        let first_fired = Arc::new(AtomicBool::new(false));
        let second_fired = Arc::new(AtomicBool::new(false));

        let first = Arc::clone(&first_fired);
        callbacks.on_connection_changed(move |_| first.store(true, Ordering::SeqCst));
        let second = Arc::clone(&second_fired);
        callbacks.on_connection_changed(move |_| second.store(true, Ordering::SeqCst));

        callbacks.connection_changed(true);
        assert!(!first_fired.load(Ordering::SeqCst));
        assert!(second_fired.load(Ordering::SeqCst));
    }

    #[test]
    fn unregistered_channel_is_a_silent_no_op() {
        let callbacks = Callbacks::new();
        callbacks.error(ErrorKind::Transport, "unreachable");
    }

    #[test]
    fn raw_byte_channels_receive_the_slice() {
        let callbacks = Callbacks::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        callbacks.on_tx_raw(move |bytes| seen_clone.lock().unwrap().extend_from_slice(bytes));
        callbacks.tx_raw(&[1, 2, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
