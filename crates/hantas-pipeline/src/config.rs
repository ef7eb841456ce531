//! `PipelineConfig` (spec.md §6): the constants governing worker cadence,
//! timeouts, and the protocol generation this connection speaks.

use std::time::Duration;

use hantas_core::ConnectionConfig;
use hantas_proto::codec::{EventGeneration, StatusGeneration};

/// Maximum registers per read request (spec.md §6).
pub const MAX_READ_REGISTERS: u16 = hantas_proto::FunctionCode::MAX_READ_REGISTERS;
/// Maximum registers per write request (spec.md §6).
pub const MAX_WRITE_REGISTERS: u16 = hantas_proto::FunctionCode::MAX_WRITE_REGISTERS;

/// Tuning knobs for one [`crate::pipeline::Pipeline`] instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker tick cadence. 20 ms for the modern (Gen2) pipeline, 50-100 ms
    /// for legacy variants (spec.md §4.8).
    pub tick_interval: Duration,
    /// How long an activated request waits for its response before a retry.
    pub message_timeout: Duration,
    /// How long `Connecting` waits for a handshake response before closing.
    pub connect_timeout: Duration,
    /// Idle-queue duration before a keep-alive Info read is enqueued.
    pub keep_alive_period: Duration,
    /// How long `Connected` tolerates no response before closing.
    pub keep_alive_timeout: Duration,
    /// Whether keep-alive probing is active at all.
    pub keep_alive_enabled: bool,
    /// Whether `connect()` enqueues an Info read (vs. assuming the caller
    /// will issue one explicitly).
    pub send_info_on_connect: bool,
    /// If true, only the Info response (not any response) completes the
    /// handshake.
    pub strict_handshake: bool,
    /// Retransmissions attempted before a timed-out entry is dropped.
    pub max_retries: u8,
    /// Advisory queue depth (spec.md §6: 32-64); the keyed queue itself is
    /// unbounded, this is a soft budget callers may enforce at the call site.
    pub queue_capacity: usize,
    /// Ring buffer capacity hint in bytes (spec.md §6: 4 KiB-16 KiB).
    pub ring_buffer_capacity: usize,
    /// Protocol generation selecting `Status` field widths. Chosen by the
    /// caller per connection, never sniffed from the wire (see the
    /// `Status` decoder's own doc comment).
    pub status_generation: StatusGeneration,
    /// Protocol generation selecting `Event` field widths.
    pub event_generation: EventGeneration,
}

impl PipelineConfig {
    /// Derives the [`ConnectionConfig`] this pipeline's state machine runs
    /// with, from the subset of fields that overlap.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: self.connect_timeout,
            send_info_on_connect: self.send_info_on_connect,
            strict_handshake: self.strict_handshake,
            keep_alive_enabled: self.keep_alive_enabled,
            keep_alive_period: self.keep_alive_period,
            keep_alive_timeout: self.keep_alive_timeout,
        }
    }

    /// Defaults tuned for the legacy (Gen1) wire variants: a slower tick and
    /// the fixed-point `Status`/`Event` layouts.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            tick_interval: Duration::from_millis(75),
            status_generation: StatusGeneration::Gen1,
            event_generation: EventGeneration::Gen1,
            ..Self::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(20),
            message_timeout: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(5),
            keep_alive_period: Duration::from_secs(3),
            keep_alive_timeout: Duration::from_secs(10),
            keep_alive_enabled: true,
            send_info_on_connect: true,
            strict_handshake: false,
            max_retries: 3,
            queue_capacity: 64,
            ring_buffer_capacity: 8192,
            status_generation: StatusGeneration::Gen2,
            event_generation: EventGeneration::Gen2,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn legacy_preset_keeps_modern_timeouts_but_swaps_generation_and_tick() {
        let legacy = PipelineConfig::legacy();
        let modern = PipelineConfig::default();
        assert_eq!(legacy.status_generation, StatusGeneration::Gen1);
        assert_eq!(legacy.message_timeout, modern.message_timeout);
        assert_ne!(legacy.tick_interval, modern.tick_interval);
    }
}
