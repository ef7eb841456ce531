//! Connection lifecycle state machine (C9): handshake, keep-alive, close.
//!
//! Pure action-returning state machine, generic over an `Instant`-like time
//! source so tests can drive it with a virtual clock instead of
//! `std::time::Instant`. No I/O: the pipeline worker executes the actions
//! this type returns (enqueueing an Info request, invoking the
//! connection-changed callback).

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use crate::error::ConnectionError;

/// Time allowed to complete the initial handshake before giving up.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle period after which a keep-alive Info read is enqueued.
pub const DEFAULT_KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(3);

/// Idle period with no response after which the connection is considered
/// lost.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Actions a driver (the pipeline worker) must execute in response to a
/// state transition. The connection itself never touches the transport or
/// the queue directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Build and enqueue an Info request (vendor Info opcode, or the Gen2
    /// Modbus input-register read of the Info block — the pipeline decides
    /// which, based on the active transport variant).
    EnqueueInfoRequest,
    /// Invoke the user's connection-changed callback with this value.
    ConnectionChanged(bool),
    /// Tear down the transport and clear the pending-request queue.
    Close,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport activity; the initial and final state.
    Closed,
    /// Handshake in progress; waiting for a qualifying response.
    Connecting,
    /// Handshake complete; keep-alive probing may be active.
    Connected,
}

/// Connection behavior knobs (spec.md §4.9, §6).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum time allowed in `Connecting` before giving up.
    pub connect_timeout: Duration,
    /// Whether `connect()` enqueues an Info request (callers may opt out if
    /// they intend to drive the handshake themselves).
    pub send_info_on_connect: bool,
    /// If true, only the Info response specifically (not any valid
    /// response) completes the handshake.
    pub strict_handshake: bool,
    /// Whether idle keep-alive probing is active once `Connected`.
    pub keep_alive_enabled: bool,
    /// Idle period after which a keep-alive Info read is enqueued.
    pub keep_alive_period: Duration,
    /// Idle period with no response after which the connection closes.
    pub keep_alive_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_info_on_connect: true,
            strict_handshake: false,
            keep_alive_enabled: true,
            keep_alive_period: DEFAULT_KEEP_ALIVE_PERIOD,
            keep_alive_timeout: DEFAULT_KEEP_ALIVE_TIMEOUT,
        }
    }
}

/// Pure connection lifecycle state machine, generic over the instant type
/// `I` (production: `std::time::Instant`; tests: a virtual clock from
/// `hantas-harness`).
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: ConnectionState,
    config: ConnectionConfig,
    connect_time: Option<I>,
    last_activity: Option<I>,
    last_probe_at: Option<I>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Creates a connection in [`ConnectionState::Closed`].
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self { state: ConnectionState::Closed, config, connect_time: None, last_activity: None, last_probe_at: None }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Begins a handshake: `Closed` → `Connecting`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidState`] unless currently `Closed`.
    pub fn connect(&mut self, now: I) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Closed {
            return Err(ConnectionError::InvalidState { state: self.state, operation: "connect" });
        }
        self.state = ConnectionState::Connecting;
        self.connect_time = Some(now);
        self.last_activity = Some(now);
        self.last_probe_at = None;

        tracing::debug!(state = ?self.state, "connection transition");
        let mut actions = Vec::new();
        if self.config.send_info_on_connect {
            actions.push(ConnectionAction::EnqueueInfoRequest);
        }
        Ok(actions)
    }

    /// Tears the connection down from any state. Fires
    /// [`ConnectionAction::ConnectionChanged`]`(false)` exactly once per
    /// observed loss — not at all if already `Closed`.
    pub fn close(&mut self) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }
        self.state = ConnectionState::Closed;
        self.connect_time = None;
        self.last_activity = None;
        self.last_probe_at = None;
        tracing::info!("connection closed");
        vec![ConnectionAction::Close, ConnectionAction::ConnectionChanged(false)]
    }

    /// Records a response arriving from the device. `is_info_response`
    /// matters only in `strict_handshake` mode, where the handshake advances
    /// solely on the Info reply rather than on any valid response.
    pub fn observe_response(&mut self, now: I, is_info_response: bool) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Closed => Vec::new(),
            ConnectionState::Connecting => {
                if self.config.strict_handshake && !is_info_response {
                    self.last_activity = Some(now);
                    return Vec::new();
                }
                self.state = ConnectionState::Connected;
                self.last_activity = Some(now);
                tracing::info!("connection established");
                vec![ConnectionAction::ConnectionChanged(true)]
            },
            ConnectionState::Connected => {
                self.last_activity = Some(now);
                Vec::new()
            },
        }
    }

    /// Periodic maintenance: connect-timeout and keep-alive. `queue_idle`
    /// reflects whether the pipeline's request queue is currently empty —
    /// keep-alive probing only applies while idle (spec.md §4.9).
    pub fn tick(&mut self, now: I, queue_idle: bool) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Closed => Vec::new(),
            ConnectionState::Connecting => self.tick_connecting(now),
            ConnectionState::Connected => self.tick_connected(now, queue_idle),
        }
    }

    fn tick_connecting(&mut self, now: I) -> Vec<ConnectionAction> {
        let Some(connect_time) = self.connect_time else {
            return Vec::new();
        };
        if now - connect_time > self.config.connect_timeout {
            tracing::warn!("connect timeout exceeded");
            self.state = ConnectionState::Closed;
            self.connect_time = None;
            self.last_activity = None;
            return vec![ConnectionAction::Close, ConnectionAction::ConnectionChanged(false)];
        }
        Vec::new()
    }

    fn tick_connected(&mut self, now: I, queue_idle: bool) -> Vec<ConnectionAction> {
        if !self.config.keep_alive_enabled || !queue_idle {
            return Vec::new();
        }
        let Some(last_activity) = self.last_activity else {
            return Vec::new();
        };
        let idle_for = now - last_activity;

        if idle_for >= self.config.keep_alive_timeout {
            tracing::info!("keep-alive timeout; closing");
            self.state = ConnectionState::Closed;
            self.connect_time = None;
            self.last_activity = None;
            self.last_probe_at = None;
            return vec![ConnectionAction::Close, ConnectionAction::ConnectionChanged(false)];
        }

        if idle_for >= self.config.keep_alive_period {
            let should_probe = match self.last_probe_at {
                None => true,
                Some(last) => now - last >= self.config.keep_alive_period,
            };
            if should_probe {
                tracing::debug!("keep-alive probe enqueued");
                self.last_probe_at = Some(now);
                return vec![ConnectionAction::EnqueueInfoRequest];
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Tick(u64);

    impl Sub for Tick {
        type Output = Duration;
        fn sub(self, rhs: Self) -> Duration {
            Duration::from_millis(self.0 - rhs.0)
        }
    }

    fn ms(n: u64) -> Tick {
        Tick(n)
    }

    #[test]
    fn connect_enqueues_info_request_and_enters_connecting() {
        let mut conn: Connection<Tick> = Connection::new(ConnectionConfig::default());
        let actions = conn.connect(ms(0)).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(actions, vec![ConnectionAction::EnqueueInfoRequest]);
    }

    #[test]
    fn connect_twice_is_rejected() {
        let mut conn: Connection<Tick> = Connection::new(ConnectionConfig::default());
        conn.connect(ms(0)).unwrap();
        assert!(matches!(conn.connect(ms(1)), Err(ConnectionError::InvalidState { .. })));
    }

    #[test]
    fn any_response_completes_handshake_when_not_strict() {
        let mut conn: Connection<Tick> = Connection::new(ConnectionConfig::default());
        conn.connect(ms(0)).unwrap();
        let actions = conn.observe_response(ms(10), false);
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(actions, vec![ConnectionAction::ConnectionChanged(true)]);
    }

    #[test]
    fn strict_handshake_ignores_non_info_responses() {
        let mut config = ConnectionConfig::default();
        config.strict_handshake = true;
        let mut conn: Connection<Tick> = Connection::new(config);
        conn.connect(ms(0)).unwrap();
        assert!(conn.observe_response(ms(10), false).is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);
        let actions = conn.observe_response(ms(20), true);
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(actions, vec![ConnectionAction::ConnectionChanged(true)]);
    }

    #[test]
    fn connect_timeout_closes_and_reports_loss() {
        let mut conn: Connection<Tick> = Connection::new(ConnectionConfig::default());
        conn.connect(ms(0)).unwrap();
        let actions = conn.tick(ms(5_001), true);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(actions, vec![ConnectionAction::Close, ConnectionAction::ConnectionChanged(false)]);
    }

    #[test]
    fn keep_alive_probe_then_close_after_timeout() {
        let mut conn: Connection<Tick> = Connection::new(ConnectionConfig::default());
        conn.connect(ms(0)).unwrap();
        conn.observe_response(ms(0), true);
        assert_eq!(conn.state(), ConnectionState::Connected);

        // Idle for keep_alive_period: one Info probe.
        let actions = conn.tick(ms(3_000), true);
        assert_eq!(actions, vec![ConnectionAction::EnqueueInfoRequest]);

        // Still idle but under keep_alive_timeout since last activity: no repeat probe yet.
        assert!(conn.tick(ms(3_500), true).is_empty());

        // Idle past keep_alive_timeout with no response observed: close.
        let actions = conn.tick(ms(10_001), true);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(actions, vec![ConnectionAction::Close, ConnectionAction::ConnectionChanged(false)]);
    }

    #[test]
    fn keep_alive_does_not_probe_while_queue_is_busy() {
        let mut conn: Connection<Tick> = Connection::new(ConnectionConfig::default());
        conn.connect(ms(0)).unwrap();
        conn.observe_response(ms(0), true);
        assert!(conn.tick(ms(3_000), false).is_empty());
    }

    #[test]
    fn close_fires_exactly_once() {
        let mut conn: Connection<Tick> = Connection::new(ConnectionConfig::default());
        conn.connect(ms(0)).unwrap();
        let actions = conn.close();
        assert_eq!(actions, vec![ConnectionAction::Close, ConnectionAction::ConnectionChanged(false)]);
        assert!(conn.close().is_empty());
    }
}
