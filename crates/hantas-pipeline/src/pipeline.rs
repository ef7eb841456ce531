//! [`Pipeline`] (C8): the public request pipeline.
//!
//! Mirrors the teacher crate's split between a pure driver and the runtime
//! that executes its actions (see `lockframe-server`'s `ServerDriver` +
//! `Server::run`/`execute_actions`): [`hantas_core::Connection`] is the pure
//! state machine, [`WorkerState`] is this crate's executor, and
//! [`Pipeline`] is the handle callers actually hold. Producers (callers of
//! `read_holding` and friends) only ever touch the shared keyed queue; the
//! worker task is the single owner of the transport, the framer, the ring
//! buffer, and the connection state machine (spec.md §5).

use std::sync::Arc;

use hantas_core::{Connection, ConnectionAction, DuplicatePolicy, KeyedQueue};
use hantas_proto::{
    codec::StatusGeneration,
    frame::{FramerConfig, FramerOutcome},
    ring_buffer::RingBuffer,
    FunctionCode,
};
use hantas_transport::Transport;
use tokio::sync::{mpsc, oneshot};

use crate::{
    callbacks::Callbacks,
    clock::{Clock, SystemClock},
    config::PipelineConfig,
    decode,
    error::{ErrorKind, PipelineError},
    pending::{PendingRequest, RequestKey},
    wire::{self, AnyFramer, TransactionIdGenerator, WireKind},
};

/// A [`PendingRequest`] plus the one bit of bookkeeping the queue itself
/// doesn't carry: whether this is the handshake/keep-alive Info read, which
/// `observe_response` needs to know about for `strict_handshake` mode.
#[derive(Debug, Clone)]
struct QueuedRequest<I> {
    request: PendingRequest<I>,
    is_info: bool,
}

/// Register count of the Gen2 200-byte Info block (100 `u16` registers).
fn info_register_count(generation: StatusGeneration) -> u16 {
    match generation {
        StatusGeneration::Gen1 | StatusGeneration::Gen1Plus => {
            hantas_proto::codec::info::INFO_REGISTER_COUNT_LEGACY
        },
        StatusGeneration::Gen2 => (hantas_proto::codec::info::INFO_BYTE_LEN_GEN2 / 2) as u16,
    }
}

/// Messages the handle sends to the worker task. Only `connect`/`close`
/// need a round trip through the worker: every other public operation only
/// touches the shared queue (spec.md §5: "producers only call enqueue
/// paths").
enum Control {
    Connect(oneshot::Sender<Result<(), PipelineError>>),
    Close(oneshot::Sender<()>),
}

/// The request pipeline: builds wire frames, chunks large ranges, tracks
/// in-flight requests, and routes responses back to the user's callbacks.
///
/// Cloning is not provided; share a `Pipeline` behind an `Arc` if multiple
/// callers need to issue requests concurrently (the queue and callbacks
/// underneath are already `Send + Sync`).
pub struct Pipeline<C: Clock = SystemClock> {
    queue: Arc<KeyedQueue<RequestKey, QueuedRequest<C::Instant>>>,
    callbacks: Arc<Callbacks>,
    transactions: TransactionIdGenerator,
    wire: WireKind,
    device_id: u8,
    config: PipelineConfig,
    control: mpsc::UnboundedSender<Control>,
    worker: tokio::task::AbortHandle,
}

impl<C: Clock> Pipeline<C> {
    /// Opens a pipeline over `transport`, speaking `wire`, and spawns its
    /// worker task. The transport is not opened yet; call [`Self::connect`]
    /// to begin the handshake.
    #[must_use]
    pub fn open(transport: Box<dyn Transport>, wire: WireKind, device_id: u8, config: PipelineConfig, clock: C) -> Self {
        let queue: Arc<KeyedQueue<RequestKey, QueuedRequest<C::Instant>>> = Arc::new(KeyedQueue::new());
        let callbacks = Arc::new(Callbacks::new());
        let transactions = TransactionIdGenerator::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let state = WorkerState {
            transport,
            framer: AnyFramer::new(wire, FramerConfig::default()),
            ring: RingBuffer::new(config.ring_buffer_capacity),
            connection: Connection::new(config.connection_config()),
            active: None,
            queue: Arc::clone(&queue),
            callbacks: Arc::clone(&callbacks),
            transactions: transactions.clone(),
            wire,
            device_id,
            config: config.clone(),
            clock,
        };
        let handle = tokio::spawn(run_worker(state, control_rx));

        Self {
            queue,
            callbacks,
            transactions,
            wire,
            device_id,
            config,
            control: control_tx,
            worker: handle.abort_handle(),
        }
    }

    /// The callback dispatch table for this pipeline. Register subscribers
    /// before calling [`Self::connect`] to avoid missing early events.
    #[must_use]
    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Begins the handshake: `Closed` → `Connecting`. Completion (or
    /// connect-timeout) is reported via `on_connection_changed`.
    ///
    /// # Errors
    /// Propagates [`hantas_core::ConnectionError`] if the connection is not
    /// currently `Closed`, and [`PipelineError::WorkerUnavailable`] if the
    /// worker task is no longer running.
    pub async fn connect(&self) -> Result<(), PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.control.send(Control::Connect(tx)).map_err(|_| PipelineError::WorkerUnavailable)?;
        rx.await.map_err(|_| PipelineError::WorkerUnavailable)?
    }

    /// Tears the connection down, clears the pending-request queue, and
    /// waits for the worker to finish cleanup. Safe to call more than once.
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.control.send(Control::Close(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Reads `count` holding registers starting at `address`, chunked into
    /// blocks of at most `split` registers (default/max: 125, spec.md §6).
    ///
    /// Returns the number of blocks actually enqueued; fewer than the full
    /// chunk count means some blocks were refused as duplicates of an
    /// already-pending request, which is not an error (spec.md §4.8).
    ///
    /// # Errors
    /// Returns [`PipelineError::Queue`] only if the queue has been disposed.
    pub async fn read_holding(&self, address: u16, count: u16, split: Option<u16>) -> Result<usize, PipelineError> {
        self.read(FunctionCode::ReadHolding, address, count, split)
    }

    /// Reads `count` input registers. See [`Self::read_holding`].
    ///
    /// # Errors
    /// Returns [`PipelineError::Queue`] only if the queue has been disposed.
    pub async fn read_input(&self, address: u16, count: u16, split: Option<u16>) -> Result<usize, PipelineError> {
        self.read(FunctionCode::ReadInput, address, count, split)
    }

    /// Reads the device Info block (Gen2 200-byte or legacy 13-byte,
    /// depending on the pipeline's configured [`StatusGeneration`]).
    ///
    /// # Errors
    /// Returns [`PipelineError::Queue`] only if the queue has been disposed.
    pub async fn read_info(&self) -> Result<usize, PipelineError> {
        let count = info_register_count(self.config.status_generation);
        self.read(FunctionCode::ReadInfo, 0, count, None)
    }

    fn read(&self, function: FunctionCode, address: u16, count: u16, split: Option<u16>) -> Result<usize, PipelineError> {
        let chunk = split.unwrap_or(crate::config::MAX_READ_REGISTERS).clamp(1, crate::config::MAX_READ_REGISTERS);
        let mut accepted = 0usize;
        let mut offset: u16 = 0;
        while offset < count {
            let block = chunk.min(count - offset);
            let outgoing =
                wire::build_read(self.wire, &self.transactions, self.device_id, function, address + offset, block);
            let request = PendingRequest::new(outgoing.opcode, address + offset, outgoing.bytes, self.config.max_retries, false);
            let key = request.key;
            let queued = QueuedRequest { request, is_info: function == FunctionCode::ReadInfo };
            if self.queue.enqueue(key, queued, DuplicatePolicy::EnforceUnique)? {
                accepted += 1;
            }
            offset += block;
        }
        Ok(accepted)
    }

    /// Writes a single register. `allow_duplicate` opts out of the default
    /// de-duplication so a repeated identical write is not silently
    /// coalesced with one already pending (spec.md §4.8).
    ///
    /// # Errors
    /// Returns [`PipelineError::Queue`] only if the queue has been disposed.
    pub async fn write_single(&self, address: u16, value: u16, allow_duplicate: bool) -> Result<bool, PipelineError> {
        let outgoing = wire::build_write_single(self.wire, &self.transactions, self.device_id, address, value);
        let request = PendingRequest::new(outgoing.opcode, address, outgoing.bytes, self.config.max_retries, false);
        let key = request.key;
        let queued = QueuedRequest { request, is_info: false };
        let policy = if allow_duplicate { DuplicatePolicy::AllowDuplicate } else { DuplicatePolicy::EnforceUnique };
        Ok(self.queue.enqueue(key, queued, policy)?)
    }

    /// Writes `values` starting at `address`, chunked into blocks of at
    /// most `split` registers (default/max: 123, spec.md §6).
    ///
    /// # Errors
    /// Returns [`PipelineError::Queue`] only if the queue has been disposed.
    pub async fn write_multi(
        &self,
        address: u16,
        values: &[u16],
        split: Option<u16>,
        allow_duplicate: bool,
    ) -> Result<usize, PipelineError> {
        let chunk =
            usize::from(split.unwrap_or(crate::config::MAX_WRITE_REGISTERS).clamp(1, crate::config::MAX_WRITE_REGISTERS));
        let policy = if allow_duplicate { DuplicatePolicy::AllowDuplicate } else { DuplicatePolicy::EnforceUnique };
        let mut accepted = 0usize;
        for (index, block) in values.chunks(chunk.max(1)).enumerate() {
            let block_address = address + (index * chunk) as u16;
            let outgoing = wire::build_write_multi(self.wire, &self.transactions, self.device_id, block_address, block);
            let request =
                PendingRequest::new(outgoing.opcode, block_address, outgoing.bytes, self.config.max_retries, false);
            let key = request.key;
            let queued = QueuedRequest { request, is_info: false };
            if self.queue.enqueue(key, queued, policy)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Writes `text` as packed big-endian register words starting at
    /// `address`. `length` pads or truncates the byte form before packing
    /// (default: the string's own UTF-8 byte length); an odd byte length is
    /// zero-padded to fill its last register.
    ///
    /// # Errors
    /// Returns [`PipelineError::Queue`] only if the queue has been disposed.
    pub async fn write_string(
        &self,
        address: u16,
        text: &str,
        length: Option<usize>,
        allow_duplicate: bool,
    ) -> Result<usize, PipelineError> {
        let byte_len = length.unwrap_or(text.len());
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(byte_len, 0);
        if bytes.len() % 2 != 0 {
            bytes.push(0);
        }
        let values: Vec<u16> = bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        self.write_multi(address, &values, None, allow_duplicate).await
    }
}

impl<C: Clock> Drop for Pipeline<C> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Worker-owned state: the transport, framer, ring buffer, connection state
/// machine, and the one request currently activated (held outside the
/// queue so mutating its retry bookkeeping never disturbs FIFO order for
/// the rest of the queue).
struct WorkerState<C: Clock> {
    transport: Box<dyn Transport>,
    framer: AnyFramer<C::Instant>,
    ring: RingBuffer,
    connection: Connection<C::Instant>,
    active: Option<QueuedRequest<C::Instant>>,
    queue: Arc<KeyedQueue<RequestKey, QueuedRequest<C::Instant>>>,
    callbacks: Arc<Callbacks>,
    transactions: TransactionIdGenerator,
    wire: WireKind,
    device_id: u8,
    config: PipelineConfig,
    clock: C,
}

async fn run_worker<C: Clock>(mut state: WorkerState<C>, mut control: mpsc::UnboundedReceiver<Control>) {
    let mut recv_buf = vec![0u8; state.config.ring_buffer_capacity.max(512)];
    loop {
        tokio::select! {
            () = state.clock.sleep(state.config.tick_interval) => {
                state.tick().await;
            }
            cmd = control.recv() => {
                match cmd {
                    Some(Control::Connect(ack)) => {
                        let result = state.handle_connect().await;
                        let _ = ack.send(result);
                    },
                    Some(Control::Close(ack)) => {
                        state.handle_close().await;
                        let _ = ack.send(());
                        return;
                    },
                    None => return,
                }
            }
            result = state.transport.recv(&mut recv_buf) => {
                match result {
                    Ok(n) if n > 0 => state.on_bytes(&recv_buf[..n]).await,
                    Ok(_) => {},
                    Err(err) => state.handle_transport_error(&err.to_string()).await,
                }
            }
        }
    }
}

impl<C: Clock> WorkerState<C> {
    fn queue_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty().unwrap_or(true)
    }

    async fn tick(&mut self) {
        let now = self.clock.now();
        let idle = self.queue_idle();
        let actions = self.connection.tick(now, idle);
        self.handle_actions(actions).await;
        self.drive_active(now).await;
    }

    async fn handle_connect(&mut self) -> Result<(), PipelineError> {
        self.transport.open().await?;
        let now = self.clock.now();
        let actions = self.connection.connect(now)?;
        self.handle_actions(actions).await;
        Ok(())
    }

    async fn handle_close(&mut self) {
        let actions = self.connection.close();
        self.handle_actions(actions).await;
        let _ = self.transport.close().await;
        let _ = self.queue.clear();
        self.active = None;
    }

    async fn handle_actions(&mut self, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::EnqueueInfoRequest => self.enqueue_info_request(),
                ConnectionAction::ConnectionChanged(connected) => self.callbacks.connection_changed(connected),
                ConnectionAction::Close => {
                    let _ = self.transport.close().await;
                    let _ = self.queue.clear();
                    self.active = None;
                },
            }
        }
    }

    fn enqueue_info_request(&self) {
        let count = info_register_count(self.config.status_generation);
        let outgoing =
            wire::build_read(self.wire, &self.transactions, self.device_id, FunctionCode::ReadInfo, 0, count);
        let request = PendingRequest::new(outgoing.opcode, 0, outgoing.bytes, self.config.max_retries, false);
        let key = request.key;
        let queued = QueuedRequest { request, is_info: true };
        let _ = self.queue.enqueue(key, queued, DuplicatePolicy::EnforceUnique);
    }

    async fn drive_active(&mut self, now: C::Instant) {
        if self.active.is_none() {
            if let Ok(Some(entry)) = self.queue.dequeue() {
                self.active = Some(entry);
            }
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if !active.request.activated {
            match self.transport.send(&active.request.packet).await {
                Ok(()) => {
                    self.callbacks.tx_raw(&active.request.packet);
                    active.request.activated = true;
                    active.request.activated_at = Some(now);
                    if active.request.no_ack {
                        self.active = None;
                    }
                },
                Err(err) => {
                    let detail = err.to_string();
                    self.handle_transport_error(&detail).await;
                },
            }
            return;
        }

        let Some(activated_at) = active.request.activated_at else {
            return;
        };
        if now - activated_at > self.config.message_timeout {
            if active.request.retries_left == 0 {
                tracing::warn!(opcode = active.request.command, "request retries exhausted, dropping");
                self.active = None;
            } else {
                active.request.retries_left -= 1;
                active.request.activated = false;
                active.request.activated_at = None;
            }
        }
    }

    async fn on_bytes(&mut self, bytes: &[u8]) {
        self.callbacks.rx_raw(bytes);
        if self.ring.write(bytes).is_err() {
            tracing::warn!(len = bytes.len(), "ring buffer overflow, clearing to resynchronize");
            self.ring.clear();
            return;
        }
        loop {
            let now = self.clock.now();
            match self.framer.accept(&mut self.ring, now) {
                FramerOutcome::NeedsMore => break,
                FramerOutcome::Frame(envelope) => self.handle_envelope(envelope, now),
            }
        }
    }

    fn handle_envelope(&mut self, envelope: hantas_proto::frame::Envelope, now: C::Instant) {
        let mut address = None;
        let mut is_info_response = false;
        let mut matched = false;

        if let Some(active) = &self.active {
            if active.request.activated && wire::reply_matches(self.wire, active.request.command, envelope.opcode) {
                matched = true;
                address = Some(active.request.address);
                is_info_response = active.is_info;
            }
        }

        if matched {
            self.active = None;
            for action in self.connection.observe_response(now, is_info_response) {
                if let ConnectionAction::ConnectionChanged(connected) = action {
                    self.callbacks.connection_changed(connected);
                }
            }
        }

        match decode::decode(envelope.opcode, &envelope.payload, self.wire.label(), self.config.status_generation) {
            Ok(record) => self.callbacks.received(&record, address),
            Err(err) => self.callbacks.error(ErrorKind::Decode, &err.to_string()),
        }
    }

    async fn handle_transport_error(&mut self, detail: &str) {
        self.callbacks.error(ErrorKind::Transport, detail);
        let actions = self.connection.close();
        self.handle_actions(actions).await;
    }
}
