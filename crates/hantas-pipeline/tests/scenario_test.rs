//! End-to-end scenarios (spec.md §8 S1/S3/S4) driven against
//! [`hantas_harness`]'s virtual clock and in-memory duplex transport: a
//! hand-written "device" loop plays the far end of the wire, so these tests
//! exercise the whole worker loop without a real serial port or socket.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use hantas_harness::{in_memory_pair, InMemoryTransport, VirtualClock};
use hantas_pipeline::{ErrorKind, Pipeline, PipelineConfig, WireKind};
use hantas_proto::FunctionCode;
use hantas_transport::Transport;
use tokio::{sync::oneshot, time::timeout};

/// Parses one MBAP request frame and crafts the matching reply: echoes the
/// transaction id and unit id, and for reads returns `count` zeroed
/// registers; for writes, echoes the address/value (or address/count) back
/// verbatim, as a real Modbus slave does.
fn tcp_device_reply(request: &[u8]) -> Vec<u8> {
    let tid = [request[0], request[1]];
    let uid = request[6];
    let opcode = request[7];
    let body: Vec<u8> = match FunctionCode::from_u8(opcode) {
        Some(FunctionCode::ReadHolding | FunctionCode::ReadInput | FunctionCode::ReadInfo) => {
            let count = u16::from_be_bytes([request[10], request[11]]);
            let byte_count = (count * 2) as u8;
            let mut body = vec![byte_count];
            body.extend(std::iter::repeat(0u8).take(byte_count as usize));
            body
        },
        Some(FunctionCode::WriteSingle | FunctionCode::WriteMulti) => request[8..12].to_vec(),
        _ => Vec::new(),
    };

    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&tid);
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&((2 + body.len()) as u16).to_be_bytes());
    frame.push(uid);
    frame.push(opcode);
    frame.extend_from_slice(&body);
    frame
}

/// Plays the device side of the wire: reads one request at a time and
/// echoes a reply, until its end of the duplex pair is dropped. Requests are
/// always answered one at a time (the pipeline only ever has one active
/// request in flight), so a single `recv`/`send` pair per iteration is
/// enough.
async fn run_tcp_device(mut device: InMemoryTransport) {
    let mut buf = vec![0u8; 2048];
    loop {
        let Ok(n) = device.recv(&mut buf).await else { break };
        let reply = tcp_device_reply(&buf[..n]);
        if device.send(&reply).await.is_err() {
            break;
        }
    }
}

/// Registers a one-shot "connected" signal on `pipeline`'s
/// `on_connection_changed` channel, firing only on the first `true`.
fn connected_signal<C: hantas_pipeline::Clock>(pipeline: &Pipeline<C>) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    pipeline.callbacks().on_connection_changed(move |connected| {
        if connected {
            if let Some(tx) = tx.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
                let _ = tx.send(());
            }
        }
    });
    rx
}

#[tokio::test]
async fn s1_connect_handshake_completes_over_tcp() {
    let (client_transport, device_transport) = in_memory_pair(4096, 1);
    tokio::spawn(run_tcp_device(device_transport));

    let clock = VirtualClock::new();
    let pipeline =
        Pipeline::open(Box::new(client_transport), WireKind::Tcp, 1, PipelineConfig::default(), clock.clone());
    let connected = connected_signal(&pipeline);

    pipeline.connect().await.unwrap();
    clock.advance(Duration::from_millis(20));

    timeout(Duration::from_secs(5), connected).await.unwrap().unwrap();
}

#[tokio::test]
async fn s3_oversized_read_is_chunked_into_multiple_requests() {
    let (client_transport, device_transport) = in_memory_pair(4096, 1);
    tokio::spawn(run_tcp_device(device_transport));

    let clock = VirtualClock::new();
    let mut config = PipelineConfig::default();
    config.send_info_on_connect = false;
    let pipeline = Pipeline::open(Box::new(client_transport), WireKind::Tcp, 1, config, clock.clone());

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = Arc::clone(&received);
    pipeline.callbacks().on_received(move |record, address| {
        received_clone.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((address, record.clone()));
    });

    pipeline.connect().await.unwrap();

    // 300 registers split into blocks of 125 yields 3 chunks (spec.md §6,
    // §4.8: MAX_READ_REGISTERS = 125).
    let accepted = pipeline.read_holding(0, 300, None).await.unwrap();
    assert_eq!(accepted, 3);

    // Each chunk is a full request/response round trip (one active slot at
    // a time), driven by the worker's tick; give it generous headroom
    // rather than pinning the test to an exact tick count.
    for _ in 0..20 {
        clock.advance(Duration::from_millis(20));
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        if received.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len() >= 3 {
            break;
        }
    }

    let seen = received.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    assert_eq!(seen.len(), 3);
    let mut addresses: Vec<u16> = seen.iter().filter_map(|(address, _)| *address).collect();
    addresses.sort_unstable();
    assert_eq!(addresses, vec![0, 125, 250]);
}

#[tokio::test]
async fn s4_closing_clears_the_pending_queue() {
    let (client_transport, device_transport) = in_memory_pair(4096, 1);
    tokio::spawn(run_tcp_device(device_transport));

    let clock = VirtualClock::new();
    let mut config = PipelineConfig::default();
    config.send_info_on_connect = false;
    let pipeline = Pipeline::open(Box::new(client_transport), WireKind::Tcp, 1, config, clock.clone());

    pipeline.connect().await.unwrap();
    // Enqueue a request that nothing will ever answer: the device task is
    // still running, but `close` must clear it out before it is served.
    pipeline.read_holding(0, 10, None).await.unwrap();

    pipeline.close().await;

    // A second close is a documented no-op, not a hang or a panic.
    pipeline.close().await;
}

#[tokio::test]
async fn transport_error_surfaces_on_the_error_channel() {
    let (client_transport, device_transport) = in_memory_pair(64, 1);
    // Drop the device end immediately: the worker's first `recv` resolves
    // with `PeerClosed`.
    drop(device_transport);

    let clock = VirtualClock::new();
    let mut config = PipelineConfig::default();
    config.send_info_on_connect = false;
    let pipeline = Pipeline::open(Box::new(client_transport), WireKind::Tcp, 1, config, clock.clone());

    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = Arc::clone(&errors);
    pipeline.callbacks().on_error(move |kind, detail| {
        errors_clone.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((kind, detail.to_string()));
    });

    pipeline.connect().await.unwrap();
    pipeline.write_single(0, 1, false).await.unwrap();
    clock.advance(Duration::from_millis(20));
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let seen = errors.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    assert!(seen.iter().any(|(kind, _)| *kind == ErrorKind::Transport));
}
