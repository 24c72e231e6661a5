//! End-to-end scenarios over an in-memory link
//!
//! Wires a real node engine and a real gateway engine back to back and
//! replays the protocol's characteristic flows: the boot time handshake,
//! threshold updates with ack/nack, streamed log queries, and beacon
//! interleaving. The test pumps bytes between the peers the way the
//! transmit loop and serial-reader thread would.

use std::sync::Arc;

use vega::{ChecksumMode, Frame, ManualClock, MemoryLink, PacketType, SendQueue, SyncedClock, WallClock};
use vega_gateway::{ClientCommand, ClientRef, GatewayEngine, MemoryClient};
use vega_node::{NodeEngine, SensorReading};

const HOST_EPOCH: u32 = 0x6600_0000;

struct Bench {
    node: NodeEngine,
    queue: Arc<SendQueue>,
    clock: Arc<SyncedClock>,
    gateway: GatewayEngine,
    node_link: MemoryLink,
    _dir: tempfile::TempDir,
}

impl Bench {
    fn new() -> Self {
        Self::with_checksum(ChecksumMode::Legacy)
    }

    fn with_checksum(mode: ChecksumMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(SendQueue::new());
        let clock = Arc::new(SyncedClock::new());
        let node = NodeEngine::open(dir.path(), Arc::clone(&queue), Arc::clone(&clock))
            .unwrap()
            .with_checksum(mode);

        let (gateway_side, node_side) = MemoryLink::pair();
        let gateway = GatewayEngine::new(Box::new(gateway_side))
            .with_clock(Box::new(ManualClock::new(HOST_EPOCH)))
            .with_checksum(mode);

        Self {
            node,
            queue,
            clock,
            gateway,
            node_link: node_side,
            _dir: dir,
        }
    }

    /// Drain the node's send queue into the gateway, as the transmit loop
    /// and serial reader would.
    fn pump_node_to_gateway(&self) {
        while let Some(frame) = self.queue.try_pop() {
            self.gateway.feed(&frame);
        }
    }

    /// Deliver everything the gateway wrote to the link into the node's
    /// receive path, one frame at a time.
    fn pump_gateway_to_node(&mut self) {
        let bytes = self.node_link.drain();
        for frame in split_frames(&bytes) {
            self.node.handle_frame(&frame);
        }
    }

    fn pump_both(&mut self) {
        self.pump_gateway_to_node();
        self.pump_node_to_gateway();
    }

    fn boot_handshake(&mut self) {
        self.node.request_time();
        self.pump_node_to_gateway(); // ClockRequest reaches the gateway
        self.pump_gateway_to_node(); // SetClock reaches the node
        self.pump_node_to_gateway(); // the node's ack is discarded
    }

    fn client(&self) -> (Arc<MemoryClient>, ClientRef) {
        let client = MemoryClient::new();
        let reference = Arc::clone(&client) as ClientRef;
        (client, reference)
    }

    fn nominal(&self) -> SensorReading {
        SensorReading {
            temp: 25,
            humidity: 50,
            light: 80,
            voltage: 3.0,
        }
    }
}

/// Split a raw byte run into length-delimited frames, the node's receive
/// framing.
fn split_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let len = (bytes[0] as usize).clamp(1, bytes.len());
        frames.push(bytes[..len].to_vec());
        bytes = &bytes[len..];
    }
    frames
}

#[test]
fn boot_handshake_synchronizes_node_clock() {
    let mut bench = Bench::new();
    assert!(!bench.node.is_running());

    bench.boot_handshake();

    assert!(bench.node.is_running());
    assert!(bench.clock.is_synced());
    assert!(bench.clock.now() >= HOST_EPOCH);
    // The ack for the unsolicited time push resolved nothing.
    assert_eq!(bench.gateway.pending_requests(), 0);
}

#[test]
fn threshold_update_rejected_then_accepted() {
    let mut bench = Bench::new();
    bench.boot_handshake();
    let (recorder, reference) = bench.client();

    // An out-of-range humidity value crosses the link and the node nacks.
    bench
        .gateway
        .execute(ClientCommand::UpdateHumidity(150), &reference)
        .unwrap();
    bench.pump_both();
    assert!(recorder.saw("Request failed. Please try again."));
    assert_eq!(bench.node.thresholds().min_humidity, 20);

    // A valid update is applied and acknowledged.
    bench
        .gateway
        .execute(ClientCommand::UpdateHumidity(35), &reference)
        .unwrap();
    bench.pump_both();
    assert!(recorder.saw("Operation completed successfully."));
    assert_eq!(bench.node.thresholds().min_humidity, 35);
    assert_eq!(bench.gateway.pending_requests(), 0);
}

#[test]
fn sensor_log_query_streams_and_completes() {
    let mut bench = Bench::new();
    bench.boot_handshake();

    for ts in [1100u32, 1500, 1900] {
        bench.clock.set(ts);
        bench.node.ingest(bench.nominal());
    }
    bench.pump_node_to_gateway(); // flush the Init event notification

    let (recorder, reference) = bench.client();
    bench
        .gateway
        .execute(ClientCommand::GetSensorLogs { start: 1000, end: 2000 }, &reference)
        .unwrap();
    bench.pump_both();

    let messages = recorder.messages();
    assert_eq!(
        messages.iter().filter(|m| m.contains("Sensor log data:")).count(),
        3
    );
    assert!(recorder.saw("Completed retrieval of sensor logs."));
    assert_eq!(bench.gateway.pending_requests(), 0);

    // The streamed records landed in the gateway's history, queryable
    // without another round trip.
    let held = bench.gateway.telemetry().range(1000, 2000).unwrap();
    let stamps: Vec<u32> = held.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![1100, 1500, 1900]);
}

#[test]
fn log_request_outside_history_fails_cleanly() {
    let mut bench = Bench::new();
    bench.boot_handshake();

    let (recorder, reference) = bench.client();
    bench
        .gateway
        .execute(
            ClientCommand::GetSensorLogs { start: 50_000_000, end: 50_000_100 },
            &reference,
        )
        .unwrap();
    bench.pump_both();

    assert!(recorder.saw("Request failed. Please try again."));
    assert_eq!(bench.gateway.pending_requests(), 0);
}

#[test]
fn beacon_interleaves_with_log_stream() {
    let mut bench = Bench::new();
    bench.boot_handshake();

    bench.clock.set(2000);
    bench.node.ingest(bench.nominal());
    bench.pump_node_to_gateway();

    let (recorder, reference) = bench.client();
    bench
        .gateway
        .execute(ClientCommand::GetSensorLogs { start: 1900, end: 2100 }, &reference)
        .unwrap();
    bench.pump_gateway_to_node();

    // A beacon fires after the stream is queued but overtakes it on the
    // high lane; the client must still see a clean stream.
    bench.node.emit_beacon();
    bench.pump_node_to_gateway();

    assert_eq!(bench.gateway.latest().map(|r| r.timestamp), Some(2000));
    assert!(recorder.saw("Sensor log data:"));
    assert!(recorder.saw("Completed retrieval of sensor logs."));
}

#[test]
fn event_log_query_returns_transitions() {
    let mut bench = Bench::new();
    bench.boot_handshake();

    bench.clock.set(3000);
    bench.node.ingest(bench.nominal()); // Init
    bench.clock.set(3050);
    bench.node.ingest(SensorReading { temp: 50, ..bench.nominal() }); // OkToError
    bench.clock.set(3100);
    bench.node.ingest(bench.nominal()); // ErrorToOk
    bench.pump_node_to_gateway();

    let (recorder, reference) = bench.client();
    bench
        .gateway
        .execute(ClientCommand::GetEventLogs { start: 3000, end: 3200 }, &reference)
        .unwrap();
    bench.pump_both();

    let messages = recorder.messages();
    assert_eq!(
        messages.iter().filter(|m| m.contains("Event log data:")).count(),
        3
    );
    assert!(recorder.saw("Initialization"));
    assert!(recorder.saw("OK to Error"));
    assert!(recorder.saw("Error to OK"));
    assert!(recorder.saw("Completed retrieval of event logs."));
}

#[test]
fn current_time_round_trip() {
    let mut bench = Bench::new();
    bench.boot_handshake();

    let (recorder, reference) = bench.client();
    bench
        .gateway
        .execute(ClientCommand::GetCurrentTime, &reference)
        .unwrap();
    bench.pump_both();

    assert!(recorder.saw("Current time: "));
    assert_eq!(bench.gateway.pending_requests(), 0);
}

#[test]
fn concurrent_requests_resolve_to_their_own_clients() {
    let mut bench = Bench::new();
    bench.boot_handshake();

    bench.clock.set(4000);
    bench.node.ingest(bench.nominal());
    bench.pump_node_to_gateway();

    let (alice, alice_ref) = bench.client();
    let (bob, bob_ref) = bench.client();

    // Two requests in flight over the one link, different ids.
    bench
        .gateway
        .execute(ClientCommand::GetSensorLogs { start: 3900, end: 4100 }, &alice_ref)
        .unwrap();
    bench
        .gateway
        .execute(ClientCommand::UpdateMinTemp(12), &bob_ref)
        .unwrap();
    assert_eq!(bench.gateway.pending_requests(), 2);

    bench.pump_both();

    assert!(alice.saw("Completed retrieval of sensor logs."));
    assert!(!alice.saw("Operation completed successfully."));
    assert!(bob.saw("Operation completed successfully."));
    assert!(!bob.saw("Sensor log data:"));
    assert_eq!(bench.gateway.pending_requests(), 0);
}

#[test]
fn xor_checksum_extension_end_to_end() {
    let mut bench = Bench::with_checksum(ChecksumMode::Xor);
    bench.boot_handshake();
    assert!(bench.node.is_running());

    let (recorder, reference) = bench.client();
    bench
        .gateway
        .execute(ClientCommand::UpdateLight(55), &reference)
        .unwrap();
    bench.pump_both();

    assert!(recorder.saw("Operation completed successfully."));
    assert_eq!(bench.node.thresholds().min_light, 55);
}

#[test]
fn node_debug_lines_reach_the_operator_log_without_breaking_frames() {
    let bench = Bench::new();

    // Raw serial bytes: printf noise around a valid beacon frame.
    let record = vega::SensorRecord {
        timestamp: 7000,
        temp: 20,
        humidity: 40,
        light: 90,
        mode: vega::Mode::Ok,
        voltage: 3.2,
    };
    let mut stream = Vec::new();
    stream.extend_from_slice(b"Setting up System...\r\n");
    stream.extend_from_slice(
        &Frame::new(PacketType::Beacon, vega::UNSOLICITED_ID, record.to_payload())
            .encode()
            .unwrap(),
    );
    stream.extend_from_slice(b"wrote event to File And queue\r\n");
    bench.gateway.feed(&stream);

    assert_eq!(bench.gateway.latest().map(|r| r.timestamp), Some(7000));
}
