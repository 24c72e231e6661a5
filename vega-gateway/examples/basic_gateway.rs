// Vega Gateway - Basic Example
//
// Drives a gateway engine against a scripted node over an in-memory link:
// boot handshake, a beacon, and a sensor log query. The engine writes its
// requests to the link; the scripted node's replies are pumped back in
// through `feed`, exactly as a serial-reader loop would.

use std::sync::Arc;

use vega::{Frame, MemoryLink, Mode, PacketType, SensorRecord, UNSOLICITED_ID};
use vega_gateway::{ClientCommand, ClientRef, GatewayEngine, MemoryClient};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Vega Gateway Basic Example ===\n");

    let (gateway_side, mut node_side) = MemoryLink::pair();
    let engine = GatewayEngine::new(Box::new(gateway_side));

    // The node asks for the wall clock at boot.
    engine.feed(&[0x05, 0x10, 0xFF, 0x00, 0x55]);
    let reply = Frame::decode(&node_side.drain())?;
    println!(
        "Node asked for time; gateway answered with type 0x{:02X}",
        reply.packet_type
    );

    // A beacon arrives and becomes the latest snapshot.
    let beacon = SensorRecord {
        timestamp: 1_700_000_000,
        temp: 24,
        humidity: 55,
        light: 82,
        mode: Mode::Ok,
        voltage: 3.1,
    };
    let frame = Frame::new(PacketType::Beacon, UNSOLICITED_ID, beacon.to_payload());
    engine.feed(&frame.encode()?);
    println!(
        "Latest snapshot timestamp: {:?}\n",
        engine.latest().map(|r| r.timestamp)
    );

    // A client asks for stored logs; the request goes out over the link.
    let client = MemoryClient::new();
    let reference = Arc::clone(&client) as ClientRef;
    engine.execute(
        ClientCommand::GetSensorLogs {
            start: 1_699_999_000,
            end: 1_700_000_000,
        },
        &reference,
    )?;

    let request = Frame::decode(&node_side.drain())?;
    println!("Request went out with id {}", request.id);

    // The scripted node streams two records and an end marker back.
    let mut stream = Vec::new();
    stream.extend_from_slice(b"EXTRACTED data 2\r\n");
    for ts in [1_699_999_100u32, 1_699_999_700] {
        let record = SensorRecord { timestamp: ts, ..beacon };
        let log = Frame::new(PacketType::SensorLog, request.id, record.to_payload());
        stream.extend_from_slice(&log.encode()?);
    }
    let end = Frame::new(PacketType::SensorLogEnd, request.id, vec![1]);
    stream.extend_from_slice(&end.encode()?);
    engine.feed(&stream);

    println!("--- Client transcript ---");
    for message in client.messages() {
        println!("{message}");
    }
    println!("\nTelemetry records held: {}", engine.telemetry().len());

    Ok(())
}
