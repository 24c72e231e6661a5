// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Node-side protocol engine
//!
//! Receives frames from the gateway, dispatches them to handlers, and
//! produces replies into the shared send queue. The sampling path feeds
//! readings in through [`NodeEngine::ingest`]; beacons and events leave as
//! unsolicited frames with id `0xFF`.
//!
//! The engine owns no threads and no serial port. The integration layer is
//! expected to run a receive loop calling [`NodeEngine::handle_frame`], a
//! transmit loop draining the queue into the link, a sampling loop paced by
//! [`NodeEngine::sample_interval`], and a beacon tick every
//! [`BEACON_PERIOD`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};
use vega::{
    ChecksumMode, Frame, Lane, PacketType, SendQueue, SensorRecord, SyncedClock, WallClock,
    UNSOLICITED_ID,
};

use crate::config::{percentage_in_range, ThresholdConfig, ThresholdUpdate};
use crate::error::NodeError;
use crate::log::{event::EventLog, sensor::SensorLog, ExtractStatus};
use crate::mode::{ModeMachine, SensorReading};
use crate::settings::ThresholdStore;

/// Cadence of unsolicited beacon frames
pub const BEACON_PERIOD: Duration = Duration::from_secs(6);

/// Upper bound on records per log reply stream
pub const MAX_LOG_ENTRIES: usize = 10;

/// Engine lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the gateway to provide the wall clock
    AwaitingTime,
    /// Serving the full dispatch table
    Running,
}

/// The node peer's state machine
pub struct NodeEngine {
    clock: Arc<SyncedClock>,
    queue: Arc<SendQueue>,
    settings: ThresholdStore,
    machine: Mutex<ModeMachine>,
    sensor_log: SensorLog,
    event_log: EventLog,
    latest: Mutex<Option<SensorRecord>>,
    phase: Mutex<Phase>,
    checksum: ChecksumMode,
}

impl NodeEngine {
    /// Open an engine with its persistent stores under `data_dir`
    ///
    /// Creates `sensor/` and `events/` log directories and a
    /// `thresholds.json` settings file (with defaults on first boot).
    pub fn open(
        data_dir: impl Into<PathBuf>,
        queue: Arc<SendQueue>,
        clock: Arc<SyncedClock>,
    ) -> Result<Self, NodeError> {
        let data_dir = data_dir.into();
        let settings = ThresholdStore::open(data_dir.join("thresholds.json"))?;
        let sensor_log = SensorLog::open(data_dir.join("sensor"))?;
        let event_log = EventLog::open(data_dir.join("events"))?;
        let machine = ModeMachine::new(settings.get());

        Ok(Self {
            clock,
            queue,
            settings,
            machine: Mutex::new(machine),
            sensor_log,
            event_log,
            latest: Mutex::new(None),
            phase: Mutex::new(Phase::AwaitingTime),
            checksum: ChecksumMode::Legacy,
        })
    }

    /// Switch both codec directions to the given checksum mode
    pub fn with_checksum(mut self, mode: ChecksumMode) -> Self {
        self.checksum = mode;
        self
    }

    fn machine(&self) -> MutexGuard<'_, ModeMachine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // Boot
    // ------------------------------------------------------------------

    /// Ask the gateway for the wall clock
    pub fn request_time(&self) {
        self.send(
            Lane::High,
            &Frame::empty(PacketType::ClockRequest, UNSOLICITED_ID),
        );
    }

    /// Block until the clock is synchronized or `timeout` elapses
    pub fn wait_time_sync(&self, timeout: Duration) -> bool {
        self.clock.wait_synced(timeout)
    }

    /// Whether the engine has left the boot handshake
    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    /// Decode and dispatch one inbound frame
    ///
    /// Malformed frames are dropped without a protocol-level reply; invalid
    /// handler payloads produce a `Nack`.
    pub fn handle_frame(&self, bytes: &[u8]) {
        let frame = match Frame::decode_with(bytes, self.checksum) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping malformed frame");
                return;
            }
        };

        let kind = frame.kind();
        if self.phase() == Phase::AwaitingTime && kind != Some(PacketType::SetClock) {
            debug!(?kind, "frame ignored while awaiting time sync");
            return;
        }

        match kind {
            Some(PacketType::SetClock) => self.on_set_clock(&frame),
            Some(PacketType::UpdateMinTemp) => {
                self.on_percentage_update(&frame, ThresholdUpdate::MinTemp)
            }
            Some(PacketType::UpdateMaxTemp) => {
                self.on_percentage_update(&frame, ThresholdUpdate::MaxTemp)
            }
            Some(PacketType::UpdateHumidity) => {
                self.on_percentage_update(&frame, ThresholdUpdate::MinHumidity)
            }
            Some(PacketType::UpdateLight) => {
                self.on_percentage_update(&frame, ThresholdUpdate::MinLight)
            }
            Some(PacketType::UpdateVoltage) => self.on_voltage_update(&frame),
            Some(PacketType::SensorLogRequest) => self.on_sensor_log_request(&frame),
            Some(PacketType::EventLogRequest) => self.on_event_log_request(&frame),
            Some(PacketType::TimeQuery) => self.on_time_query(&frame),
            _ => debug!(packet_type = frame.packet_type, "unhandled packet type"),
        }
    }

    fn on_set_clock(&self, frame: &Frame) {
        let Some(epoch) = parse_u32(&frame.payload) else {
            self.send_nack(frame.id);
            return;
        };
        self.clock.set(epoch);
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = Phase::Running;
        info!(epoch, "wall clock synchronized");
        self.send_ack(frame.id);
    }

    fn on_percentage_update(&self, frame: &Frame, make: fn(u8) -> ThresholdUpdate) {
        let Some(&value) = frame.payload.first() else {
            self.send_nack(frame.id);
            return;
        };
        if !percentage_in_range(value) {
            debug!(value, "threshold update out of range");
            self.send_nack(frame.id);
            return;
        }
        self.apply_update(frame.id, make(value));
    }

    fn on_voltage_update(&self, frame: &Frame) {
        let Some(raw) = parse_u32(&frame.payload) else {
            self.send_nack(frame.id);
            return;
        };
        self.apply_update(frame.id, ThresholdUpdate::SafeVoltage(f32::from_bits(raw)));
    }

    fn apply_update(&self, id: u8, update: ThresholdUpdate) {
        self.machine().apply(update);
        if let Err(err) = self.settings.apply(update) {
            warn!(%err, "threshold persist failed");
        }
        info!(?update, "threshold updated");
        self.send_ack(id);
    }

    fn on_sensor_log_request(&self, frame: &Frame) {
        let Some((lo, hi)) = parse_range(&frame.payload) else {
            self.send_nack(frame.id);
            return;
        };
        match self.sensor_log.extract(lo, hi, MAX_LOG_ENTRIES) {
            Ok(extraction) => {
                info!(count = extraction.records.len(), "extracted sensor records");
                for record in &extraction.records {
                    self.send(
                        Lane::Low,
                        &Frame::new(PacketType::SensorLog, frame.id, record.to_payload()),
                    );
                }
                let truncated = u8::from(extraction.status == ExtractStatus::Partial);
                self.send(
                    Lane::Low,
                    &Frame::new(PacketType::SensorLogEnd, frame.id, vec![truncated]),
                );
            }
            Err(err) => {
                debug!(%err, "sensor extraction failed");
                self.send_nack(frame.id);
            }
        }
    }

    fn on_event_log_request(&self, frame: &Frame) {
        let Some((lo, hi)) = parse_range(&frame.payload) else {
            self.send_nack(frame.id);
            return;
        };
        match self.event_log.extract(lo, hi, MAX_LOG_ENTRIES) {
            Ok(extraction) => {
                info!(count = extraction.records.len(), "extracted event records");
                for record in &extraction.records {
                    self.send(
                        Lane::Low,
                        &Frame::new(PacketType::EventLog, frame.id, record.to_payload()),
                    );
                }
                self.send(Lane::Low, &Frame::empty(PacketType::EventLogEnd, frame.id));
            }
            Err(err) => {
                debug!(%err, "event extraction failed");
                self.send_nack(frame.id);
            }
        }
    }

    fn on_time_query(&self, frame: &Frame) {
        let now = self.clock.now();
        self.send(
            Lane::Low,
            &Frame::new(PacketType::TimeReport, frame.id, now.to_le_bytes().to_vec()),
        );
    }

    // ------------------------------------------------------------------
    // Sampling path
    // ------------------------------------------------------------------

    /// Feed one sensor reading through the mode machine and log stores
    ///
    /// Stamps the reading with the synced clock, publishes it as the latest
    /// snapshot, appends it to the sensor log, and on a mode transition
    /// appends the event and emits an `Event` frame. Log-write failures are
    /// reported and the record dropped; the sampler keeps running.
    pub fn ingest(&self, reading: SensorReading) -> SensorRecord {
        let timestamp = self.clock.now();
        let (record, event) = self.machine().observe(&reading, timestamp);

        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(record);

        if let Err(err) = self.sensor_log.append(&record) {
            warn!(%err, "sensor record dropped");
        }

        if let Some(event) = event {
            info!(event = %event.event, timestamp = event.timestamp, "mode transition");
            if let Err(err) = self.event_log.append(&event) {
                warn!(%err, "event record dropped");
            }
            self.send(
                Lane::Medium,
                &Frame::new(PacketType::Event, UNSOLICITED_ID, event.to_payload()),
            );
        }
        record
    }

    /// Emit a beacon with the latest snapshot; false before the first sample
    pub fn emit_beacon(&self) -> bool {
        let latest = *self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = latest else {
            return false;
        };
        self.send(
            Lane::High,
            &Frame::new(PacketType::Beacon, UNSOLICITED_ID, record.to_payload()),
        );
        true
    }

    /// Time to wait before the next sample
    pub fn sample_interval(&self) -> Duration {
        self.machine().sample_interval()
    }

    /// The currently published mode
    pub fn mode(&self) -> vega::Mode {
        self.machine().mode()
    }

    /// The latest published sample
    pub fn latest(&self) -> Option<SensorRecord> {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The thresholds in effect
    pub fn thresholds(&self) -> ThresholdConfig {
        self.machine().limits()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    fn send(&self, lane: Lane, frame: &Frame) {
        match frame.encode_with(self.checksum) {
            Ok(bytes) => {
                if let Err(err) = self.queue.enqueue(lane, bytes) {
                    warn!(%err, "outbound frame dropped");
                }
            }
            Err(err) => warn!(%err, "frame encode failed"),
        }
    }

    fn send_ack(&self, id: u8) {
        self.send(Lane::Low, &Frame::empty(PacketType::Ack, id));
    }

    fn send_nack(&self, id: u8) {
        self.send(Lane::Low, &Frame::empty(PacketType::Nack, id));
    }
}

fn parse_u32(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

fn parse_range(payload: &[u8]) -> Option<(u32, u32)> {
    if payload.len() < 8 {
        return None;
    }
    Some((parse_u32(&payload[..4])?, parse_u32(&payload[4..8])?))
}
