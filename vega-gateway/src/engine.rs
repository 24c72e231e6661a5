// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Gateway-side protocol engine
//!
//! Bridges the node's serial link to many concurrent clients. Inbound
//! bytes flow through the stream reassembler into the frame dispatcher;
//! outbound client operations allocate a correlation id, register with the
//! pending-request table, and go out as frames. Unsolicited node traffic
//! (beacons, events, the boot-time clock request) is handled without
//! touching the table.
//!
//! The serial-reader thread, the TCP acceptor and the per-client sockets
//! live outside this crate; they drive [`GatewayEngine::feed`] and
//! [`GatewayEngine::execute`] and receive text through
//! [`ClientSink`](crate::client::ClientSink).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{Local, LocalResult, TimeZone};
use tracing::{debug, info, warn};
use vega::{
    ChecksumMode, EventRecord, Frame, IdAllocator, Link, PacketType, SensorRecord, SystemClock,
    WallClock, UNSOLICITED_ID,
};

use crate::client::ClientRef;
use crate::command::ClientCommand;
use crate::correlation::{
    CorrelationTable, PendingRequest, ReplyKind, DEFAULT_REQUEST_TIMEOUT, MAX_PENDING,
};
use crate::error::GatewayError;
use crate::reassembly::{InboundEvent, StreamReassembler};
use crate::telemetry::TelemetryStore;

/// Trailing window, in seconds, served by the recent-data operation
pub const RECENT_WINDOW_SECS: u32 = 50;

/// The gateway peer's state machine
pub struct GatewayEngine {
    link: Mutex<Box<dyn Link>>,
    ids: IdAllocator,
    table: CorrelationTable,
    telemetry: TelemetryStore,
    latest: Mutex<Option<SensorRecord>>,
    reassembler: Mutex<StreamReassembler>,
    clock: Box<dyn WallClock>,
    request_timeout: Duration,
    checksum: ChecksumMode,
}

impl GatewayEngine {
    /// Create an engine writing to the given link
    pub fn new(link: Box<dyn Link>) -> Self {
        Self {
            link: Mutex::new(link),
            ids: IdAllocator::new(),
            table: CorrelationTable::new(),
            telemetry: TelemetryStore::new(),
            latest: Mutex::new(None),
            reassembler: Mutex::new(StreamReassembler::new()),
            clock: Box::new(SystemClock),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            checksum: ChecksumMode::Legacy,
        }
    }

    /// Replace the wall-clock source (tests, replay)
    pub fn with_clock(mut self, clock: Box<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the per-request deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Switch both codec directions to the given checksum mode
    pub fn with_checksum(mut self, mode: ChecksumMode) -> Self {
        self.checksum = mode;
        self
    }

    /// Replace the id allocator (deterministic tests)
    pub fn with_id_allocator(mut self, ids: IdAllocator) -> Self {
        self.ids = ids;
        self
    }

    // ------------------------------------------------------------------
    // Inbound path
    // ------------------------------------------------------------------

    /// Feed bytes read from the link
    pub fn feed(&self, bytes: &[u8]) {
        let events = self
            .reassembler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .feed(bytes);
        for event in events {
            match event {
                InboundEvent::DebugLine(line) => {
                    if !line.is_empty() {
                        info!(%line, "node debug");
                    }
                }
                InboundEvent::Frame(frame) => self.handle_frame(&frame),
            }
        }
    }

    fn handle_frame(&self, bytes: &[u8]) {
        let frame = match Frame::decode_with(bytes, self.checksum) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping malformed frame");
                return;
            }
        };

        match frame.kind() {
            Some(PacketType::Beacon) => self.on_beacon(&frame),
            Some(PacketType::Event) => self.on_event(&frame),
            Some(PacketType::SensorLog) => self.on_sensor_log(&frame),
            Some(PacketType::SensorLogEnd) => self.on_sensor_log_end(&frame),
            Some(PacketType::EventLog) => self.on_event_log(&frame),
            Some(PacketType::EventLogEnd) => self.on_event_log_end(&frame),
            Some(PacketType::Ack) => self.on_ack(&frame),
            Some(PacketType::Nack) => self.on_nack(&frame),
            Some(PacketType::TimeReport) => self.on_time_report(&frame),
            Some(PacketType::ClockRequest) => self.on_clock_request(&frame),
            _ => warn!(packet_type = frame.packet_type, "unhandled packet type"),
        }
    }

    fn on_beacon(&self, frame: &Frame) {
        match SensorRecord::from_payload(&frame.payload) {
            Ok(record) => {
                info!(mode = %record.mode, timestamp = record.timestamp, "beacon");
                *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(record);
            }
            Err(err) => warn!(%err, "malformed beacon payload"),
        }
    }

    fn on_event(&self, frame: &Frame) {
        match EventRecord::from_payload(&frame.payload) {
            Ok(record) => {
                info!(
                    event = %record.event,
                    timestamp = record.timestamp,
                    local = %format_timestamp(record.timestamp),
                    "node event"
                );
            }
            Err(err) => warn!(%err, "malformed event payload"),
        }
    }

    fn on_sensor_log(&self, frame: &Frame) {
        let record = match SensorRecord::from_payload(&frame.payload) {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, "malformed sensor log payload");
                return;
            }
        };
        self.telemetry.insert(record);

        // Copy the client handle out, deliver after the table lock is gone.
        match self.table.stream_append(frame.id, &frame.payload) {
            Some(client) => {
                client.deliver(&format!("\nSensor log data:\n{}", render_sensor(&record)));
            }
            None => debug!(id = frame.id, "sensor log frame with no pending request"),
        }
    }

    fn on_sensor_log_end(&self, frame: &Frame) {
        match self.table.complete(frame.id) {
            Some(request) => {
                debug!(id = frame.id, streamed = request.partial.len(), "log stream complete");
                request.client.deliver("Completed retrieval of sensor logs.");
            }
            None => debug!(id = frame.id, "stream end for unknown id discarded"),
        }
    }

    fn on_event_log(&self, frame: &Frame) {
        let record = match EventRecord::from_payload(&frame.payload) {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, "malformed event log payload");
                return;
            }
        };
        match self.table.stream_append(frame.id, &frame.payload) {
            Some(client) => {
                client.deliver(&format!("\nEvent log data:\n{}", render_event(&record)));
            }
            None => debug!(id = frame.id, "event log frame with no pending request"),
        }
    }

    fn on_event_log_end(&self, frame: &Frame) {
        match self.table.complete(frame.id) {
            Some(request) => request.client.deliver("Completed retrieval of event logs."),
            None => debug!(id = frame.id, "stream end for unknown id discarded"),
        }
    }

    fn on_ack(&self, frame: &Frame) {
        match self.table.complete(frame.id) {
            Some(request) => request.client.deliver("Operation completed successfully."),
            None => debug!(id = frame.id, "ack for unknown id discarded"),
        }
    }

    fn on_nack(&self, frame: &Frame) {
        match self.table.complete(frame.id) {
            Some(request) => request.client.deliver("Request failed. Please try again."),
            None => debug!(id = frame.id, "nack for unknown id discarded"),
        }
    }

    fn on_time_report(&self, frame: &Frame) {
        let Some(bytes) = frame.payload.get(..4) else {
            warn!("malformed time report payload");
            return;
        };
        let timestamp = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        match self.table.complete(frame.id) {
            Some(request) => {
                request
                    .client
                    .deliver(&format!("Current time: {}", format_timestamp(timestamp)));
            }
            None => debug!(id = frame.id, "time report for unknown id discarded"),
        }
    }

    fn on_clock_request(&self, _frame: &Frame) {
        let now = self.clock.now();
        info!(now, "node requested wall clock");
        let reply = Frame::new(
            PacketType::SetClock,
            UNSOLICITED_ID,
            now.to_le_bytes().to_vec(),
        );
        if let Err(err) = self.send_frame(&reply) {
            warn!(%err, "failed to answer clock request");
        }
    }

    // ------------------------------------------------------------------
    // Client operations
    // ------------------------------------------------------------------

    /// Carry out one client operation
    pub fn execute(&self, command: ClientCommand, client: &ClientRef) -> Result<(), GatewayError> {
        match command {
            ClientCommand::GetSensorData => {
                match self.latest() {
                    Some(record) => client.deliver(&render_snapshot(&record)),
                    None => client.deliver("No sensor data available yet. Wait for a beacon."),
                }
                Ok(())
            }
            ClientCommand::GetRecentSensorData => {
                let Some(record) = self.latest().filter(|r| r.timestamp > 0) else {
                    client.deliver("No sensor data available yet. Wait for a beacon.");
                    return Ok(());
                };
                let end = record.timestamp;
                let start = end.saturating_sub(RECENT_WINDOW_SECS);
                self.request_sensor_logs(start, end, client)?;
                client.deliver("Retrieving sensor data from the last minute...");
                Ok(())
            }
            ClientCommand::GetSensorLogs { start, end } => {
                self.request_sensor_logs(start, end, client)?;
                client.deliver(&format!(
                    "Requested logs between {start} and {end}. Processing..."
                ));
                Ok(())
            }
            ClientCommand::GetEventLogs { start, end } => {
                self.request_event_logs(start, end, client)?;
                client.deliver(&format!(
                    "Requested logs between {start} and {end}. Processing..."
                ));
                Ok(())
            }
            ClientCommand::GetCurrentTime => {
                self.request_current_time(client)?;
                Ok(())
            }
            ClientCommand::UpdateMinTemp(value) => self
                .send_update(PacketType::UpdateMinTemp, vec![value], client)
                .map(drop),
            ClientCommand::UpdateMaxTemp(value) => self
                .send_update(PacketType::UpdateMaxTemp, vec![value], client)
                .map(drop),
            ClientCommand::UpdateHumidity(value) => self
                .send_update(PacketType::UpdateHumidity, vec![value], client)
                .map(drop),
            ClientCommand::UpdateLight(value) => self
                .send_update(PacketType::UpdateLight, vec![value], client)
                .map(drop),
            ClientCommand::UpdateVoltage(value) => self
                .send_update(PacketType::UpdateVoltage, value.to_le_bytes().to_vec(), client)
                .map(drop),
            ClientCommand::SetTime(epoch) => self.set_time(epoch, client),
        }
    }

    /// Request stored sensor records; replies stream back to `client`
    pub fn request_sensor_logs(
        &self,
        start: u32,
        end: u32,
        client: &ClientRef,
    ) -> Result<u8, GatewayError> {
        self.originate(
            PacketType::SensorLogRequest,
            range_payload(start, end),
            ReplyKind::LogStream,
            client,
        )
    }

    /// Request stored event records; replies stream back to `client`
    pub fn request_event_logs(
        &self,
        start: u32,
        end: u32,
        client: &ClientRef,
    ) -> Result<u8, GatewayError> {
        self.originate(
            PacketType::EventLogRequest,
            range_payload(start, end),
            ReplyKind::LogStream,
            client,
        )
    }

    /// Ask the node for its current time on behalf of `client`
    pub fn request_current_time(&self, client: &ClientRef) -> Result<u8, GatewayError> {
        self.originate(PacketType::TimeQuery, Vec::new(), ReplyKind::CurrentTime, client)
    }

    fn send_update(
        &self,
        packet_type: PacketType,
        payload: Vec<u8>,
        client: &ClientRef,
    ) -> Result<u8, GatewayError> {
        self.originate(packet_type, payload, ReplyKind::Ack, client)
    }

    fn set_time(&self, epoch: u32, client: &ClientRef) -> Result<(), GatewayError> {
        if self.table.is_full() {
            return Err(GatewayError::IdsExhausted);
        }
        if let Some(latest) = self.latest() {
            if latest.timestamp > 0 && epoch < latest.timestamp {
                client.deliver(&format!(
                    "Cannot set time before the latest telemetry timestamp ({})",
                    latest.timestamp
                ));
                return Ok(());
            }
        }
        // Fire-and-forget: a fresh id, but no table entry awaiting a reply.
        let frame = Frame::new(PacketType::SetClock, self.fresh_id(), epoch.to_le_bytes().to_vec());
        self.send_frame(&frame)?;
        client.deliver(&format!("Set custom time to {}", format_timestamp(epoch)));
        Ok(())
    }

    fn originate(
        &self,
        packet_type: PacketType,
        payload: Vec<u8>,
        expect: ReplyKind,
        client: &ClientRef,
    ) -> Result<u8, GatewayError> {
        if self.table.is_full() {
            return Err(GatewayError::IdsExhausted);
        }
        let id = self.fresh_id();
        self.table.register(PendingRequest::new(
            id,
            Arc::clone(client),
            expect,
            self.request_timeout,
        ))?;

        let frame = Frame::new(packet_type, id, payload);
        if let Err(err) = self.send_frame(&frame) {
            // The request never went out; do not leave a ghost entry.
            self.table.complete(id);
            return Err(err);
        }
        debug!(id, ?packet_type, "request sent");
        Ok(id)
    }

    /// Next id with no pending request attached
    ///
    /// Callers check `is_full` first, so a free id exists within one cycle.
    fn fresh_id(&self) -> u8 {
        let mut id = self.ids.allocate();
        for _ in 0..MAX_PENDING {
            if !self.table.contains(id) {
                break;
            }
            id = self.ids.allocate();
        }
        id
    }

    fn send_frame(&self, frame: &Frame) -> Result<(), GatewayError> {
        let bytes = frame.encode_with(self.checksum)?;
        self.link
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(&bytes)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timeouts and snapshots
    // ------------------------------------------------------------------

    /// Evict expired requests, notifying their clients; returns the count
    pub fn expire_timeouts(&self) -> usize {
        let expired = self.table.sweep(Instant::now());
        let count = expired.len();
        for request in expired {
            warn!(id = request.id, "request timed out");
            request.client.deliver("Request timed out. Please try again.");
        }
        count
    }

    /// Latest beacon snapshot
    pub fn latest(&self) -> Option<SensorRecord> {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The telemetry history
    pub fn telemetry(&self) -> &TelemetryStore {
        &self.telemetry
    }

    /// Number of requests awaiting replies
    pub fn pending_requests(&self) -> usize {
        self.table.len()
    }
}

/// Background thread periodically evicting expired requests
pub struct SweeperHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the timeout sweeper for an engine
pub fn spawn_sweeper(engine: Arc<GatewayEngine>, interval: Duration) -> SweeperHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let handle = std::thread::spawn(move || {
        while !flag.load(Ordering::Relaxed) {
            std::thread::sleep(interval);
            engine.expire_timeouts();
        }
    });
    SweeperHandle {
        stop,
        handle: Some(handle),
    }
}

fn range_payload(start: u32, end: u32) -> Vec<u8> {
    let mut payload = start.to_le_bytes().to_vec();
    payload.extend_from_slice(&end.to_le_bytes());
    payload
}

/// Render a timestamp as host-local calendar time
pub fn format_timestamp(timestamp: u32) -> String {
    match Local.timestamp_opt(i64::from(timestamp), 0) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        _ => format!("@{timestamp}"),
    }
}

fn render_sensor(record: &SensorRecord) -> String {
    format!(
        "Temperature: {}°C\nHumidity: {}%\nLight: {}%\nMode: {}\nVoltage: {:.2}V\nTimestamp: {}\nLocal Time: {}",
        record.temp,
        record.humidity,
        record.light,
        record.mode,
        record.voltage,
        record.timestamp,
        format_timestamp(record.timestamp),
    )
}

fn render_event(record: &EventRecord) -> String {
    format!(
        "Event: {}\nTimestamp: {}\nLocal Time: {}",
        record.event,
        record.timestamp,
        format_timestamp(record.timestamp),
    )
}

fn render_snapshot(record: &SensorRecord) -> String {
    format!(
        "Temperature: {}°C, Humidity: {}%, Light: {}%, Voltage: {:.2}V, Mode: {}",
        record.temp, record.humidity, record.light, record.voltage, record.mode,
    )
}
