// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Vega Gateway
//!
//! The ground-side peer of the Vega telemetry link: reads the node's byte
//! stream off a serial link, correlates replies with the client requests
//! that caused them, keeps an in-memory history of received telemetry, and
//! serves the client operation set.
//!
//! ## Modules
//!
//! - [`engine`]: frame dispatch, client operations, timeout sweeping
//! - [`correlation`]: id-keyed pending-request table
//! - [`telemetry`]: ordered in-memory telemetry history
//! - [`reassembly`]: splitting the serial stream into frames and debug lines
//! - [`command`]: the typed client operation set
//! - [`client`]: the client-session delivery seam
//!
//! Socket plumbing stays outside: a serial-reader loop drives
//! [`GatewayEngine::feed`], client sessions call
//! [`GatewayEngine::execute`], and results come back through
//! [`client::ClientSink`].

pub mod client;
pub mod command;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod reassembly;
pub mod telemetry;

pub use client::{ClientRef, ClientSink, MemoryClient};
pub use command::ClientCommand;
pub use correlation::{
    CorrelationTable, PendingRequest, ReplyKind, DEFAULT_REQUEST_TIMEOUT, MAX_PENDING,
};
pub use engine::{
    format_timestamp, spawn_sweeper, GatewayEngine, SweeperHandle, RECENT_WINDOW_SECS,
};
pub use error::{GatewayError, Result};
pub use reassembly::{InboundEvent, StreamReassembler};
pub use telemetry::TelemetryStore;
