//! # Telemetry log
//!
//! Persists one CSV row per control cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::Path;
use chrono::Local;
use serde::Serialize;

use util::archive::{ArchiveError, Archiver};

use crate::telemetry::TelemetryRecord;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the timestamp column.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Column names, in the order of the fields of [`Row`].
const HEADER: [&str; 7] = [
    "Timestamp",
    "LinearSpeed_mps",
    "Battery_pct",
    "Throttle_cmd",
    "Steering_cmd",
    "Armed",
    "EStop",
];

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Destination for telemetry records.
pub trait TelemetryLog: Send {
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// CSV telemetry log.
pub struct CsvTelemLog {
    arch: Archiver,
}

/// A row of the CSV log.
#[derive(Serialize)]
struct Row {
    timestamp: String,
    speed_mps: f64,
    battery_pct: f64,
    throttle: f64,
    steering: f64,
    armed: u8,
    estop: u8,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CsvTelemLog {
    /// Create the log at the given path, truncating any existing file, and write the header.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        Ok(Self {
            arch: Archiver::from_path(path, &HEADER)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.arch.path()
    }
}

impl TelemetryLog for CsvTelemLog {
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), ArchiveError> {
        self.arch.serialise(Row::from(record))
    }
}

impl From<&TelemetryRecord> for Row {
    fn from(r: &TelemetryRecord) -> Self {
        Self {
            timestamp: r
                .timestamp
                .with_timezone(&Local)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            speed_mps: r.speed_mps,
            battery_pct: r.battery_pct,
            throttle: r.throttle,
            steering: r.steering,
            armed: r.armed as u8,
            estop: r.estop as u8,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
