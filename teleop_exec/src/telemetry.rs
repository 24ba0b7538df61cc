//! # Telemetry record
//!
//! One record is produced per control cycle and is both archived and broadcast.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};

use comms_if::tm::TmPacket;
use util::time::timestamp_seconds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State of the vehicle at the end of a control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,

    /// Battery state of charge, 0 to 100.
    pub battery_pct: f64,

    /// Units: meters/second
    pub speed_mps: f64,

    /// Commanded throttle.
    ///
    /// Units: meters/second
    pub throttle: f64,

    /// Commanded steering.
    ///
    /// Units: radians
    pub steering: f64,

    pub armed: bool,

    pub estop: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TelemetryRecord {
    /// Build the wire packet for this record.
    pub fn to_packet(&self) -> TmPacket {
        TmPacket {
            battery_pct: self.battery_pct,
            speed_mps: self.speed_mps,
            throttle: self.throttle,
            steering: self.steering,
            armed: self.armed,
            estop: self.estop,
            ts: timestamp_seconds(&self.timestamp),
        }
    }
}
