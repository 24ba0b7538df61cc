//! # Telemetry module
//!
//! Telemetry packets are sent to every connected teleoperation client once per control cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry packet that is output by the control executable.
///
/// Serialises as `{"type": "telemetry", "battery_pct": ..., ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "telemetry")]
pub struct TmPacket {
    /// Battery state of charge, 0 to 100.
    pub battery_pct: f64,

    /// Measured vehicle speed.
    ///
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

    /// True if commands are reaching the actuators.
    pub armed: bool,

    /// True if the emergency stop is active.
    pub estop: bool,

    /// Time the packet was produced, in seconds since the unix epoch.
    pub ts: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TmPacket {
    /// Serialise the packet into the JSON wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a packet from the JSON wire format.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
