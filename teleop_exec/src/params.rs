//! # Teleoperation Executable Parameters
//!
//! This module provides parameters for the teleoperation executable, loaded from
//! `params/teleop_exec.toml`. Every key is optional.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use comms_if::net::NetParams;

use crate::{actuator::SimParams, ctrl_loop::LoopParams, shaper::ShaperParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopExecParams {
    /// Control loop rate and battery calibration
    pub ctrl_loop: LoopParams,

    /// Path of the CSV telemetry log. Relative paths are placed in the session directory.
    pub log_path: PathBuf,

    /// Which actuator the loop drives
    pub actuator: ActuatorKind,

    /// Network endpoints
    pub net: NetParams,

    /// Initial shaper parameters, operators may change these at runtime
    pub shaper: ShaperParams,

    /// Parameters of the simulated vehicle, used with `actuator = "sim"`
    pub sim: SimParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// The in-process simulated vehicle
    Sim,

    /// The mechanisms server
    Mech,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TeleopExecParams {
    fn default() -> Self {
        Self {
            ctrl_loop: LoopParams::default(),
            log_path: PathBuf::from("manual_drive_log.csv"),
            actuator: ActuatorKind::Sim,
            net: NetParams::default(),
            shaper: ShaperParams::default(),
            sim: SimParams::default(),
        }
    }
}

impl std::str::FromStr for ActuatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sim" => Ok(ActuatorKind::Sim),
            "mech" => Ok(ActuatorKind::Mech),
            s => Err(format!("Unknown actuator \"{}\", expected \"sim\" or \"mech\"", s)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_file() {
        let p: TeleopExecParams = util::params::from_str(
            r#"
            actuator = "mech"

            [ctrl_loop]
            rate_hz = 100.0

            [net]
            tm_endpoint = "tcp://*:8001"
            "#,
        )
        .unwrap();

        assert_eq!(p.actuator, ActuatorKind::Mech);
        assert_eq!(p.ctrl_loop.rate_hz, 100.0);
        assert_eq!(p.ctrl_loop.battery_low_v, 10.5);
        assert_eq!(p.net.tm_endpoint.as_deref(), Some("tcp://*:8001"));
        assert_eq!(p.net.tc_endpoint, "tcp://*:8000");
        assert_eq!(p.log_path, PathBuf::from("manual_drive_log.csv"));
        assert_eq!(p.shaper, ShaperParams::default());
    }

    #[test]
    fn test_empty_file() {
        let p: TeleopExecParams = util::params::from_str("").unwrap();
        assert_eq!(p.actuator, ActuatorKind::Sim);
    }

    #[test]
    fn test_actuator_from_str() {
        assert_eq!("sim".parse::<ActuatorKind>(), Ok(ActuatorKind::Sim));
        assert_eq!("mech".parse::<ActuatorKind>(), Ok(ActuatorKind::Mech));
        assert!("servo".parse::<ActuatorKind>().is_err());
    }
}
