//! # Mechanisms Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use teleop_lib::actuator::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MechExecParams {

    /// Endpoint for the demands socket
    pub demands_endpoint: String,

    /// Time without a request after which the vehicle is stopped.
    ///
    /// Units: milliseconds
    pub safe_timeout_ms: i32,

    /// Parameters of the vehicle model behind the server
    pub sim: SimParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MechExecParams {
    fn default() -> Self {
        Self {
            demands_endpoint: String::from("tcp://*:8010"),
            safe_timeout_ms: 200,
            sim: SimParams::default(),
        }
    }
}
