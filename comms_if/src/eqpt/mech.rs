//! # Mechanisms Equipment Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of indicator lights on the vehicle.
pub const NUM_INDICATORS: usize = 8;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent to the mechanisms
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct MechDems {
    /// The demanded vehicle speed, positive forwards.
    ///
    /// Units: meters/second
    pub throttle_ms: f64,

    /// The demanded steering angle.
    ///
    /// Units: radians
    pub steering_rad: f64,

    /// Indicator light states.
    pub indicators: [bool; NUM_INDICATORS],
}

/// Sensor data returned by the mechanisms after each demand
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct MechSensData {
    /// Battery terminal voltage.
    ///
    /// Units: volts
    pub battery_voltage_v: f64,

    /// Measured vehicle speed from the motor tachometer.
    ///
    /// Units: meters/second
    pub speed_ms: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A request made by the MechClient to the MechServer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum MechRequest {
    /// Actuate the given demands and return the latest sensor data.
    Demands(MechDems),

    /// Stop all actuators and release the hardware.
    Shutdown,
}

/// Response from the mechanisms server based on the request sent by the client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum MechResponse {
    /// Demands were valid and have been executed, with the sensor data read after actuation
    DemsOk(MechSensData),

    /// Demands were invalid and have been rejected
    DemsInvalid,

    /// Equipment is invalid so demands cannot be actuated
    EqptInvalid,

    /// The hardware has been stopped and released
    ShutdownOk,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl MechDems {
    /// Determine if the demands can be actuated (i.e. contain only finite values).
    pub fn is_valid(&self) -> bool {
        self.throttle_ms.is_finite() && self.steering_rad.is_finite()
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(MechDems::default().is_valid());

        let dems = MechDems {
            throttle_ms: std::f64::NAN,
            ..Default::default()
        };
        assert!(!dems.is_valid());

        let dems = MechDems {
            steering_rad: std::f64::INFINITY,
            ..Default::default()
        };
        assert!(!dems.is_valid());
    }
}
