//! Simulated vehicle
//!
//! A first order model of the vehicle: the speed tracks the throttle demand with a time constant,
//! the battery's open circuit voltage drains slowly and the terminal voltage sags with speed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Instant;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use comms_if::eqpt::mech::{MechDems, MechSensData};
use util::maths::clamp;

use super::{Actuator, ActuatorError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Time constant of the speed response.
    ///
    /// Units: seconds
    pub tau_s: f64,

    /// Open circuit battery voltage at startup.
    ///
    /// Units: volts
    pub initial_voltage_v: f64,

    /// Rate at which the open circuit voltage falls.
    ///
    /// Units: volts/second
    pub drain_v_per_s: f64,

    /// Drop in terminal voltage per unit of speed.
    ///
    /// Units: volts/(meters/second)
    pub sag_v_per_ms: f64,

    /// Lowest voltage the battery will report.
    ///
    /// Units: volts
    pub min_voltage_v: f64,
}

/// The simulated vehicle.
#[derive(Debug)]
pub struct SimActuator {
    params: SimParams,

    speed_ms: f64,

    open_circuit_v: f64,

    last_step: Option<Instant>,

    released: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            tau_s: 0.3,
            initial_voltage_v: 12.3,
            drain_v_per_s: 0.0005,
            sag_v_per_ms: 0.8,
            min_voltage_v: 10.0,
        }
    }
}

impl SimActuator {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            speed_ms: 0.0,
            open_circuit_v: params.initial_voltage_v,
            last_step: None,
            released: false,
        }
    }

    /// Advance the model by `dt_s` seconds under the given demands.
    pub fn step(&mut self, dems: &MechDems, dt_s: f64) -> MechSensData {
        let dt_s = dt_s.max(0.0);

        // Speed response
        if self.params.tau_s > 0.0 {
            let k = 1.0 - (-dt_s / self.params.tau_s).exp();
            self.speed_ms += (dems.throttle_ms - self.speed_ms) * k;
        } else {
            self.speed_ms = dems.throttle_ms;
        }

        // Battery
        self.open_circuit_v = (self.open_circuit_v - self.params.drain_v_per_s * dt_s)
            .max(self.params.min_voltage_v);

        self.sens_data()
    }

    /// Latest sensor data without advancing the model.
    pub fn sens_data(&self) -> MechSensData {
        let v = self.open_circuit_v - self.params.sag_v_per_ms * self.speed_ms.abs();

        MechSensData {
            battery_voltage_v: clamp(&v, &self.params.min_voltage_v, &self.open_circuit_v),
            speed_ms: self.speed_ms,
        }
    }

    /// True if the vehicle has been shut down.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Take the vehicle back after a shutdown.
    pub fn acquire(&mut self) {
        if self.released {
            info!("Simulated vehicle re-acquired");
        }
        self.released = false;
        self.last_step = None;
    }
}

impl Actuator for SimActuator {
    fn read_write(&mut self, dems: &MechDems) -> Result<MechSensData, ActuatorError> {
        if self.released {
            return Err(ActuatorError::Released);
        }

        let now = Instant::now();
        let dt_s = match self.last_step {
            Some(t) => now.duration_since(t).as_secs_f64(),
            None => 0.0,
        };
        self.last_step = Some(now);

        Ok(self.step(dems, dt_s))
    }

    fn shutdown(&mut self) -> Result<(), ActuatorError> {
        if !self.released {
            // Stopping the motors brings the vehicle to rest
            self.speed_ms = 0.0;
            self.released = true;
            debug!("Simulated vehicle released");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn forward(throttle_ms: f64) -> MechDems {
        MechDems {
            throttle_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_speed_response() {
        let mut sim = SimActuator::new(SimParams::default());

        // One time constant gets ~63% of the way
        let sens = sim.step(&forward(0.2), 0.3);
        assert!((sens.speed_ms - 0.2 * (1.0 - (-1.0f64).exp())).abs() < 1e-9);

        // Long enough and it settles
        for _ in 0..100 {
            sim.step(&forward(0.2), 0.1);
        }
        assert!((sim.sens_data().speed_ms - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_voltage_sags_under_load() {
        let mut sim = SimActuator::new(SimParams::default());

        let idle = sim.step(&forward(0.0), 0.0).battery_voltage_v;
        for _ in 0..100 {
            sim.step(&forward(0.5), 0.1);
        }
        let loaded = sim.sens_data().battery_voltage_v;

        assert_eq!(idle, 12.3);
        assert!(loaded < idle);
        assert!(loaded >= SimParams::default().min_voltage_v);
    }

    #[test]
    fn test_released() {
        let mut sim = SimActuator::new(SimParams::default());

        assert!(sim.read_write(&forward(0.1)).is_ok());
        sim.shutdown().unwrap();

        assert!(sim.is_released());
        assert!(matches!(
            sim.read_write(&forward(0.1)),
            Err(ActuatorError::Released)
        ));

        sim.acquire();
        assert!(sim.read_write(&forward(0.1)).is_ok());
    }
}
