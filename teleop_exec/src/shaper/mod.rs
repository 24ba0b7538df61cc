//! # Signal shaper module
//!
//! Converts raw joystick axes into bounded actuator commands. Each cycle the shaper applies, in
//! order:
//!
//! 1. A deadzone to each axis,
//! 2. The steering and speed gains. Steering is the negated left pad x axis times the gain, so a
//!    rightward input (positive x) yields a rightward (negative) steering command,
//! 3. Exponential smoothing against the previous cycle's output,
//! 4. The safety override, forcing zero output unless armed,
//! 5. Hard limits on both channels.
//!
//! The shaper is stateless, the previous output is supplied by the caller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;

use serde::Serialize;
use util::maths::clamp;

use crate::input_state::InputSnapshot;
use crate::safety::SafetyState;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Absolute steering limit.
///
/// Units: radians
pub const STEERING_LIMIT_RAD: f64 = 1.2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A pair of actuator commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CommandOutput {
    /// Units: meters/second
    pub throttle: f64,

    /// Units: radians
    pub steering: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply a deadzone to an axis value.
///
/// Values with a magnitude below `dz` give exactly zero, all others are limited to [-1, 1].
pub fn deadzone(value: f64, dz: f64) -> f64 {
    if value.abs() < dz {
        0.0
    } else {
        clamp(&value, &-1.0, &1.0)
    }
}

/// Compute the unsmoothed commands for the given input.
pub fn commands(input: &InputSnapshot) -> CommandOutput {
    let p = &input.params;

    CommandOutput {
        throttle: p.max_speed * deadzone(input.right.y, p.deadzone),
        steering: -p.steer_gain * deadzone(input.left.x, p.deadzone),
    }
}

/// Compute this cycle's output.
///
/// `prev` is the output of the last cycle and seeds the smoothing filter.
pub fn shape(input: &InputSnapshot, safety: SafetyState, prev: CommandOutput) -> CommandOutput {
    let p = &input.params;
    let cmd = commands(input);

    // Smoothing
    let alpha = clamp(&(1.0 - p.smoothing), &0.0, &1.0);
    let mut out = CommandOutput {
        throttle: (1.0 - alpha) * prev.throttle + alpha * cmd.throttle,
        steering: (1.0 - alpha) * prev.steering + alpha * cmd.steering,
    };

    // Safety override
    if !safety.is_armed() {
        out = CommandOutput::default();
    }

    // Limits
    out.throttle = clamp(&out.throttle, &-p.max_speed, &p.max_speed);
    out.steering = clamp(&out.steering, &-STEERING_LIMIT_RAD, &STEERING_LIMIT_RAD);

    out
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
