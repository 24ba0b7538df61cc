//! Parameters structure for the signal shaper

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use comms_if::tc::ParamsUpdate;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tunable parameters of the signal shaper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaperParams {
    /// Maximum forward/reverse speed.
    ///
    /// Units: meters/second
    pub max_speed: f64,

    /// Gain applied to the left pad's x axis to get the steering angle.
    ///
    /// Units: radians
    pub steer_gain: f64,

    /// Axis magnitude below which an axis reads as zero.
    pub deadzone: f64,

    /// Exponential smoothing factor, 0 disables smoothing, 1 freezes the output.
    pub smoothing: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ShaperParams {
    fn default() -> Self {
        Self {
            max_speed: 0.20,
            steer_gain: 0.50,
            deadzone: 0.06,
            smoothing: 0.35,
        }
    }
}

impl ShaperParams {
    /// Merge a partial update into these parameters.
    ///
    /// Only the fields present in the update are changed, and they are taken as given. The one
    /// exception is `max_speed`, which is floored at zero since it bounds the throttle in both
    /// directions.
    pub fn merge(&mut self, update: &ParamsUpdate) {
        if let Some(v) = update.max_speed {
            self.max_speed = v.max(0.0);
        }
        if let Some(v) = update.steer_gain {
            self.steer_gain = v;
        }
        if let Some(v) = update.deadzone {
            self.deadzone = v;
        }
        if let Some(v) = update.smoothing {
            self.smoothing = v;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_merge_partial() {
        let mut p = ShaperParams::default();

        p.merge(&ParamsUpdate {
            steer_gain: Some(0.8),
            ..Default::default()
        });

        assert_eq!(p.steer_gain, 0.8);
        assert_eq!(p.max_speed, 0.20);
        assert_eq!(p.deadzone, 0.06);
        assert_eq!(p.smoothing, 0.35);
    }

    #[test]
    fn test_merge_takes_values_as_given() {
        let mut p = ShaperParams::default();

        p.merge(&ParamsUpdate {
            max_speed: Some(5.0),
            steer_gain: Some(2.0),
            deadzone: Some(0.9),
            smoothing: Some(1.5),
        });

        assert_eq!(p.max_speed, 5.0);
        assert_eq!(p.steer_gain, 2.0);
        assert_eq!(p.deadzone, 0.9);
        assert_eq!(p.smoothing, 1.5);

        p.merge(&ParamsUpdate {
            max_speed: Some(-1.0),
            steer_gain: Some(-0.5),
            ..Default::default()
        });

        assert_eq!(p.max_speed, 0.0);
        assert_eq!(p.steer_gain, -0.5);
    }

    #[test]
    fn test_toml_defaults() {
        let p: ShaperParams = util::params::from_str("max_speed = 0.4").unwrap();

        assert_eq!(p.max_speed, 0.4);
        assert_eq!(p.steer_gain, 0.50);
    }
}
