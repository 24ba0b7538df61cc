//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications interface. Teleoperation
//! clients send JSON objects with a `"type"` field identifying the command:
//!
//! ```json
//! {"type": "arm"}
//! {"type": "control", "left": {"x": 0.1, "y": 0.0}, "right": {"x": 0.0, "y": 0.8},
//!  "params": {"maxSpeed": 0.2, "steerGain": 0.5, "dead": 0.06, "smooth": 0.35},
//!  "ts": 1700000000000}
//! ```
//!
//! Parsing is deliberately lenient. Numeric fields are coerced from numbers, numeric strings or
//! booleans, and any field which is missing or cannot be coerced is reported as absent so that the
//! receiver can keep its previous value. Only a message that is not a JSON object, or that has no
//! recognised type, fails to parse.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json::{self, json, Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position of one two-axis joystick pad.
///
/// Each component is nominally in [-1, 1] but no range check is applied here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisPair {
    pub x: f64,
    pub y: f64,
}

/// A partial update to the signal shaping parameters.
///
/// Only the fields which are `Some` shall overwrite the receiver's current values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamsUpdate {
    /// Maximum forward/reverse speed.
    ///
    /// Units: meters/second
    pub max_speed: Option<f64>,

    /// Gain applied to the steering pad.
    ///
    /// Units: radians
    pub steer_gain: Option<f64>,

    /// Axis magnitude below which the input is treated as neutral.
    pub deadzone: Option<f64>,

    /// Smoothing factor in [0, 1], higher is smoother.
    pub smoothing: Option<f64>,
}

/// Payload of a control telecommand.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlPayload {
    /// Left pad, used for steering. `None` if the message did not carry it.
    pub left: Option<AxisPair>,

    /// Right pad, used for throttle. `None` if the message did not carry it.
    pub right: Option<AxisPair>,

    /// Parameter changes carried by the message.
    pub params: ParamsUpdate,

    /// Client side timestamp, in milliseconds since the unix epoch.
    pub ts: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the vehicle by a teleoperation client.
#[derive(Debug, Clone, PartialEq)]
pub enum Tc {
    /// Keep-alive, also used by clients to register for telemetry.
    Ping,

    /// Allow commands to reach the actuators.
    Arm,

    /// Stop commanding the actuators.
    Disarm,

    /// Emergency stop.
    EStop,

    /// New joystick positions and/or parameters.
    Control(ControlPayload),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC is not a JSON object")]
    NotAnObject,

    #[error("TC has an invalid type ({0})")]
    InvalidType(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        // Parse the JSON string into a value
        let val: Value = serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)?;

        let obj = match val.as_object() {
            Some(o) => o,
            None => return Err(TcParseError::NotAnObject),
        };

        // Get the type of the TC
        let tc_type = match obj.get("type").and_then(Value::as_str) {
            Some(s) => s,
            None => {
                return Err(TcParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };

        match tc_type {
            "ping" => Ok(Tc::Ping),
            "arm" => Ok(Tc::Arm),
            "disarm" => Ok(Tc::Disarm),
            "estop" => Ok(Tc::EStop),
            "control" => Ok(Tc::Control(ControlPayload::from_json_obj(obj))),
            t => Err(TcParseError::InvalidType(format!(
                "{} is not a recognised TC type",
                t
            ))),
        }
    }

    /// Serialise the TC into the JSON form accepted by `from_json`.
    pub fn to_json(&self) -> String {
        let val = match self {
            Tc::Ping => json!({"type": "ping"}),
            Tc::Arm => json!({"type": "arm"}),
            Tc::Disarm => json!({"type": "disarm"}),
            Tc::EStop => json!({"type": "estop"}),
            Tc::Control(c) => {
                let mut obj = Map::new();
                obj.insert("type".into(), json!("control"));
                if let Some(l) = c.left {
                    obj.insert("left".into(), json!({"x": l.x, "y": l.y}));
                }
                if let Some(r) = c.right {
                    obj.insert("right".into(), json!({"x": r.x, "y": r.y}));
                }

                let mut params = Map::new();
                let keys = [
                    ("maxSpeed", c.params.max_speed),
                    ("steerGain", c.params.steer_gain),
                    ("dead", c.params.deadzone),
                    ("smooth", c.params.smoothing),
                ];
                for (k, v) in keys.iter() {
                    if let Some(v) = v {
                        params.insert((*k).into(), json!(v));
                    }
                }
                if !params.is_empty() {
                    obj.insert("params".into(), Value::Object(params));
                }

                if let Some(ts) = c.ts {
                    obj.insert("ts".into(), json!(ts));
                }

                Value::Object(obj)
            }
        };

        val.to_string()
    }
}

impl ControlPayload {
    fn from_json_obj(obj: &Map<String, Value>) -> Self {
        Self {
            left: obj.get("left").and_then(AxisPair::from_json_val),
            right: obj.get("right").and_then(AxisPair::from_json_val),
            params: obj
                .get("params")
                .map(ParamsUpdate::from_json_val)
                .unwrap_or_default(),
            ts: obj.get("ts").and_then(coerce_f64),
        }
    }
}

impl AxisPair {
    /// Build a pair from a JSON object. Missing components default to zero, a value which is not
    /// an object gives `None`.
    fn from_json_val(val: &Value) -> Option<Self> {
        let obj = val.as_object()?;

        Some(Self {
            x: obj.get("x").and_then(coerce_f64).unwrap_or(0.0),
            y: obj.get("y").and_then(coerce_f64).unwrap_or(0.0),
        })
    }
}

impl ParamsUpdate {
    fn from_json_val(val: &Value) -> Self {
        let obj = match val.as_object() {
            Some(o) => o,
            None => return Self::default(),
        };

        // Accept both the browser client's camelCase keys and snake_case
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| obj.get(*k))
                .find_map(coerce_f64)
        };

        Self {
            max_speed: get(&["maxSpeed", "max_speed"]),
            steer_gain: get(&["steerGain", "steer_gain"]),
            deadzone: get(&["dead", "deadzone"]),
            smoothing: get(&["smooth", "smoothing"]),
        }
    }

    /// True if the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.max_speed.is_none()
            && self.steer_gain.is_none()
            && self.deadzone.is_none()
            && self.smoothing.is_none()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Coerce a JSON value into a finite float.
fn coerce_f64(val: &Value) -> Option<f64> {
    let f = match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;

    if f.is_finite() {
        Some(f)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_simple_types() {
        assert_eq!(Tc::from_json(r#"{"type": "arm"}"#).unwrap(), Tc::Arm);
        assert_eq!(Tc::from_json(r#"{"type": "disarm"}"#).unwrap(), Tc::Disarm);
        assert_eq!(Tc::from_json(r#"{"type": "estop"}"#).unwrap(), Tc::EStop);
        assert_eq!(Tc::from_json(r#"{"type": "ping"}"#).unwrap(), Tc::Ping);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            Tc::from_json("not json"),
            Err(TcParseError::InvalidJson(_))
        ));
        assert!(matches!(
            Tc::from_json("[1, 2]"),
            Err(TcParseError::NotAnObject)
        ));
        assert!(matches!(
            Tc::from_json(r#"{"type": "launch"}"#),
            Err(TcParseError::InvalidType(_))
        ));
        assert!(matches!(
            Tc::from_json(r#"{"kind": "arm"}"#),
            Err(TcParseError::InvalidType(_))
        ));
    }

    #[test]
    fn test_browser_control() {
        let tc = Tc::from_json(
            r#"{"type":"control","left":{"x":0.5,"y":-0.1},"right":{"x":0,"y":1},
            "params":{"maxSpeed":0.3,"steerGain":0.4,"dead":0.1,"smooth":0.2},"ts":1700000000000}"#,
        )
        .unwrap();

        let c = match tc {
            Tc::Control(c) => c,
            t => panic!("Expected control, got {:?}", t),
        };

        assert_eq!(c.left, Some(AxisPair { x: 0.5, y: -0.1 }));
        assert_eq!(c.right, Some(AxisPair { x: 0.0, y: 1.0 }));
        assert_eq!(c.params.max_speed, Some(0.3));
        assert_eq!(c.params.steer_gain, Some(0.4));
        assert_eq!(c.params.deadzone, Some(0.1));
        assert_eq!(c.params.smoothing, Some(0.2));
        assert_eq!(c.ts, Some(1700000000000.0));
    }

    #[test]
    fn test_lenient_control() {
        // Missing pads, string numbers, a pad with a missing component and a bogus parameter
        let tc = Tc::from_json(
            r#"{"type":"control","right":{"y":"0.75"},"left":7,
            "params":{"max_speed":"0.1","smooth":"lots"}}"#,
        )
        .unwrap();

        let c = match tc {
            Tc::Control(c) => c,
            t => panic!("Expected control, got {:?}", t),
        };

        assert_eq!(c.left, None);
        assert_eq!(c.right, Some(AxisPair { x: 0.0, y: 0.75 }));
        assert_eq!(c.params.max_speed, Some(0.1));
        assert_eq!(c.params.smoothing, None);
        assert_eq!(c.params.steer_gain, None);
        assert_eq!(c.ts, None);
    }

    #[test]
    fn test_to_json_is_accepted() {
        let tc = Tc::Control(ControlPayload {
            left: Some(AxisPair { x: 1.0, y: 0.0 }),
            right: None,
            params: ParamsUpdate {
                steer_gain: Some(0.5),
                ..Default::default()
            },
            ts: None,
        });

        assert_eq!(Tc::from_json(&tc.to_json()).unwrap(), tc);
        assert_eq!(Tc::from_json(&Tc::EStop.to_json()).unwrap(), Tc::EStop);
    }
}
