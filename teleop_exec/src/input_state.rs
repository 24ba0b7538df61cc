//! # Input state
//!
//! Latest joystick positions and shaper parameters received from the operator. The axes and the
//! parameters are held behind separate locks so that a reader always sees both components of a
//! pad together, and a parameter block that came from a single message.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Mutex, PoisonError};
use log::trace;

use comms_if::tc::{AxisPair, ControlPayload};

use crate::shaper::ShaperParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Shared operator input.
#[derive(Debug, Default)]
pub struct InputState {
    axes: Mutex<Axes>,
    params: Mutex<ShaperParams>,
}

/// A consistent copy of the input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    /// Steering pad
    pub left: AxisPair,

    /// Throttle pad
    pub right: AxisPair,

    pub params: ShaperParams,
}

#[derive(Debug, Clone, Copy, Default)]
struct Axes {
    left: AxisPair,
    right: AxisPair,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl InputState {
    /// Create a new input state with neutral axes and the given parameters.
    pub fn new(params: ShaperParams) -> Self {
        Self {
            axes: Mutex::new(Axes::default()),
            params: Mutex::new(params),
        }
    }

    /// Apply a control message.
    ///
    /// Each pad carried by the message replaces the stored pad as a whole. Pads that are absent
    /// keep their previous value. Parameters are merged field by field.
    pub fn apply_control(&self, payload: &ControlPayload) {
        if payload.left.is_some() || payload.right.is_some() {
            let mut axes = self.axes.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(l) = payload.left {
                axes.left = l;
            }
            if let Some(r) = payload.right {
                axes.right = r;
            }

            trace!("Axes updated: left {:?}, right {:?}", axes.left, axes.right);
        }

        if !payload.params.is_empty() {
            let mut params = self.params.lock().unwrap_or_else(PoisonError::into_inner);
            params.merge(&payload.params);

            trace!("Shaper params updated: {:?}", *params);
        }
    }

    /// Take a snapshot of the current input.
    pub fn snapshot(&self) -> InputSnapshot {
        let axes = *self.axes.lock().unwrap_or_else(PoisonError::into_inner);
        let params = *self.params.lock().unwrap_or_else(PoisonError::into_inner);

        InputSnapshot {
            left: axes.left,
            right: axes.right,
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
