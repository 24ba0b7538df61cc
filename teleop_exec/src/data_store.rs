//! # Data Store
//!
//! State shared between the control loop and the telecommand sources. Each field carries its own
//! lock so that no single lock serialises the whole executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Mutex, PoisonError};

use crate::{
    input_state::InputState,
    safety::SafetyGate,
    shaper::{CommandOutput, ShaperParams},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Debug, Default)]
pub struct DataStore {
    /// Operator input
    pub input: InputState,

    /// Arm/disarm/estop state
    pub safety: SafetyGate,

    /// Most recent command, the smoothing seed for the next cycle
    pub output: OutputCell,
}

/// Holder for the retained command output.
#[derive(Debug, Default)]
pub struct OutputCell(Mutex<CommandOutput>);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(params: ShaperParams) -> Self {
        Self {
            input: InputState::new(params),
            safety: SafetyGate::new(),
            output: OutputCell::default(),
        }
    }
}

impl OutputCell {
    pub fn get(&self) -> CommandOutput {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, output: CommandOutput) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = output;
    }

    /// Force the retained output to zero.
    pub fn zero(&self) {
        self.set(CommandOutput::default())
    }
}
