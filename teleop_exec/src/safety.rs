//! # Safety gate module
//!
//! The safety gate decides whether shaped commands are allowed to reach the actuators. It is a
//! three state machine driven only by explicit telecommands:
//!
//! | state    | `arm` | `disarm` | `estop`  |
//! |----------|-------|----------|----------|
//! | Disarmed | Armed | Disarmed | EStopped |
//! | Armed    | Armed | Disarmed | EStopped |
//! | EStopped | Armed | Disarmed | EStopped |
//!
//! Only `Armed` permits nonzero output.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::{Mutex, PoisonError};
use log::info;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Safety state of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyState {
    Disarmed,
    Armed,
    EStopped,
}

/// Events which change the safety state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyEvent {
    Arm,
    Disarm,
    EStop,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Thread safe holder of the safety state.
#[derive(Debug, Default)]
pub struct SafetyGate {
    inner: Mutex<GateInner>,
}

/// A consistent view of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetySnapshot {
    pub state: SafetyState,

    /// Number of disarm and estop events processed so far.
    ///
    /// The control loop compares this between cycles to know when the retained command has to be
    /// reset.
    pub num_resets: u64,
}

#[derive(Debug)]
struct GateInner {
    state: SafetyState,
    num_resets: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SafetyState {
    fn default() -> Self {
        SafetyState::Disarmed
    }
}

impl Default for GateInner {
    fn default() -> Self {
        Self {
            state: SafetyState::Disarmed,
            num_resets: 0,
        }
    }
}

impl SafetyState {
    /// Transition function, total over every state and event.
    pub fn next(self, event: SafetyEvent) -> SafetyState {
        match event {
            SafetyEvent::Arm => SafetyState::Armed,
            SafetyEvent::Disarm => SafetyState::Disarmed,
            SafetyEvent::EStop => SafetyState::EStopped,
        }
    }

    pub fn is_armed(&self) -> bool {
        *self == SafetyState::Armed
    }

    pub fn is_estopped(&self) -> bool {
        *self == SafetyState::EStopped
    }
}

impl SafetyEvent {
    /// True if the event forces the retained command back to zero.
    pub fn is_reset(&self) -> bool {
        !matches!(self, SafetyEvent::Arm)
    }
}

impl SafetyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event to the gate, returning the new state.
    pub fn apply(&self, event: SafetyEvent) -> SafetyState {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let prev = inner.state;
        inner.state = prev.next(event);

        if event.is_reset() {
            inner.num_resets = inner.num_resets.wrapping_add(1);
        }

        if prev != inner.state {
            info!("Safety state changed: {:?} -> {:?}", prev, inner.state);
        }

        inner.state
    }

    /// Get the current state.
    pub fn state(&self) -> SafetyState {
        self.snapshot().state
    }

    /// Get a consistent snapshot of the state and reset counter.
    pub fn snapshot(&self) -> SafetySnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        SafetySnapshot {
            state: inner.state,
            num_resets: inner.num_resets,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
