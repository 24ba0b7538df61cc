//! # Telecommand processor module
//!
//! The telecommand processor handles TCs coming from any source (remote sessions or a script).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};

// Internal
use comms_if::tc::Tc;
use crate::{data_store::DataStore, safety::SafetyEvent};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to change the safety state or the operator input.
pub fn exec(ds: &DataStore, tc: &Tc) {

    // Handle different Tcs
    match tc {
        Tc::Ping => {
            trace!("Recieved Ping");
        },
        Tc::Arm => {
            debug!("Recieved Arm command");
            ds.safety.apply(SafetyEvent::Arm);
        },
        Tc::Disarm => {
            debug!("Recieved Disarm command");
            ds.safety.apply(SafetyEvent::Disarm);
            ds.output.zero();
        },
        Tc::EStop => {
            debug!("Recieved EStop command");
            ds.safety.apply(SafetyEvent::EStop);
            ds.output.zero();
        },
        Tc::Control(c) => {
            ds.input.apply_control(c);
        }
    }

}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
