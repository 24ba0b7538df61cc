//! # Teleoperation library.
//!
//! This library allows other crates in the workspace (and the integration tests) to access items
//! defined inside the teleoperation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuators - the simulated vehicle and the mechanisms client
pub mod actuator;

/// Control loop - fixed rate scheduling of the shaping and actuation
pub mod ctrl_loop;

/// Data store - state shared between the control loop and the TC sources
pub mod data_store;

/// Input state - latest joystick axes and shaper parameters
pub mod input_state;

/// Executable parameters
pub mod params;

/// Safety gate - arm/disarm/estop state machine
pub mod safety;

/// Session server - accepts teleoperation clients
pub mod session_server;

/// Signal shaper - converts axes into commands
pub mod shaper;

/// Telecommand processor - executes TCs against the data store
pub mod tc_processor;

/// Telemetry log - CSV archive of every cycle
pub mod telem_log;

/// Telemetry record produced each cycle
pub mod telemetry;

/// Telemetry broadcaster - fans records out to subscribers
pub mod tm_broadcast;

/// Telemetry server - publishes telemetry for monitoring tools
pub mod tm_server;
