//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the messages teleoperation
//! clients send to the control executable, the telemetry sent back to them, and the demands
//! exchanged with the mechanisms executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands sent by teleoperation clients
pub mod tc;

/// Telemetry sent to teleoperation clients
pub mod tm;

/// Command and response definitions for equipment (like mechanisms)
pub mod eqpt;

/// Network module
pub mod net;
