//! # Actuator module
//!
//! The actuator is the vehicle side of the control loop: it takes the shaped demands and returns
//! the latest sensor readings. Two implementations exist:
//!
//! - [`SimActuator`], a simple simulated vehicle used for development and headless runs,
//! - [`MechClient`], which forwards demands to the mechanisms executable over the network.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod mech_client;
mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use mech_client::MechClient;
pub use sim::{SimActuator, SimParams};

use comms_if::{
    eqpt::mech::{MechDems, MechResponse, MechSensData},
    net::{zmq, MonitoredSocketError},
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Interface to the vehicle's actuators and sensors.
pub trait Actuator: Send {
    /// Actuate the given demands and read back the sensors.
    fn read_write(&mut self, dems: &MechDems) -> Result<MechSensData, ActuatorError>;

    /// Stop all actuators and release the hardware.
    fn shutdown(&mut self) -> Result<(), ActuatorError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("The actuator has been released")]
    Released,

    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the mechanisms server")]
    NotConnected,

    #[error("Could not send the request to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("The mechanisms server did not respond in time")]
    Timeout,

    #[error("Could not serialize the request: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The server sent a message which was not valid UTF-8")]
    NonUtf8Response,

    #[error("Unexpected response from the mechanisms server: {0:?}")]
    UnexpectedResponse(MechResponse),
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn read_write(&mut self, dems: &MechDems) -> Result<MechSensData, ActuatorError> {
        (**self).read_write(dems)
    }

    fn shutdown(&mut self) -> Result<(), ActuatorError> {
        (**self).shutdown()
    }
}
