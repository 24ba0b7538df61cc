//! # Mechanisms Client
//!
//! This module provides networking abstractions to connect to the mechanisms server.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;

use comms_if::{
    eqpt::mech::{MechDems, MechRequest, MechResponse, MechSensData},
    net::{zmq, MonitoredSocket, NetParams, SocketOptions},
};

use super::{Actuator, ActuatorError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct MechClient {
    dems_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MechClient {
    /// Create a new instance of the mechanisms client.
    ///
    /// Blocks until the server is connected or the connection attempt fails.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, ActuatorError> {

        // Create the socket options
        let dems_socket_options = SocketOptions {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.mech_timeout_ms,
            send_timeout: params.mech_timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        // Create the socket
        let dems_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            dems_socket_options,
            &params.mech_dems_endpoint
        ).map_err(ActuatorError::SocketError)?;

        debug!("MechClient connected to {}", params.mech_dems_endpoint);

        // Create self
        Ok(Self {
            dems_socket
        })
    }

    /// Send a request to the server and wait for the response.
    fn request(&mut self, request: &MechRequest) -> Result<MechResponse, ActuatorError> {
        // If not connected return now
        if !self.dems_socket.connected() {
            return Err(ActuatorError::NotConnected)
        }

        // Serialize the request
        let req_str = serde_json::to_string(request)
            .map_err(ActuatorError::SerializationError)?;

        // Send the request to the server
        self.dems_socket.send(&req_str, 0)
            .map_err(|e| match e {
                zmq::Error::EAGAIN => ActuatorError::Timeout,
                e => ActuatorError::SendError(e)
            })?;

        // Recieve response back from the server
        match self.dems_socket.recv_string(0) {
            Ok(Ok(s)) => serde_json::from_str(&s)
                .map_err(ActuatorError::DeserializeError),
            Ok(Err(_)) => Err(ActuatorError::NonUtf8Response),
            Err(zmq::Error::EAGAIN) => Err(ActuatorError::Timeout),
            Err(e) => Err(ActuatorError::RecvError(e))
        }
    }
}

impl Actuator for MechClient {
    fn read_write(&mut self, dems: &MechDems) -> Result<MechSensData, ActuatorError> {
        match self.request(&MechRequest::Demands(*dems))? {
            MechResponse::DemsOk(sens) => Ok(sens),
            r => Err(ActuatorError::UnexpectedResponse(r))
        }
    }

    fn shutdown(&mut self) -> Result<(), ActuatorError> {
        match self.request(&MechRequest::Shutdown)? {
            MechResponse::ShutdownOk => Ok(()),
            r => Err(ActuatorError::UnexpectedResponse(r))
        }
    }
}
