//! # Mechanisms Server Module
//!
//! This module abstracts over the networking side of the mechanisms executable. The server accepts
//! connections from the client in the teleoperation executable, allowing requests to be recieved
//! from the client and responses (with sensor data) to be sent back.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, SocketOptions, MonitoredSocketError},
    eqpt::mech::{MechRequest, MechResponse}
};
use log::warn;

use crate::params::MechExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An abstraction over the networking part of the mechanisms executable.
pub struct MechServer {

    /// REP socket which accepts requests from the client
    dems_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`MechServer`]
#[derive(thiserror::Error, Debug)]
pub enum MechServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not send data to the client: {0}")]
    SendError(zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MechServer {

    /// Create a new instance of the mechanisms server.
    ///
    /// This function will not wait for a connection from the client before returning.
    pub fn new(ctx: &zmq::Context, params: &MechExecParams) -> Result<Self, MechServerError> {

        // Create the socket options
        let dems_socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.safe_timeout_ms,
            send_timeout: 10,
            ..Default::default()
        };

        // Create the socket
        let dems_socket = MonitoredSocket::new(
            ctx,
            zmq::REP,
            dems_socket_options,
            &params.demands_endpoint
        )?;

        // Create self
        Ok(Self {
            dems_socket
        })
    }

    /// Retrieve a request from the client.
    ///
    /// The user MUST call [`MechServer::send_response`] at the earliest opportunity in order to
    /// notify the client.
    ///
    /// `None` is returned if no valid request is recieved within the timeout. In this case the
    /// exec must stop the mechanisms. If a message was recieved but could not be understood the
    /// `DemsInvalid` response is sent automatically.
    pub fn get_request(&mut self) -> Option<MechRequest> {

        // Read from the socket
        let msg = match self.dems_socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Recieved a non UTF-8 request");
                self.reject();
                return None
            },
            Err(_) => return None
        };

        match serde_json::from_str(&msg) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("Could not deserialize request: {}", e);
                self.reject();
                None
            }
        }
    }

    /// Send a response to the client based on the recieved request.
    pub fn send_response(
        &mut self,
        response: &MechResponse
    ) -> Result<(), MechServerError> {
        // Serialize response
        let resp_str = serde_json::to_string(response)
            .map_err(MechServerError::SerializationError)?;

        // Send response
        self.dems_socket.send(&resp_str, 0)
            .map_err(MechServerError::SendError)
    }

    /// Answer a request that could not be understood.
    fn reject(&mut self) {
        if let Err(e) = self.send_response(&MechResponse::DemsInvalid) {
            warn!("Could not reject the request: {}", e);
        }
    }
}

impl From<MonitoredSocketError> for MechServerError {
    fn from(e: MonitoredSocketError) -> Self {
        MechServerError::SocketError(e)
    }
}
