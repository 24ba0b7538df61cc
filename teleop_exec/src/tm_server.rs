//! # TM Server
//!
//! Publishes every telemetry packet on a zmq `PUB` socket for monitoring tools.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Mutex, PoisonError};
use log::warn;

use comms_if::net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions};

use crate::{
    telemetry::TelemetryRecord,
    tm_broadcast::{SinkError, TmSink},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    socket: Mutex<MonitoredSocket>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, TmServerError> {
        // Create the socket options
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            send_timeout: 0,
            ..Default::default()
        };

        // Bind the socket
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            endpoint
        ).map_err(TmServerError::SocketError)?;

        // Create self
        Ok(Self {
            socket: Mutex::new(socket)
        })
    }
}

impl TmSink for TmServer {
    fn deliver(&self, record: &TelemetryRecord) -> Result<(), SinkError> {
        // Serialize packet
        let packet_string = record.to_packet().to_json()
            .map_err(|_| SinkError::Full)?;

        let socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner);

        // The publisher always stays subscribed, errors only lose this packet
        match socket.send(&packet_string, zmq::DONTWAIT) {
            Ok(()) => Ok(()),
            Err(zmq::Error::EAGAIN) => Err(SinkError::Full),
            Err(e) => {
                warn!("Could not publish telemetry: {}", e);
                Err(SinkError::Full)
            }
        }
    }
}
