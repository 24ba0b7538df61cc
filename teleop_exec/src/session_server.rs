//! # Session server
//!
//! Accepts connections from teleoperation clients on a zmq `ROUTER` socket. Each client identity
//! is a session: its telecommands are executed against the datastore as they arrive and, once it
//! has sent a valid TC, it receives every telemetry packet.
//!
//! The server runs in its own thread so that the control loop never waits on client I/O.
//! Telemetry reaches the server thread through a bounded queue per session, and is written with
//! a non-blocking send. A client whose queue is full loses packets, a client that has gone away is
//! removed from the broadcaster.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, SyncSender, TrySendError},
    Arc,
};
use std::thread::{self, JoinHandle};
use log::{debug, info, trace, warn};

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tc::Tc,
};

use crate::{
    data_store::DataStore,
    tc_processor,
    telemetry::TelemetryRecord,
    tm_broadcast::{SinkError, SubscriberId, TmBroadcaster, TmSink},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of telemetry packets which may wait to be sent to one session.
const SESSION_QUEUE_LEN: usize = 8;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the running server thread.
pub struct SessionServer {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

/// Telemetry sink for one session.
struct SessionSink {
    closed: Arc<AtomicBool>,
    tx: SyncSender<String>,
}

/// Server side state of one session.
struct Session {
    id: SubscriberId,
    closed: Arc<AtomicBool>,
    rx: Receiver<String>,
}

/// State owned by the server thread.
struct Server {
    socket: MonitoredSocket,
    ds: Arc<DataStore>,
    broadcaster: Arc<TmBroadcaster>,
    sessions: HashMap<Vec<u8>, Session>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not start the server thread: {0}")]
    ThreadError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionServer {
    /// Bind the server's socket and start the server thread.
    pub fn start(
        ctx: &zmq::Context,
        params: &NetParams,
        ds: Arc<DataStore>,
        broadcaster: Arc<TmBroadcaster>,
    ) -> Result<Self, SessionServerError> {
        // Create the socket options
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 5,
            send_timeout: 0,
            router_mandatory: true,
            ..Default::default()
        };

        // Bind the socket
        let socket = MonitoredSocket::new(
            ctx,
            zmq::ROUTER,
            socket_options,
            &params.tc_endpoint
        ).map_err(SessionServerError::SocketError)?;

        info!("Session server listening on {}", params.tc_endpoint);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let server = Server {
            socket,
            ds,
            broadcaster,
            sessions: HashMap::new(),
        };

        let join_handle = thread::Builder::new()
            .name(String::from("session_server"))
            .spawn(move || server.run(shutdown_clone))
            .map_err(SessionServerError::ThreadError)?;

        Ok(Self {
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    /// Stop the server thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                warn!("Session server thread panicked");
            } else {
                info!("Session server stopped");
            }
        }
    }
}

impl Drop for SessionServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Server {
    fn run(mut self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            // Receive, waiting up to the socket's timeout for the first message
            let mut flags = 0;
            loop {
                match self.socket.recv_multipart(flags) {
                    Ok(frames) => self.handle_frames(frames),
                    Err(zmq::Error::EAGAIN) => break,
                    Err(e) => {
                        warn!("Session server could not receive: {}", e);
                        break;
                    }
                }
                flags = zmq::DONTWAIT;
            }

            self.send_pending();
            self.reap_closed();
        }

        // Remove every session from the broadcaster
        for (_, s) in self.sessions.drain() {
            self.broadcaster.unsubscribe(s.id);
        }
    }

    /// Handle one multipart message. The first frame is the client identity and the last the
    /// payload.
    fn handle_frames(&mut self, mut frames: Vec<Vec<u8>>) {
        if frames.len() < 2 {
            debug!("Dropping message with {} frames", frames.len());
            return;
        }

        let payload = match frames.pop() {
            Some(p) => p,
            None => return,
        };
        let identity = frames.swap_remove(0);

        let tc_str = match std::str::from_utf8(&payload) {
            Ok(s) => s,
            Err(_) => {
                debug!("Dropping non UTF-8 message");
                return;
            }
        };

        let tc = match Tc::from_json(tc_str) {
            Ok(tc) => tc,
            Err(e) => {
                warn!("Dropping malformed TC: {}", e);
                return;
            }
        };

        if !self.sessions.contains_key(&identity) {
            self.open_session(identity);
        }

        trace!("TC: {:?}", tc);
        tc_processor::exec(&self.ds, &tc);
    }

    fn open_session(&mut self, identity: Vec<u8>) {
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::sync_channel(SESSION_QUEUE_LEN);

        let id = self.broadcaster.subscribe(Arc::new(SessionSink {
            closed: closed.clone(),
            tx,
        }));

        info!("New session {:?} ({} open)", id, self.sessions.len() + 1);

        self.sessions.insert(identity, Session { id, closed, rx });
    }

    /// Write queued telemetry to each session.
    fn send_pending(&mut self) {
        for (identity, session) in self.sessions.iter() {
            while let Ok(packet) = session.rx.try_recv() {
                if session.closed.load(Ordering::Relaxed) {
                    break;
                }

                let frames = vec![identity.clone(), packet.into_bytes()];
                match self.socket.send_multipart(frames, zmq::DONTWAIT) {
                    Ok(()) => (),
                    // Peer has gone
                    Err(zmq::Error::EHOSTUNREACH) => {
                        session.closed.store(true, Ordering::Relaxed);
                    },
                    // Peer's pipe is full, drop the packet
                    Err(zmq::Error::EAGAIN) => {
                        trace!("Session {:?} busy, telemetry dropped", session.id);
                    },
                    Err(e) => {
                        warn!("Could not send telemetry to session {:?}: {}", session.id, e);
                    }
                }
            }
        }
    }

    fn reap_closed(&mut self) {
        let broadcaster = &self.broadcaster;

        self.sessions.retain(|_, s| {
            if s.closed.load(Ordering::Relaxed) {
                broadcaster.unsubscribe(s.id);
                info!("Session {:?} closed", s.id);
                false
            } else {
                true
            }
        });
    }
}

impl TmSink for SessionSink {
    fn deliver(&self, record: &TelemetryRecord) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(SinkError::Closed);
        }

        let packet = record.to_packet().to_json().map_err(|_| SinkError::Full)?;

        self.tx.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Disconnected(_) => SinkError::Closed,
        })
    }
}
