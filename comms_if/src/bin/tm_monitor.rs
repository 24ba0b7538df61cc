//! Telemetry monitor
//!
//! Subscribes to the control executable's telemetry publisher and prints every packet.

use comms_if::{net::{MonitoredSocket, SocketOptions}, tm::TmPacket};

fn main() -> Result<(), Box<dyn std::error::Error>> {

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("tcp://localhost:8001"));

    // Create context
    let ctx = zmq::Context::new();

    // Create socket options
    let socket_options = SocketOptions {
        linger: 0,
        ..Default::default()
    };

    // Create socket
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::SUB,
        socket_options,
        &endpoint
    )?;

    // Subscribe to everything, the publisher only sends telemetry
    socket.set_subscribe(b"")?;

    // Recieve messages from publisher
    loop {

        let msg = socket.recv_msg(0)?;

        match msg.as_str().map(TmPacket::from_json) {
            Some(Ok(tm)) => println!("{:?}", tm),
            Some(Err(e)) => println!("Invalid telemetry: {}", e),
            None => println!("Received non UTF-8 message")
        }
    }
}
