//! Simple teleoperation client
//!
//! Connects to the control executable, arms the vehicle, sweeps the pads through a slow turn and
//! prints the telemetry it gets back. Ctrl+C is not handled, the vehicle is left disarmed at the end
//! of the run.

use comms_if::{
    net::{MonitoredSocket, SocketOptions},
    tc::{AxisPair, ControlPayload, Tc},
    tm::TmPacket,
};
use std::time::{Duration, Instant};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "teleop_client")]
struct Opt {
    /// Endpoint of the control executable
    #[structopt(long, default_value = "tcp://localhost:8000")]
    endpoint: String,

    /// Length of the drive in seconds
    #[structopt(long, default_value = "10")]
    duration_s: f64,

    /// Rate at which control messages are sent
    #[structopt(long, default_value = "20")]
    rate_hz: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        connect_timeout: 1000,
        heartbeat_ivl: 500,
        heartbeat_ttl: 1000,
        heartbeat_timeout: 1000,
        linger: 1,
        recv_timeout: 0,
        send_timeout: 10,
        ..Default::default()
    };

    // Create the socket
    let socket = match MonitoredSocket::new(
        &ctx,
        zmq::DEALER,
        socket_options,
        &opt.endpoint
    ) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the server");
            return Err(e.into())
        }
    };

    // Register for telemetry then arm
    socket.send(Tc::Ping.to_json().as_str(), 0)?;
    socket.send(Tc::Arm.to_json().as_str(), 0)?;

    let period = Duration::from_secs_f64(1.0 / opt.rate_hz);
    let start = Instant::now();

    while start.elapsed().as_secs_f64() < opt.duration_s {
        let t = start.elapsed().as_secs_f64();

        // Gentle forward drive with a steering sweep
        let tc = Tc::Control(ControlPayload {
            left: Some(AxisPair { x: (t * 0.5).sin(), y: 0.0 }),
            right: Some(AxisPair { x: 0.0, y: 0.5 }),
            ts: Some(chrono::Utc::now().timestamp_millis() as f64),
            ..Default::default()
        });

        if let Err(e) = socket.send(tc.to_json().as_str(), 0) {
            println!("could not send: {}", e);
        }

        // Print all the telemetry that arrived since the last send
        while let Ok(msg) = socket.recv_msg(zmq::DONTWAIT) {
            match msg.as_str().map(TmPacket::from_json) {
                Some(Ok(tm)) => println!(
                    "thr {:+.3} m/s  str {:+.3} rad  spd {:+.3} m/s  bat {:5.1} %  armed {}  estop {}",
                    tm.throttle, tm.steering, tm.speed_mps, tm.battery_pct, tm.armed, tm.estop
                ),
                _ => println!("Received invalid telemetry")
            }
        }

        std::thread::sleep(period);
    }

    socket.send(Tc::Disarm.to_json().as_str(), 0)?;

    Ok(())
}
