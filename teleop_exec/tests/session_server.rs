//! Session server integration tests

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use comms_if::{
    net::{zmq, MonitoredSocket, NetParams, SocketOptions},
    tc::Tc,
    tm::TmPacket,
};
use teleop_lib::{
    data_store::DataStore,
    safety::SafetyState,
    session_server::SessionServer,
    shaper::ShaperParams,
    telemetry::TelemetryRecord,
    tm_broadcast::TmBroadcaster,
};

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

/// Poll `f` until it returns true or a couple of seconds pass.
fn wait_for<F: Fn() -> bool>(f: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(3) {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[test]
fn test_client_session() {
    let ctx = zmq::Context::new();
    let params = NetParams {
        tc_endpoint: String::from("tcp://127.0.0.1:38471"),
        ..Default::default()
    };

    let ds = Arc::new(DataStore::new(ShaperParams::default()));
    let broadcaster = Arc::new(TmBroadcaster::new());

    let mut server =
        SessionServer::start(&ctx, &params, ds.clone(), broadcaster.clone()).unwrap();

    let client = MonitoredSocket::new(
        &ctx,
        zmq::DEALER,
        SocketOptions {
            block_on_first_connect: false,
            linger: 0,
            recv_timeout: 3000,
            send_timeout: 1000,
            ..Default::default()
        },
        "tcp://127.0.0.1:38471",
    )
    .unwrap();

    // Garbage is dropped without registering a session
    client.send("{not json", 0).unwrap();
    client.send(r#"{"type": "launch"}"#, 0).unwrap();

    client.send(Tc::Arm.to_json().as_str(), 0).unwrap();
    client
        .send(
            r#"{"type":"control","left":{"x":0.5,"y":0},"params":{"steerGain":"0.8"}}"#,
            0,
        )
        .unwrap();

    assert!(wait_for(|| ds.input.snapshot().params.steer_gain == 0.8));
    assert_eq!(ds.safety.state(), SafetyState::Armed);
    assert_eq!(ds.input.snapshot().left.x, 0.5);
    assert_eq!(broadcaster.num_subscribers(), 1);

    // Telemetry comes back to the client
    let record = TelemetryRecord {
        timestamp: Utc::now(),
        battery_pct: 75.0,
        speed_mps: 0.05,
        throttle: 0.1,
        steering: -0.4,
        armed: true,
        estop: false,
    };
    assert_eq!(broadcaster.broadcast(&record).delivered, 1);

    let msg = client.recv_string(0).unwrap().unwrap();
    let packet = TmPacket::from_json(&msg).unwrap();
    assert_eq!(packet, record.to_packet());

    server.stop();
    assert_eq!(broadcaster.num_subscribers(), 0);
}

#[test]
fn test_session_registered_by_first_valid_tc() {
    let ctx = zmq::Context::new();
    let params = NetParams {
        tc_endpoint: String::from("tcp://127.0.0.1:38472"),
        ..Default::default()
    };

    let ds = Arc::new(DataStore::new(ShaperParams::default()));
    let broadcaster = Arc::new(TmBroadcaster::new());

    let mut server =
        SessionServer::start(&ctx, &params, ds.clone(), broadcaster.clone()).unwrap();

    let client = MonitoredSocket::new(
        &ctx,
        zmq::DEALER,
        SocketOptions {
            block_on_first_connect: false,
            linger: 0,
            recv_timeout: 3000,
            send_timeout: 1000,
            ..Default::default()
        },
        "tcp://127.0.0.1:38472",
    )
    .unwrap();

    client.send("{not json", 0).unwrap();
    client.send(r#"{"left":{"x":1}}"#, 0).unwrap();

    thread::sleep(Duration::from_millis(300));
    assert_eq!(broadcaster.num_subscribers(), 0);

    client.send(Tc::Ping.to_json().as_str(), 0).unwrap();

    assert!(wait_for(|| broadcaster.num_subscribers() == 1));
    assert_eq!(ds.safety.state(), SafetyState::Disarmed);

    server.stop();
}
