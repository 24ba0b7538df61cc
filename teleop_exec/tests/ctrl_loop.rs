//! Control loop integration tests

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use comms_if::{
    eqpt::mech::{MechDems, MechSensData},
    tc::{AxisPair, ControlPayload, Tc},
};
use teleop_lib::{
    actuator::{Actuator, ActuatorError},
    ctrl_loop::{CancelToken, ControlLoop, ControlLoopError, LoopParams},
    data_store::DataStore,
    shaper::{ShaperParams, STEERING_LIMIT_RAD},
    tc_processor,
    telem_log::TelemetryLog,
    telemetry::TelemetryRecord,
    tm_broadcast::{ChannelSink, TmBroadcaster},
};
use util::archive::ArchiveError;

// ---------------------------------------------------------------------------
// MOCKS
// ---------------------------------------------------------------------------

/// What the mock does on a given call.
#[derive(Clone, Copy)]
enum Fault {
    None,
    ErrorAt(usize),
    PanicAt(usize),
}

/// Actuator which counts its calls.
struct MockActuator {
    num_calls: Arc<AtomicUsize>,
    num_shutdowns: Arc<AtomicUsize>,
    fault: Fault,
    /// Cancel this token after the given number of calls
    cancel_after: Option<(usize, CancelToken)>,
    /// Simulated work per call, cycling through the list
    work: Vec<Duration>,
}

impl MockActuator {
    fn new(fault: Fault) -> Self {
        Self {
            num_calls: Arc::new(AtomicUsize::new(0)),
            num_shutdowns: Arc::new(AtomicUsize::new(0)),
            fault,
            cancel_after: None,
            work: Vec::new(),
        }
    }
}

impl Actuator for MockActuator {
    fn read_write(&mut self, _dems: &MechDems) -> Result<MechSensData, ActuatorError> {
        let n = self.num_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.work.is_empty() {
            thread::sleep(self.work[n % self.work.len()]);
        }

        match self.fault {
            Fault::ErrorAt(i) if i == n => return Err(ActuatorError::Timeout),
            Fault::PanicAt(i) if i == n => panic!("mock actuator failure"),
            _ => (),
        }

        if let Some((after, ref token)) = self.cancel_after {
            if n >= after {
                token.cancel();
            }
        }

        Ok(MechSensData {
            battery_voltage_v: 12.6,
            speed_ms: 0.0,
        })
    }

    fn shutdown(&mut self) -> Result<(), ActuatorError> {
        self.num_shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Telemetry log which fails on every write.
struct FailingLog {
    num_appends: Arc<AtomicUsize>,
}

impl TelemetryLog for FailingLog {
    fn append(&mut self, _record: &TelemetryRecord) -> Result<(), ArchiveError> {
        self.num_appends.fetch_add(1, Ordering::SeqCst);
        Err(ArchiveError::FlushError(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

fn new_loop(actuator: MockActuator) -> (Arc<DataStore>, Arc<TmBroadcaster>, ControlLoop<MockActuator>) {
    let ds = Arc::new(DataStore::new(ShaperParams::default()));
    let broadcaster = Arc::new(TmBroadcaster::new());

    let cl = ControlLoop::new(
        LoopParams::default(),
        ds.clone(),
        broadcaster.clone(),
        actuator,
    )
    .unwrap();

    (ds, broadcaster, cl)
}

fn hard_left() -> Tc {
    Tc::Control(ControlPayload {
        left: Some(AxisPair { x: 1.0, y: 0.0 }),
        right: Some(AxisPair { x: 0.0, y: 0.0 }),
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[test]
fn test_arm_scenario() {
    let (ds, broadcaster, mut cl) = new_loop(MockActuator::new(Fault::None));
    let (sink, rx) = ChannelSink::channel(1000);
    broadcaster.subscribe(Arc::new(sink));

    let steer_gain = ShaperParams::default().steer_gain;

    // Input before arming produces nothing
    tc_processor::exec(&ds, &hard_left());
    for _ in 0..25 {
        cl.tick().unwrap();
    }

    tc_processor::exec(&ds, &Tc::Arm);
    tc_processor::exec(&ds, &hard_left());
    for _ in 0..25 {
        cl.tick().unwrap();
    }

    let records: Vec<TelemetryRecord> = rx.try_iter().collect();
    assert_eq!(records.len(), 50);

    for r in records[..25].iter() {
        assert_eq!(r.steering, 0.0);
        assert_eq!(r.throttle, 0.0);
        assert!(!r.armed);
    }

    // Steering converges monotonically on the gain, inverted
    let armed = &records[25..];
    assert!(armed.iter().all(|r| r.armed && r.throttle == 0.0));
    for pair in armed.windows(2) {
        assert!(pair[1].steering <= pair[0].steering);
    }
    assert!((armed[24].steering - -steer_gain).abs() < 1e-6);
    assert_eq!(armed[0].battery_pct, 100.0);
}

#[test]
fn test_broadcast_isolation() {
    let broadcaster = TmBroadcaster::new();

    let (a, rx_a) = ChannelSink::channel(4);
    let (b, rx_b) = ChannelSink::channel(4);
    let (c, rx_c) = ChannelSink::channel(4);
    broadcaster.subscribe(Arc::new(a));
    broadcaster.subscribe(Arc::new(b));
    broadcaster.subscribe(Arc::new(c));

    // Subscriber b goes away
    drop(rx_b);

    let record = TelemetryRecord {
        timestamp: Utc::now(),
        battery_pct: 42.0,
        speed_mps: 0.1,
        throttle: 0.1,
        steering: 0.0,
        armed: true,
        estop: false,
    };
    let report = broadcaster.broadcast(&record);

    assert_eq!(report.delivered, 2);
    assert_eq!(report.dropped, 1);
    assert_eq!(broadcaster.num_subscribers(), 2);
    assert_eq!(rx_a.try_recv().unwrap(), record);
    assert_eq!(rx_c.try_recv().unwrap(), record);
}

#[test]
fn test_rate_fidelity() {
    let cancel = CancelToken::new();

    let mut act = MockActuator::new(Fault::None);
    act.cancel_after = Some((100, cancel.clone()));
    act.work = vec![
        Duration::from_millis(1),
        Duration::from_millis(8),
        Duration::from_millis(3),
        Duration::from_millis(12),
    ];
    let num_calls = act.num_calls.clone();

    let (_ds, _b, cl) = new_loop(act);

    let start = Instant::now();
    let stats = cl.run(&cancel).unwrap();
    let elapsed = start.elapsed().as_secs_f64();

    assert_eq!(num_calls.load(Ordering::SeqCst), 100);
    assert_eq!(stats.num_ticks, 100);
    assert!(
        elapsed > 1.9 && elapsed < 2.2,
        "100 cycles at 50 Hz took {} s",
        elapsed
    );
}

#[test]
fn test_shutdown_once_on_cancel() {
    let cancel = CancelToken::new();

    let mut act = MockActuator::new(Fault::None);
    act.cancel_after = Some((5, cancel.clone()));
    let num_shutdowns = act.num_shutdowns.clone();

    let (_ds, _b, cl) = new_loop(act);
    cl.run(&cancel).unwrap();

    assert_eq!(num_shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_once_when_cancelled_from_another_thread() {
    let cancel = CancelToken::new();
    let act = MockActuator::new(Fault::None);
    let num_shutdowns = act.num_shutdowns.clone();
    let num_calls = act.num_calls.clone();

    let (_ds, _b, cl) = new_loop(act);

    let jh = {
        let cancel = cancel.clone();
        thread::spawn(move || cl.run(&cancel))
    };

    thread::sleep(Duration::from_millis(200));
    cancel.cancel();

    assert!(jh.join().unwrap().is_ok());
    assert!(num_calls.load(Ordering::SeqCst) > 0);
    assert_eq!(num_shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_once_on_actuator_error() {
    let cancel = CancelToken::new();
    let act = MockActuator::new(Fault::ErrorAt(3));
    let num_shutdowns = act.num_shutdowns.clone();
    let num_calls = act.num_calls.clone();

    let (_ds, _b, cl) = new_loop(act);

    assert!(matches!(
        cl.run(&cancel),
        Err(ControlLoopError::ActuatorError(ActuatorError::Timeout))
    ));
    assert_eq!(num_calls.load(Ordering::SeqCst), 3);
    assert_eq!(num_shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_once_on_panic() {
    let cancel = CancelToken::new();
    let act = MockActuator::new(Fault::PanicAt(2));
    let num_shutdowns = act.num_shutdowns.clone();

    let (_ds, _b, cl) = new_loop(act);

    let result = panic::catch_unwind(AssertUnwindSafe(|| cl.run(&cancel)));

    assert!(result.is_err());
    assert_eq!(num_shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_when_params_rejected() {
    let act = MockActuator::new(Fault::None);
    let num_shutdowns = act.num_shutdowns.clone();

    let result = ControlLoop::new(
        LoopParams {
            rate_hz: 0.0,
            ..Default::default()
        },
        Arc::new(DataStore::default()),
        Arc::new(TmBroadcaster::new()),
        act,
    );

    assert!(matches!(result, Err(ControlLoopError::InvalidParams(_))));
    assert_eq!(num_shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_runtime_params_reach_the_hard_limits() {
    let (ds, broadcaster, mut cl) = new_loop(MockActuator::new(Fault::None));
    let (sink, rx) = ChannelSink::channel(10);
    broadcaster.subscribe(Arc::new(sink));

    tc_processor::exec(&ds, &Tc::Arm);
    tc_processor::exec(
        &ds,
        &Tc::from_json(
            r#"{"type":"control",
            "params":{"steerGain":2.0,"maxSpeed":1.0,"smooth":0},
            "left":{"x":-1,"y":0},"right":{"x":0,"y":1}}"#,
        )
        .unwrap(),
    );

    let record = cl.tick().unwrap();

    // Raw steering is 2.0 rad, clamped to the steering limit
    assert_eq!(record.steering, STEERING_LIMIT_RAD);
    assert_eq!(record.throttle, 1.0);
    assert_eq!(rx.try_recv().unwrap(), record);
}

#[test]
fn test_telemetry_log_failures_do_not_stop_the_loop() {
    let num_appends = Arc::new(AtomicUsize::new(0));
    let (ds, broadcaster, cl) = new_loop(MockActuator::new(Fault::None));
    let mut cl = cl.with_telem_log(Box::new(FailingLog {
        num_appends: num_appends.clone(),
    }));
    let (sink, rx) = ChannelSink::channel(100);
    broadcaster.subscribe(Arc::new(sink));

    tc_processor::exec(&ds, &Tc::Arm);

    const N: usize = 20;
    for _ in 0..N {
        assert!(cl.tick().is_ok());
    }

    assert_eq!(num_appends.load(Ordering::SeqCst), N);
    assert_eq!(cl.stats().num_log_errors, N as u64);
    assert_eq!(rx.try_iter().count(), N);
}
