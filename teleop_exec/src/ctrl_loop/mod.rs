//! # Control loop module
//!
//! The fixed rate loop at the centre of the executable. Each cycle:
//!
//! 1. Snapshot the operator input and the safety gate,
//! 2. Shape the commands, seeded with the previous cycle's output,
//! 3. Send the demands to the actuator and read back the sensors,
//! 4. Build a telemetry record, archive it and broadcast it,
//! 5. Sleep until the next aligned deadline.
//!
//! The loop owns the actuator. Whichever way the loop ends (cancellation, an actuator error or a
//! panic) the actuator is shut down exactly once.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cancel;
mod timer;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use log::{error, info, trace, warn};
use serde::{Deserialize, Serialize};

// Internal
pub use cancel::CancelToken;
pub use timer::{phase_sleep, RateTimer};

use comms_if::eqpt::mech::{MechDems, MechSensData, NUM_INDICATORS};
use util::maths::{clamp, lin_map};

use crate::{
    actuator::{Actuator, ActuatorError},
    data_store::DataStore,
    shaper::{self, CommandOutput},
    telem_log::TelemetryLog,
    telemetry::TelemetryRecord,
    tm_broadcast::TmBroadcaster,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Steering magnitude above which the turn indicators are lit.
///
/// Units: radians
const INDICATOR_STEER_THRESHOLD_RAD: f64 = 0.3;

/// Telemetry log failures are warned about on the first failure and every this many thereafter.
const LOG_ERROR_WARN_INTERVAL: u64 = 100;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopParams {
    /// Cycle rate.
    ///
    /// Units: hertz
    pub rate_hz: f64,

    /// Battery voltage reported as 0%.
    ///
    /// Units: volts
    pub battery_low_v: f64,

    /// Battery voltage reported as 100%.
    ///
    /// Units: volts
    pub battery_high_v: f64,
}

/// Counters describing the loop's timing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    pub num_ticks: u64,

    /// Number of cycles whose work took longer than the period
    pub num_overruns: u64,

    /// Length of the current run of overrunning cycles
    pub consecutive_overruns: u64,

    /// Longest run of overrunning cycles
    pub max_consecutive_overruns: u64,

    /// Total time spent working (not sleeping)
    pub total_work: Duration,

    /// Number of telemetry log writes which failed
    pub num_log_errors: u64,
}

/// The control loop.
pub struct ControlLoop<A: Actuator> {
    params: LoopParams,

    ds: Arc<DataStore>,

    broadcaster: Arc<TmBroadcaster>,

    actuator: ActuatorHandle<A>,

    telem_log: Option<Box<dyn TelemetryLog>>,

    /// Reset count seen by the previous cycle
    last_num_resets: u64,

    stats: LoopStats,
}

/// Owns the actuator and guarantees it is shut down once.
struct ActuatorHandle<A: Actuator> {
    actuator: A,
    released: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ControlLoopError {
    #[error("Invalid control loop parameters: {0}")]
    InvalidParams(String),

    #[error("Actuator error: {0}")]
    ActuatorError(ActuatorError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            battery_low_v: 10.5,
            battery_high_v: 12.6,
        }
    }
}

impl LoopParams {
    /// Check the parameters describe a loop that can run.
    pub fn validate(&self) -> Result<(), ControlLoopError> {
        if !(self.rate_hz.is_finite() && self.rate_hz > 0.0) {
            return Err(ControlLoopError::InvalidParams(format!(
                "rate_hz must be a positive number, found {}",
                self.rate_hz
            )));
        }

        if !(self.battery_low_v.is_finite()
            && self.battery_high_v.is_finite()
            && self.battery_high_v > self.battery_low_v)
        {
            return Err(ControlLoopError::InvalidParams(format!(
                "battery_high_v ({}) must be greater than battery_low_v ({})",
                self.battery_high_v, self.battery_low_v
            )));
        }

        Ok(())
    }
}

impl LoopStats {
    /// Record one cycle's work time, returning true if it overran the period.
    fn record(&mut self, work: Duration, period: Duration) -> bool {
        self.num_ticks += 1;
        self.total_work += work;

        if work >= period {
            self.num_overruns += 1;
            self.consecutive_overruns += 1;
            self.max_consecutive_overruns =
                self.max_consecutive_overruns.max(self.consecutive_overruns);
            true
        } else {
            self.consecutive_overruns = 0;
            false
        }
    }

    /// Mean work time per cycle.
    pub fn mean_work(&self) -> Duration {
        if self.num_ticks == 0 {
            return Duration::from_secs(0);
        }

        Duration::from_secs_f64(self.total_work.as_secs_f64() / self.num_ticks as f64)
    }
}

impl<A: Actuator> ControlLoop<A> {
    /// Create a new loop which will drive the given actuator.
    pub fn new(
        params: LoopParams,
        ds: Arc<DataStore>,
        broadcaster: Arc<TmBroadcaster>,
        actuator: A,
    ) -> Result<Self, ControlLoopError> {
        // Take ownership first so a rejected loop still shuts the actuator down
        let actuator = ActuatorHandle {
            actuator,
            released: false,
        };

        params.validate()?;

        let last_num_resets = ds.safety.snapshot().num_resets;

        Ok(Self {
            params,
            ds,
            broadcaster,
            actuator,
            telem_log: None,
            last_num_resets,
            stats: LoopStats::default(),
        })
    }

    /// Archive every telemetry record to the given log.
    pub fn with_telem_log(mut self, telem_log: Box<dyn TelemetryLog>) -> Self {
        self.telem_log = Some(telem_log);
        self
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Execute a single cycle without any timing.
    pub fn tick(&mut self) -> Result<TelemetryRecord, ControlLoopError> {
        let input = self.ds.input.snapshot();
        let safety = self.ds.safety.snapshot();

        // A disarm or estop since the last cycle restarts the smoothing from zero
        let mut prev = self.ds.output.get();
        if safety.num_resets != self.last_num_resets {
            prev = CommandOutput::default();
            self.last_num_resets = safety.num_resets;
        }

        let out = shaper::shape(&input, safety.state, prev);
        self.ds.output.set(out);

        // Actuate
        let dems = MechDems {
            throttle_ms: out.throttle,
            steering_rad: out.steering,
            indicators: indicators(out.throttle, out.steering),
        };
        let sens: MechSensData = self
            .actuator
            .read_write(&dems)
            .map_err(ControlLoopError::ActuatorError)?;

        let record = TelemetryRecord {
            timestamp: Utc::now(),
            battery_pct: battery_pct(
                sens.battery_voltage_v,
                self.params.battery_low_v,
                self.params.battery_high_v,
            ),
            speed_mps: sens.speed_ms,
            throttle: out.throttle,
            steering: out.steering,
            armed: safety.state.is_armed(),
            estop: safety.state.is_estopped(),
        };

        trace!(
            "Cycle {}: {:?}, throttle {:.3}, steering {:.3}, battery {:.1}%",
            self.stats.num_ticks,
            safety.state,
            record.throttle,
            record.steering,
            record.battery_pct
        );

        // Archive
        if let Some(ref mut log) = self.telem_log {
            if let Err(e) = log.append(&record) {
                self.stats.num_log_errors += 1;
                let n = self.stats.num_log_errors;
                if n == 1 || n % LOG_ERROR_WARN_INTERVAL == 0 {
                    warn!("Could not write the telemetry log ({} failures): {}", n, e);
                }
            }
        }

        // Broadcast
        let report = self.broadcaster.broadcast(&record);
        if report.skipped > 0 || report.dropped > 0 {
            trace!("Telemetry broadcast: {:?}", report);
        }

        Ok(record)
    }

    /// Run the loop until cancelled or an actuator error occurs.
    ///
    /// The actuator is shut down before this function returns.
    pub fn run(mut self, cancel: &CancelToken) -> Result<LoopStats, ControlLoopError> {
        let timer = RateTimer::new(self.params.rate_hz);

        info!(
            "Control loop running at {} Hz (period {:?})",
            self.params.rate_hz,
            timer.period()
        );

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            let start = Instant::now();

            if let Err(e) = self.tick() {
                error!("Control loop stopping: {}", e);
                break Err(e);
            }

            let work = start.elapsed();
            if self.stats.record(work, timer.period()) {
                warn!(
                    "Cycle overran by {:.3} ms ({} consecutive)",
                    (work - timer.period()).as_secs_f64() * 1000.0,
                    self.stats.consecutive_overruns
                );
            }

            if cancel.wait_timeout(timer.time_to_next()) {
                break Ok(());
            }
        };

        self.actuator.shutdown();

        let stats = self.stats;
        info!(
            "Control loop stopped after {} cycles: {} overruns (max {} consecutive), \
            mean cycle work {:?}, {} telemetry log errors",
            stats.num_ticks,
            stats.num_overruns,
            stats.max_consecutive_overruns,
            stats.mean_work(),
            stats.num_log_errors
        );

        result.map(|_| stats)
    }
}

impl<A: Actuator> ActuatorHandle<A> {
    fn read_write(&mut self, dems: &MechDems) -> Result<MechSensData, ActuatorError> {
        if self.released {
            return Err(ActuatorError::Released);
        }

        self.actuator.read_write(dems)
    }

    /// Shut the actuator down if it hasn't been already.
    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.actuator.shutdown() {
            Ok(()) => info!("Actuator shut down"),
            Err(e) => error!("Actuator shutdown failed: {}", e),
        }
    }
}

impl<A: Actuator> Drop for ActuatorHandle<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Indicator light states for the given commands.
///
/// Lights 6 and 7 are always on. Steering left lights 0 and 2, steering right lights 1 and 3, and
/// reversing lights 5.
pub fn indicators(throttle: f64, steering: f64) -> [bool; NUM_INDICATORS] {
    let mut leds = [false, false, false, false, false, false, true, true];

    if steering > INDICATOR_STEER_THRESHOLD_RAD {
        leds[0] = true;
        leds[2] = true;
    } else if steering < -INDICATOR_STEER_THRESHOLD_RAD {
        leds[1] = true;
        leds[3] = true;
    }

    if throttle < 0.0 {
        leds[5] = true;
    }

    leds
}

/// Battery charge percentage for the given voltage.
///
/// Linear between `low_v` (0%) and `high_v` (100%), limited to [0, 100]. A non-finite voltage
/// reads as 0%.
pub fn battery_pct(voltage_v: f64, low_v: f64, high_v: f64) -> f64 {
    if !voltage_v.is_finite() {
        return 0.0;
    }

    clamp(&lin_map((low_v, high_v), (0.0, 100.0), voltage_v), &0.0, &100.0)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        actuator::{SimActuator, SimParams},
        safety::SafetyEvent,
        shaper::ShaperParams,
        tc_processor,
    };
    use comms_if::tc::{AxisPair, ControlPayload, Tc};

    fn new_loop() -> (Arc<DataStore>, ControlLoop<SimActuator>) {
        let ds = Arc::new(DataStore::new(ShaperParams::default()));
        let cl = ControlLoop::new(
            LoopParams::default(),
            ds.clone(),
            Arc::new(TmBroadcaster::new()),
            SimActuator::new(SimParams::default()),
        )
        .unwrap();

        (ds, cl)
    }

    fn full_throttle() -> Tc {
        Tc::Control(ControlPayload {
            left: Some(AxisPair { x: 0.0, y: 0.0 }),
            right: Some(AxisPair { x: 0.0, y: 1.0 }),
            ..Default::default()
        })
    }

    #[test]
    fn test_indicators() {
        assert_eq!(
            indicators(0.0, 0.0),
            [false, false, false, false, false, false, true, true]
        );
        assert_eq!(
            indicators(0.1, 0.5),
            [true, false, true, false, false, false, true, true]
        );
        assert_eq!(
            indicators(-0.1, -0.5),
            [false, true, false, true, false, true, true, true]
        );
        assert_eq!(indicators(0.0, 0.3), indicators(0.0, 0.0));
    }

    #[test]
    fn test_battery_pct() {
        assert_eq!(battery_pct(10.5, 10.5, 12.6), 0.0);
        assert_eq!(battery_pct(12.6, 10.5, 12.6), 100.0);
        assert!((battery_pct(11.55, 10.5, 12.6) - 50.0).abs() < 1e-9);
        assert_eq!(battery_pct(9.0, 10.5, 12.6), 0.0);
        assert_eq!(battery_pct(13.0, 10.5, 12.6), 100.0);
        assert_eq!(battery_pct(std::f64::NAN, 10.5, 12.6), 0.0);
    }

    #[test]
    fn test_params_validation() {
        assert!(LoopParams::default().validate().is_ok());

        for p in [
            LoopParams { rate_hz: 0.0, ..Default::default() },
            LoopParams { rate_hz: -5.0, ..Default::default() },
            LoopParams { rate_hz: std::f64::INFINITY, ..Default::default() },
            LoopParams { battery_low_v: 12.6, battery_high_v: 10.5, ..Default::default() },
        ]
        .iter()
        {
            assert!(matches!(
                p.validate(),
                Err(ControlLoopError::InvalidParams(_))
            ));
        }
    }

    #[test]
    fn test_stats() {
        let mut stats = LoopStats::default();
        let period = Duration::from_millis(20);

        assert!(!stats.record(Duration::from_millis(5), period));
        assert!(stats.record(Duration::from_millis(25), period));
        assert!(stats.record(Duration::from_millis(30), period));
        assert!(!stats.record(Duration::from_millis(20) - Duration::from_nanos(1), period));

        assert_eq!(stats.num_ticks, 4);
        assert_eq!(stats.num_overruns, 2);
        assert_eq!(stats.consecutive_overruns, 0);
        assert_eq!(stats.max_consecutive_overruns, 2);
    }

    #[test]
    fn test_disarmed_output_is_zero() {
        let (ds, mut cl) = new_loop();

        tc_processor::exec(&ds, &full_throttle());

        for _ in 0..5 {
            let rec = cl.tick().unwrap();
            assert_eq!(rec.throttle, 0.0);
            assert_eq!(rec.steering, 0.0);
            assert!(!rec.armed);
        }
    }

    #[test]
    fn test_seed_reset_on_disarm() {
        let (ds, mut cl) = new_loop();
        let s = ShaperParams::default().smoothing;
        let c = ShaperParams::default().max_speed;

        tc_processor::exec(&ds, &full_throttle());
        tc_processor::exec(&ds, &Tc::Arm);

        for _ in 0..10 {
            cl.tick().unwrap();
        }
        assert!(ds.output.get().throttle > 0.9 * c);

        // Cycle through a disarm without a tick in between
        tc_processor::exec(&ds, &Tc::Disarm);
        ds.safety.apply(SafetyEvent::Arm);

        // Stale write-back from a cycle which raced the disarm
        ds.output.set(CommandOutput {
            throttle: c,
            steering: 0.0,
        });

        // Smoothing restarts from zero
        let rec = cl.tick().unwrap();
        assert!((rec.throttle - c * (1.0 - s)).abs() < 1e-9);
    }

    #[test]
    fn test_estop_is_immediate() {
        let (ds, mut cl) = new_loop();

        tc_processor::exec(&ds, &full_throttle());
        tc_processor::exec(&ds, &Tc::Arm);
        cl.tick().unwrap();

        tc_processor::exec(&ds, &Tc::EStop);
        assert_eq!(ds.output.get(), CommandOutput::default());

        let rec = cl.tick().unwrap();
        assert_eq!(rec.throttle, 0.0);
        assert!(rec.estop);
        assert!(!rec.armed);
    }
}
