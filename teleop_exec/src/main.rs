//! Main teleoperation executable entry point.
//!
//! # Architecture
//!
//! The executable is made of three concurrent parts:
//!
//!     - A TC source, either the session server accepting remote clients or a TC script, which
//!       updates the operator input and the safety state whenever a TC arrives.
//!     - The control loop, which at a fixed rate shapes the latest input into actuator demands,
//!       actuates them and produces telemetry.
//!     - The telemetry broadcaster, which fans telemetry out to the connected clients and the
//!       optional telemetry publisher.
//!
//! The executable runs until Ctrl+C is pressed, the TC script ends, or the actuator fails. In all
//! cases the actuator is shut down before exiting.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use color_eyre::{Report, eyre::WrapErr};
use structopt::StructOpt;

// Internal
use comms_if::net::zmq;
use teleop_lib::{
    actuator::{Actuator, MechClient, SimActuator},
    ctrl_loop::{CancelToken, ControlLoop, ControlLoopError, LoopParams, LoopStats},
    data_store::DataStore,
    params::{ActuatorKind, TeleopExecParams},
    session_server::SessionServer,
    tc_processor,
    telem_log::CsvTelemLog,
    tm_broadcast::TmBroadcaster,
    tm_server::TmServer,
};
use util::{
    logger::{logger_init, LevelFilter},
    params::LoadError,
    session::{self, Session},
    script_interpreter::{ScriptInterpreter, PendingTcs},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Interval at which the script is checked for pending TCs.
const SCRIPT_POLL_PERIOD: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(StructOpt)]
#[structopt(name = "teleop_exec", about = "Teleoperation control executable")]
struct Opt {
    /// Parameter file to use instead of params/teleop_exec.toml
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Control loop rate in Hz
    #[structopt(long)]
    rate: Option<f64>,

    /// Path of the CSV telemetry log
    #[structopt(long, parse(from_os_str))]
    log: Option<PathBuf>,

    /// Actuator to drive, "sim" or "mech"
    #[structopt(long)]
    actuator: Option<ActuatorKind>,

    /// Log at debug level
    #[structopt(short, long)]
    verbose: bool,

    /// TC script to execute instead of accepting remote clients
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "teleop_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = match opt.verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info
    };
    logger_init(level, &session.log_file_path)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Teleoperation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: TeleopExecParams = match opt.params {
        Some(ref p) => util::params::load_from_path(p),
        None => match util::params::load("teleop_exec.toml") {
            Err(LoadError::FileLoadError(p, e)) if e.kind() == ErrorKind::NotFound => {
                warn!("No parameter file at {:?}, using defaults", p);
                Ok(TeleopExecParams::default())
            },
            r => r
        }
    }.wrap_err("Could not load teleop_exec params")?;

    // Command line overrides
    if let Some(rate) = opt.rate {
        params.ctrl_loop.rate_hz = rate;
    }
    if let Some(ref log) = opt.log {
        params.log_path = log.clone();
    }
    if let Some(a) = opt.actuator {
        params.actuator = a;
    }

    params.ctrl_loop.validate().wrap_err("Invalid parameters")?;

    info!("Exec parameters loaded: {:#?}", params);

    // ---- INITIALISE DATASTORE ----

    let ds = Arc::new(DataStore::new(params.shaper));
    let broadcaster = Arc::new(TmBroadcaster::new());

    let log_path = session.resolve(&params.log_path);
    let telem_log = CsvTelemLog::new(&log_path)
        .wrap_err("Failed to create the telemetry log")?;
    info!("Telemetry log: {:?}", telem_log.path());

    // ---- SIGNAL HANDLING ----

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            info!("Stop requested");
            cancel.cancel();
        }).wrap_err("Failed to set the Ctrl+C handler")?;
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    if let Some(ref endpoint) = params.net.tm_endpoint {
        let s = TmServer::new(&zmq_ctx, endpoint)
            .wrap_err("Failed to initialise TmServer")?;
        broadcaster.subscribe(Arc::new(s));
        info!("TmServer publishing on {}", endpoint);
    }

    // ---- INITIALISE TC SOURCE ----

    let mut session_server = None;
    let mut script_thread = None;

    match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path)
                .wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            let ds = ds.clone();
            let cancel = cancel.clone();
            script_thread = Some(
                thread::Builder::new()
                    .name(String::from("tc_script"))
                    .spawn(move || run_script(si, &ds, &cancel))
                    .wrap_err("Failed to start the script thread")?
            );
        },
        None => {
            info!("No script provided, remote control via the SessionServer will be used\n");

            session_server = Some(
                SessionServer::start(&zmq_ctx, &params.net, ds.clone(), broadcaster.clone())
                    .wrap_err("Failed to initialise the SessionServer")?
            );
        }
    }

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    let result = match params.actuator {
        ActuatorKind::Sim => {
            info!("Driving the simulated vehicle");
            run_loop(
                params.ctrl_loop,
                ds,
                broadcaster,
                SimActuator::new(params.sim),
                telem_log,
                &cancel
            )
        },
        ActuatorKind::Mech => {
            let mech_client = MechClient::new(&zmq_ctx, &params.net)
                .wrap_err("Failed to initialise MechClient")?;
            info!("MechClient initialised");

            run_loop(params.ctrl_loop, ds, broadcaster, mech_client, telem_log, &cancel)
        }
    };

    // ---- SHUTDOWN ----

    // Stop the TC source
    cancel.cancel();
    if let Some(jh) = script_thread {
        if jh.join().is_err() {
            warn!("Script thread panicked");
        }
    }
    if let Some(mut s) = session_server {
        s.stop();
    }

    let stats = result.wrap_err("Control loop failed")?;

    info!("End of execution after {} cycles", stats.num_ticks);

    Ok(())
}

/// Build and run the control loop for the given actuator.
fn run_loop<A: Actuator>(
    params: LoopParams,
    ds: Arc<DataStore>,
    broadcaster: Arc<TmBroadcaster>,
    actuator: A,
    telem_log: CsvTelemLog,
    cancel: &CancelToken
) -> Result<LoopStats, ControlLoopError> {
    info!("Begining main loop\n");

    ControlLoop::new(params, ds, broadcaster, actuator)?
        .with_telem_log(Box::new(telem_log))
        .run(cancel)
}

/// Execute the script's TCs as the session clock passes them, cancelling the loop at the end.
fn run_script(mut si: ScriptInterpreter, ds: &DataStore, cancel: &CancelToken) {
    loop {
        match si.get_pending_tcs(session::get_elapsed_seconds()) {
            PendingTcs::None => (),
            PendingTcs::Some(tc_vec) => {
                for tc in tc_vec.iter() {
                    tc_processor::exec(ds, tc);
                }
            },
            // Exit if end of script reached
            PendingTcs::EndOfScript => {
                info!("End of TC script reached, stopping");
                cancel.cancel();
                break
            }
        }

        if cancel.wait_timeout(SCRIPT_POLL_PERIOD) {
            break
        }
    }
}
