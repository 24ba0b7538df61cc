//! # Mechanisms Control Executable
//!
//! This executable is responsible for controlling the mechanisms of the vehicle:
//! - The drive motor and steering servo
//! - The indicator lights
//!
//! Demands are served in front of the simulated vehicle. If no request arrives within the safe
//! timeout the vehicle is brought to rest until the client returns.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Mechanisms server abstraction.
mod mech_server;

/// Parameters for the mechanisms executable.
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use std::io::ErrorKind;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use comms_if::{
    eqpt::mech::{MechDems, MechRequest, MechResponse},
    net::zmq
};
use log::{info, warn, trace};
use color_eyre::{Result, eyre::WrapErr};

// Internal
use mech_server::MechServer;
use params::MechExecParams;
use teleop_lib::actuator::{Actuator, SimActuator};
use util::{
    logger::{logger_init, LevelFilter},
    params::LoadError,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "mech_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Info, &session.log_file_path)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Mechanisms Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: MechExecParams = match util::params::load("mech_exec.toml") {
        Err(LoadError::FileLoadError(p, e)) if e.kind() == ErrorKind::NotFound => {
            warn!("No parameter file at {:?}, using defaults", p);
            Ok(MechExecParams::default())
        },
        r => r
    }.wrap_err("Could not load mech_exec params")?;

    info!("Parameters loaded");

    // ---- SIGNAL HANDLING ----

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))
            .wrap_err("Failed to set the Ctrl+C handler")?;
    }

    // ---- SERVER INITIALISATION ----

    let zmq_ctx = zmq::Context::new();

    let mut server: MechServer = MechServer::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise server")?;

    info!("Server listening on {}", params.demands_endpoint);

    let mut plant = SimActuator::new(params.sim);

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop in safe mode");

    let mut safe_mode = true;

    while running.load(Ordering::Relaxed) {
        // Get request from client
        let request = match server.get_request() {
            Some(r) => {
                if safe_mode {
                    info!("Recieved valid request, exiting safe mode");
                    safe_mode = false;
                }
                r
            },
            None => {
                if !safe_mode {
                    warn!("No request from the client, entering safe mode");
                    safe_mode = true;
                }

                // Bring the vehicle to rest
                if !plant.is_released() {
                    plant.read_write(&MechDems::default()).ok();
                }
                continue
            }
        };

        trace!("Recieved {:?}", request);

        let response = handle_request(&mut plant, &request);

        // Send response to client
        match server.send_response(&response) {
            Ok(_) => (),
            Err(e) => {
                warn!("Couldn't send response to client ({}), entering safe mode", e);
                safe_mode = true;
                continue
            }
        }
    }

    info!("Stop requested, shutting down");

    plant.shutdown().wrap_err("Failed to shut down the vehicle")?;

    Ok(())
}

/// Execute a request against the vehicle, returning the response for the client.
fn handle_request(plant: &mut SimActuator, request: &MechRequest) -> MechResponse {
    match request {
        MechRequest::Demands(dems) => {
            if !dems.is_valid() {
                warn!("Rejecting invalid demands: {:?}", dems);
                return MechResponse::DemsInvalid
            }

            // A new demand after a shutdown takes the vehicle back
            if plant.is_released() {
                plant.acquire();
            }

            match plant.read_write(dems) {
                Ok(sens) => MechResponse::DemsOk(sens),
                Err(e) => {
                    warn!("Could not actuate demands: {}", e);
                    MechResponse::EqptInvalid
                }
            }
        },
        MechRequest::Shutdown => {
            info!("Shutdown requested by the client");

            match plant.shutdown() {
                Ok(()) => MechResponse::ShutdownOk,
                Err(e) => {
                    warn!("Could not shut down the vehicle: {}", e);
                    MechResponse::EqptInvalid
                }
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use teleop_lib::actuator::SimParams;

    #[test]
    fn test_invalid_demands() {
        let mut plant = SimActuator::new(SimParams::default());
        let dems = MechDems {
            throttle_ms: std::f64::NAN,
            ..Default::default()
        };

        assert_eq!(
            handle_request(&mut plant, &MechRequest::Demands(dems)),
            MechResponse::DemsInvalid
        );
    }

    #[test]
    fn test_shutdown_and_reacquire() {
        let mut plant = SimActuator::new(SimParams::default());

        assert!(matches!(
            handle_request(&mut plant, &MechRequest::Demands(MechDems::default())),
            MechResponse::DemsOk(_)
        ));
        assert_eq!(
            handle_request(&mut plant, &MechRequest::Shutdown),
            MechResponse::ShutdownOk
        );
        assert!(plant.is_released());

        assert!(matches!(
            handle_request(&mut plant, &MechRequest::Demands(MechDems::default())),
            MechResponse::DemsOk(_)
        ));
        assert!(!plant.is_released());
    }
}
