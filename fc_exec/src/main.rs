//! Velocity bridge executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Start the clients, which write the flight controller and planner data into the sampler
//!       from their own threads
//!     - Startup sequence:
//!         - Wait for the flight controller link
//!         - Stream neutral setpoints
//!     - Main loop, at the control rate:
//!         - Snapshot the inputs
//!         - Select the control mode
//!         - Velocity control processing
//!         - Publish the setpoint and telemetry
//!
//! The exec stops on SIGINT.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::{info, warn};
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

// Internal
use comms_if::net::NetParams;
use fc_lib::{
    ctrl_loop::CtrlLoop,
    fc_client::FcClient,
    params::ExecParams,
    planner_client::PlannerClient,
    sampler::StateSampler,
    setpoint_server::SetpointServer,
    startup::{StartupError, StartupSequencer},
    tm_server::TmServer,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "fc_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Offboard Velocity Bridge Executable\n");
    info!(
        "Software root: {:?}",
        host::get_sw_root().wrap_err("Failed to get the software root")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ExecParams = util::params::load("fc_exec.toml")
        .wrap_err("Could not load exec params")?;
    exec_params.validate()
        .wrap_err("Invalid exec params")?;

    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load net params")?;

    session.archive_params("fc_exec.toml", &exec_params)
        .wrap_err("Could not archive exec params")?;
    session.archive_params("net.toml", &net_params)
        .wrap_err("Could not archive net params")?;

    info!("Exec parameters loaded");

    // ---- SHUTDOWN HANDLING ----

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            warn!("Shutdown requested");
            shutdown.store(true, Ordering::Relaxed);
        }).wrap_err("Failed to set the SIGINT handler")?;
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let sampler = StateSampler::new();

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let _fc_client = {
        let c = FcClient::new(&zmq_ctx, &net_params, sampler.clone())
            .wrap_err("Failed to initialise FcClient")?;
        info!("FcClient initialised");
        c
    };

    let _planner_client = {
        let c = PlannerClient::new(&zmq_ctx, &net_params, sampler.clone())
            .wrap_err("Failed to initialise PlannerClient")?;
        info!("PlannerClient initialised");
        c
    };

    let mut setpoint_server = {
        let s = SetpointServer::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise SetpointServer")?;
        info!("SetpointServer initialised");
        s
    };

    let mut tm_server = {
        let s = TmServer::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise TmServer")?;
        info!("TmServer initialised");
        s
    };

    info!("Network initialisation complete\n");

    // ---- STARTUP ----

    let mut ctrl_loop = CtrlLoop::new(&exec_params, sampler.clone())
        .wrap_err("Failed to initialise the control loop")?;

    let mut startup = StartupSequencer::new(&exec_params)
        .wrap_err("Failed to initialise the startup sequence")?;

    match startup.run(&sampler, &mut setpoint_server, &shutdown) {
        Ok(()) => (),
        Err(StartupError::Shutdown) => {
            info!("Shutdown during startup, end of execution");
            return Ok(())
        },
        Err(e) => return Err(e).wrap_err("Startup sequence failed")
    }

    if !setpoint_server.connected() {
        warn!("Nothing is subscribed to the setpoints, the flight controller won't receive them");
    }

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    ctrl_loop.run(&mut setpoint_server, &mut tm_server, &shutdown)
        .wrap_err("Control loop failed")?;

    // ---- SHUTDOWN ----

    info!("End of execution");

    Ok(())
}
