//! # Effector Control Executable
//!
//! Runs the generators of one robot on command of the MP.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::info;
use structopt::StructOpt;

// Internal
use comms_if::net::zmq;
use ecp_lib::{
    edp_link::ZmqEdpLink, mp_link::ZmqMpLink, params::EcpExecParams, registry::Registry,
    task::EcpTask,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(StructOpt, Debug)]
#[structopt(name = "ecp_exec", about = "Effector control process of one robot")]
struct Opts {
    /// Name of the robot, parameters are read from `ecp_<robot>.toml`
    robot: String,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new_tagged("ecp_exec", &opts.robot, "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Effector Control Executable, robot \"{}\"\n", opts.robot);
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: EcpExecParams = util::params::load(&format!("ecp_{}.toml", opts.robot))
        .wrap_err("Could not load ECP params")?;

    info!("Parameters loaded");

    // ---- REGISTRY ----

    let registry = Registry::with_defaults(params.polling);
    info!("Registered: {}", registry.names().join(", "));

    // ---- NETWORK INITIALISATION ----

    let zmq_ctx = zmq::Context::new();

    let edp = ZmqEdpLink::new(&zmq_ctx, &params).wrap_err("Failed to connect to the EDP")?;
    let mp = ZmqMpLink::new(&zmq_ctx, &params).wrap_err("Failed to connect to the MP")?;

    info!("Network initialised");

    // ---- MAIN LOOP ----

    let mut task = EcpTask::new(&opts.robot, registry, mp, edp);
    let result = task.run().wrap_err("ECP task failed");

    session.exit();

    result
}
