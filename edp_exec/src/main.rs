//! # Effector Driver Executable
//!
//! Drives the axes of one robot on command of the robot's ECP. The axes live on a simulated CAN
//! bus.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{info, warn};
use std::sync::{Arc, Mutex};
use structopt::StructOpt;

// Internal
use comms_if::{eqpt::edp::EdpResponse, net::{zmq, NetError}};
use edp_lib::{
    edp_server::{EdpServer, EdpServerError},
    effector::Effector,
    kinematics::JointScaling,
    params::EdpExecParams,
};
use epos::SimGateway;
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(StructOpt, Debug)]
#[structopt(name = "edp_exec", about = "Effector driver of one robot")]
struct Opts {
    /// Name of the robot, parameters are read from `edp_<robot>.toml`
    robot: String,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new_tagged("edp_exec", &opts.robot, "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Effector Driver Executable, robot \"{}\"\n", opts.robot);
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: EdpExecParams = util::params::load(&format!("edp_{}.toml", opts.robot))
        .wrap_err("Could not load EDP params")?;

    info!("Parameters loaded");

    // ---- EFFECTOR INITIALISATION ----

    let mut bus = SimGateway::new(params.sim_timing);
    for axis in params.axes.iter() {
        bus.add_node(axis.node_id);
    }

    let model = Box::new(JointScaling::new(&params.axes));

    let mut effector = Effector::new(&opts.robot, Arc::new(Mutex::new(bus)), &params, model)
        .wrap_err("Failed to initialise the effector")?;

    info!("Effector initialised with {} axes", effector.num_axes());

    // ---- SERVER INITIALISATION ----

    let zmq_ctx = zmq::Context::new();
    let mut server = EdpServer::new(&zmq_ctx, &params).wrap_err("Failed to initialise server")?;

    info!("Server initialised, waiting for commands");

    // ---- MAIN LOOP ----

    loop {
        let response = match server.get_command() {
            Ok(Some(cmd)) => effector.handle(&cmd),
            Ok(None) => continue,
            Err(EdpServerError::NetError(NetError::DeserializeError(e))) => {
                warn!("Could not deserialize command: {}", e);
                EdpResponse::Invalid {
                    reason: format!("Could not deserialize command: {}", e),
                }
            }
            Err(EdpServerError::NetError(NetError::NonUtf8Message)) => EdpResponse::Invalid {
                reason: "Command is not valid UTF-8".into(),
            },
            Err(e) => {
                warn!("Could not recieve a command: {}", e);
                continue;
            }
        };

        if let Err(e) = server.send_response(&response) {
            warn!("Couldn't send response to the ECP: {}", e);
        }
    }
}
