//! # Master Process Executable
//!
//! Runs a task script over the robots listed in `mp_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use comms_if::net::zmq;
use mp_lib::{
    params::MpExecParams,
    script::{Script, ScriptOutcome, ScriptedTask},
    task::MpTask,
    transport::ZmqTransport,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(StructOpt, Debug)]
#[structopt(name = "mp_exec", about = "Master process of a multi-robot task")]
struct Opts {
    /// Path to the task script to run
    #[structopt(parse(from_os_str))]
    script: PathBuf,
}

#[derive(Serialize)]
struct TaskSummary {
    script: PathBuf,
    num_steps: usize,
    outcome: ScriptOutcome,
    duration_s: f64,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("mp_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Master Process Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS AND SCRIPT ----

    let params: MpExecParams =
        util::params::load("mp_exec.toml").wrap_err("Could not load MP params")?;

    let script = Script::load(&opts.script)
        .wrap_err_with(|| format!("Could not load the task script {:?}", opts.script))?;
    let scripted_task = ScriptedTask::new(script);

    info!(
        "Loaded {} steps for robots {:?}",
        scripted_task.num_steps(),
        params.robot_names()
    );

    // ---- NETWORK INITIALISATION ----

    let zmq_ctx = zmq::Context::new();
    let transport = ZmqTransport::new(&zmq_ctx, &params).wrap_err("Failed to bind the MP sockets")?;

    let mut task = MpTask::new(transport, &params.robot_names()[..]);

    // ---- RUN ----

    let start_s = session::get_elapsed_seconds();
    let result = scripted_task.run(&mut task);

    // The ECPs are released whatever happened
    task.terminate_all();

    let result = match result {
        Ok(outcome) => {
            session.save(
                "task_summary.json",
                TaskSummary {
                    script: opts.script.clone(),
                    num_steps: scripted_task.num_steps(),
                    outcome: outcome.clone(),
                    duration_s: session::get_elapsed_seconds() - start_s,
                },
            );

            match outcome {
                ScriptOutcome::Completed => {
                    info!("Task complete");
                    Ok(())
                }
                ScriptOutcome::Aborted { step, nacked } => {
                    warn!("Task aborted at step {}", step);
                    Err(eyre!(
                        "Task aborted at step {}, failed robots: {:?}",
                        step,
                        nacked
                    ))
                }
            }
        }
        Err(e) => Err(e).wrap_err("Task failed"),
    };

    session.exit();

    result
}
