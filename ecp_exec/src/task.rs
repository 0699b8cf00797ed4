//! # ECP task
//!
//! The dispatcher of one robot's ECP. Commands from the MP are handled one at a time:
//!
//! ```text
//! IDLE --command--> DISPATCHING --resolved--> EXECUTING --done/failed--> REPORTING --> IDLE
//! ```
//!
//! A command naming a generator or subtask which is not registered, or addressed to another
//! robot, means the MP and this ECP are not built from the same configuration. This is fatal to
//! the task rather than reported as a failed command.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use std::{fmt, time::Instant};
use thiserror::Error;

use comms_if::task::{EcpNotification, EcpReply, MpCommand, NextStateCmd};

use crate::{
    edp_link::EdpLink,
    generator::{self, GeneratorError},
    mp_link::{MpLink, MpLinkError},
    registry::{Registry, Target},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct EcpTask<M: MpLink, E: EdpLink> {
    robot: String,
    registry: Registry,
    mp: M,
    edp: E,
    state: EcpState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcpState {
    /// Waiting for a command from the MP
    Idle,

    /// A command was received and is being resolved
    Dispatching,

    /// A generator or subtask is running
    Executing,

    /// The outcome is being sent to the MP
    Reporting,
}

/// What the task loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

#[derive(Debug, Error)]
pub enum EcpError {
    #[error("No generator or subtask named {0:?} is registered")]
    UnknownCommand(String),

    #[error("Received a command for robot {found:?}, this ECP drives {expected:?}")]
    WrongRobot { expected: String, found: String },

    #[error("MP link error: {0}")]
    MpLink(#[from] MpLinkError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<M: MpLink, E: EdpLink> EcpTask<M, E> {
    pub fn new(robot: &str, registry: Registry, mp: M, edp: E) -> Self {
        Self {
            robot: robot.to_string(),
            registry,
            mp,
            edp,
            state: EcpState::Idle,
        }
    }

    pub fn state(&self) -> EcpState {
        self.state
    }

    pub fn mp(&self) -> &M {
        &self.mp
    }

    pub fn edp(&self) -> &E {
        &self.edp
    }

    /// Serve commands until the MP sends `Terminate`.
    pub fn run(&mut self) -> Result<(), EcpError> {
        info!("ECP {} waiting for commands", self.robot);

        loop {
            let cmd = match self.mp.recv_command()? {
                Some(c) => c,
                None => continue,
            };

            if self.handle(cmd)? == Flow::Terminate {
                info!("ECP {} terminating", self.robot);
                return Ok(());
            }
        }
    }

    /// Handle one command from the MP, leaving the task idle again.
    pub fn handle(&mut self, cmd: MpCommand) -> Result<Flow, EcpError> {
        let cmd = match cmd {
            MpCommand::NextState(c) => c,
            MpCommand::Terminate => return Ok(Flow::Terminate),
        };

        let start = Instant::now();
        self.set_state(EcpState::Dispatching);

        if let Err(e) = self.dispatch(&cmd) {
            error!("{}", e);
            // Let the MP see the failure before this ECP goes away
            self.report(start, 0, Err(e.to_string()));
            return Err(e);
        }

        self.set_state(EcpState::Executing);
        let outcome = self.execute(&cmd);

        let (num_steps, result) = match outcome {
            Ok(n) => (n, Ok(())),
            Err(e) => {
                error!("{} on {} failed: {}", cmd.name, self.robot, e);
                (0, Err(e.to_string()))
            }
        };

        self.report(start, num_steps, result);

        Ok(Flow::Continue)
    }

    /// Check the command can be run by this ECP.
    fn dispatch(&mut self, cmd: &NextStateCmd) -> Result<(), EcpError> {
        if cmd.robot != self.robot {
            return Err(EcpError::WrongRobot {
                expected: self.robot.clone(),
                found: cmd.robot.clone(),
            });
        }

        if !self.registry.contains(&cmd.name) {
            return Err(EcpError::UnknownCommand(cmd.name.clone()));
        }

        debug!(
            "Dispatching {} (variant {}, {} byte payload)",
            cmd.name,
            cmd.variant,
            cmd.payload.len()
        );

        Ok(())
    }

    fn execute(&mut self, cmd: &NextStateCmd) -> Result<u64, GeneratorError> {
        let edp = &mut self.edp;

        match self.registry.resolve(&cmd.name) {
            Some(Target::Generator(g)) => {
                g.configure(cmd)?;
                generator::run(g, edp)
            }
            Some(Target::Subtask(s)) => s.execute(cmd, edp),
            None => Err(GeneratorError::Empty(format!("registry entry {}", cmd.name))),
        }
    }

    /// Send the outcome to the MP. A notification which cannot be sent is logged and dropped.
    fn report(&mut self, start: Instant, num_steps: u64, result: Result<(), String>) {
        self.set_state(EcpState::Reporting);

        let notification = EcpNotification {
            robot: self.robot.clone(),
            reply: match result {
                Ok(()) => EcpReply::Completed,
                Err(reason) => EcpReply::Nack { reason },
            },
            elapsed_s: start.elapsed().as_secs_f64(),
            num_steps,
        };

        if let Err(e) = self.mp.notify(&notification) {
            warn!("Could not notify the MP: {}", e);
        }

        self.set_state(EcpState::Idle);
    }

    fn set_state(&mut self, state: EcpState) {
        debug!("ECP {}: {} -> {}", self.robot, self.state, state);
        self.state = state;
    }
}

impl fmt::Display for EcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EcpState::Idle => "IDLE",
            EcpState::Dispatching => "DISPATCHING",
            EcpState::Executing => "EXECUTING",
            EcpState::Reporting => "REPORTING",
        };
        f.write_str(s)
    }
}
