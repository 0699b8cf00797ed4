//! # Generators
//!
//! A generator is one motion or behaviour primitive of the ECP. It is configured from the MP's
//! [`NextStateCmd`] and then driven through two phases:
//!
//! - [`Generator::first_step`] runs once, typically sending the first request to the EDP,
//! - [`Generator::next_step`] is called until it returns `false`.
//!
//! Steps are never interrupted, a generator which is asked to stop will only see the request once
//! its current step has returned.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod epos_command;
mod epos_control;
mod epos_homing;
mod sleep;
mod teach_in;
mod transparent;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use epos_command::{EposCommand, MotionKind};
pub use epos_control::EposControl;
pub use epos_homing::EposHoming;
pub use sleep::Sleep;
pub use teach_in::{TeachIn, TeachInPose};
pub use transparent::Transparent;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::path::PathBuf;
use thiserror::Error;

use comms_if::{
    eqpt::edp::{EdpCommand, EdpStatus},
    task::{NextStateCmd, PayloadError},
};
use util::time::Ticker;

use crate::{
    edp_link::{EdpLink, EdpLinkError},
    params::PollParams,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Generator {
    /// Name the generator is registered under.
    fn name(&self) -> &str;

    /// Prepare the generator for a new run from the MP's command.
    ///
    /// The same instance is reused for every command naming it, any state of a previous run must
    /// be reset here.
    fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError>;

    /// One-time setup. Returns `true` if [`Generator::next_step`] must be called.
    fn first_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError>;

    /// One polling step. Returns `false` once the behaviour is complete.
    fn next_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Follows a motion on the EDP by polling its status at a fixed period.
#[derive(Debug, Clone)]
pub struct MotionMonitor {
    params: PollParams,
    ticker: Ticker,
    polls: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Variant {0} is not supported by this generator")]
    InvalidVariant(i32),

    #[error(transparent)]
    Edp(#[from] EdpLinkError),

    #[error("Axes in fault: {0}")]
    Fault(String),

    #[error("Axes not referenced after homing: {0}")]
    NotReferenced(String),

    #[error("Motion did not finish after {0} polls")]
    Timeout(u64),

    #[error("Cannot read {0:?}: {1}")]
    FileLoad(PathBuf, std::io::Error),

    #[error("Cannot parse {0:?}: {1}")]
    InvalidFile(PathBuf, serde_json::Error),

    #[error("{0} is empty")]
    Empty(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotionMonitor {
    pub fn new(params: PollParams) -> Self {
        Self {
            params,
            ticker: Ticker::new(params.period()),
            polls: 0,
        }
    }

    /// Restart the poll schedule and count for a new motion.
    pub fn restart(&mut self) {
        self.ticker = Ticker::new(self.params.period());
        self.polls = 0;
    }

    /// Send a motion request and check its immediate outcome.
    pub fn start(
        &mut self,
        edp: &mut dyn EdpLink,
        cmd: &EdpCommand,
    ) -> Result<EdpStatus, GeneratorError> {
        self.restart();
        let status = edp.request(cmd)?;
        check_faults(&status)?;
        Ok(status)
    }

    /// Wait one period and read the status. Returns `true` while the motion is in progress.
    pub fn poll(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        if self.polls >= self.params.max_polls() {
            warn!("Motion abandoned after {} polls", self.polls);
            return Err(GeneratorError::Timeout(self.polls));
        }

        self.ticker.wait();
        self.polls += 1;

        let status = edp.request(&EdpCommand::GetStatus)?;
        check_faults(&status)?;

        Ok(status.motion_in_progress())
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Drive a configured generator to completion.
///
/// Returns the number of steps run, counting the first step.
pub fn run(generator: &mut dyn Generator, edp: &mut dyn EdpLink) -> Result<u64, GeneratorError> {
    let mut num_steps = 1;

    let mut more = generator.first_step(edp)?;

    while more {
        num_steps += 1;
        more = generator.next_step(edp)?;
    }

    debug!("{} finished after {} steps", generator.name(), num_steps);

    Ok(num_steps)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_faults(status: &EdpStatus) -> Result<(), GeneratorError> {
    if !status.any_fault() {
        return Ok(());
    }

    let faulted: Vec<&str> = status
        .axes
        .iter()
        .filter(|a| a.fault)
        .map(|a| a.name.as_str())
        .collect();

    Err(GeneratorError::Fault(faulted.join(", ")))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{sim_edp, CountingEdp};

    /// Completes after a fixed number of next steps.
    struct Countdown {
        remaining: u32,
        next_calls: u32,
    }

    impl Generator for Countdown {
        fn name(&self) -> &str {
            "countdown"
        }

        fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError> {
            self.remaining = cmd.payload_json()?;
            self.next_calls = 0;
            Ok(())
        }

        fn first_step(&mut self, _edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
            Ok(self.remaining > 0)
        }

        fn next_step(&mut self, _edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
            self.next_calls += 1;
            self.remaining -= 1;
            Ok(self.remaining > 0)
        }
    }

    #[test]
    fn test_run_stops_on_false() {
        let mut edp = CountingEdp::default();
        let mut gen = Countdown {
            remaining: 0,
            next_calls: 0,
        };

        gen.configure(&NextStateCmd::with_json("irp6", "countdown", 0, &3u32).unwrap())
            .unwrap();
        assert_eq!(run(&mut gen, &mut edp).unwrap(), 4);
        assert_eq!(gen.next_calls, 3);

        // No next step at all if the first step is enough
        gen.configure(&NextStateCmd::with_json("irp6", "countdown", 0, &0u32).unwrap())
            .unwrap();
        assert_eq!(run(&mut gen, &mut edp).unwrap(), 1);
        assert_eq!(gen.next_calls, 0);
    }

    #[test]
    fn test_monitor_reports_faults() {
        let (mut edp, bus) = sim_edp();
        let mut monitor = MotionMonitor::new(PollParams {
            poll_period_ms: 1,
            motion_timeout_s: 1.0,
        });

        monitor.start(&mut edp, &EdpCommand::Enable).unwrap();
        bus.lock().unwrap().inject_fault(2, &[0x8611]);

        match monitor.poll(&mut edp) {
            Err(GeneratorError::Fault(axes)) => assert_eq!(axes, "joint_2"),
            r => panic!("Unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_monitor_timeout() {
        let mut edp = CountingEdp::moving();
        let mut monitor = MotionMonitor::new(PollParams {
            poll_period_ms: 1,
            motion_timeout_s: 0.005,
        });

        let mut result = Ok(true);
        while let Ok(true) = result {
            result = monitor.poll(&mut edp);
        }

        assert!(matches!(result, Err(GeneratorError::Timeout(5))));
        assert_eq!(edp.requests.len(), 5);
    }
}
