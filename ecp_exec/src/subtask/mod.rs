//! # Subtasks
//!
//! A subtask composes generators to carry out one MP command. Unlike a generator it runs to
//! completion in a single call and reports the total number of generator steps it ran.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod poses_file;

pub use poses_file::{JointPose, PosesFile};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::task::NextStateCmd;

use crate::{edp_link::EdpLink, generator::GeneratorError};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Subtask {
    /// Name the subtask is registered under.
    fn name(&self) -> &str;

    /// Carry out the command, returning the number of generator steps run.
    fn execute(&mut self, cmd: &NextStateCmd, edp: &mut dyn EdpLink)
        -> Result<u64, GeneratorError>;
}
