//! # Effector Control Process library
//!
//! Runs generators and subtasks for one robot on command of the MP, talking to the robot's EDP.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod edp_link;
pub mod generator;
pub mod mp_link;
pub mod params;
pub mod registry;
pub mod subtask;
pub mod task;

#[cfg(test)]
mod test_util;
