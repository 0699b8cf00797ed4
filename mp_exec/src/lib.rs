//! # Master Process library
//!
//! Sequences commands to the ECPs of every robot taking part in a task and synchronises them at
//! barriers.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod params;
pub mod script;
pub mod task;
pub mod transport;
pub mod workers;

#[cfg(test)]
mod test_util;
