//! # Effector Driver Library
//!
//! The effector driver process (EDP) owns the motor controllers of one robot. It serves the
//! commands of the robot's ECP over a REP socket.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod edp_server;
pub mod effector;
pub mod kinematics;
pub mod params;
