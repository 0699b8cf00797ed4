//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the messages exchanged between
//! the master process and the effector control processes, the equipment messages exchanged
//! between an effector control process and its effector driver, and the network abstractions used
//! to carry them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Commands and notifications exchanged between the MP and the ECPs
pub mod task;

/// Command and response definitions for equipment (the effector drivers)
pub mod eqpt;

/// Network module
pub mod net;
