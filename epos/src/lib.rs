//! # EPOS library
//!
//! Driver for Maxon EPOS motor controllers on a CANopen bus, following the CiA-402 device profile.
//!
//! The driver talks to the bus through a [`gateway::Gateway`]. [`sim::SimGateway`] provides a
//! simulated bus of EPOS nodes.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod diag;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod homing;
pub mod ipm;
pub mod od;
pub mod sim;
pub mod state;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use driver::{Epos, Telemetry};
pub use error::{EposError, ErrorKind};
pub use gateway::{Gateway, GatewayError, NmtService, SharedGateway};
pub use ipm::{InterpolationBufferStatus, PvtRecord};
pub use sim::{SimGateway, SimTiming};
pub use state::{status2state, ActualState, DesiredState, HomingMethod, OperationMode};
