//! # EPOS driver errors

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

use crate::{gateway::GatewayError, state::ActualState};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A failure of one EPOS node, carrying the node's identity.
#[derive(Debug, Error)]
#[error("EPOS node {device}: {kind}")]
pub struct EposError {
    /// CAN id of the node
    pub node_id: u8,

    /// Node description, `'<name>' (CanID <id>)`
    pub device: String,

    pub kind: ErrorKind,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("Gateway error: {0}")]
    Gateway(GatewayError),

    #[error("Device is in the fault state")]
    Fault,

    #[error("Failed to recover from the fault state")]
    FaultNotRecovered,

    #[error("Timeout {0}")]
    Timeout(&'static str),

    #[error("{expected} expected, device is in state {found}")]
    UnexpectedState {
        expected: &'static str,
        found: ActualState,
    },

    #[error("Status word {0:#06x} is an unknown state")]
    UnknownState(u16),

    #[error("Homing error")]
    HomingError,

    #[error("Not referenced after homing")]
    NotReferenced,

    #[error("Motor jam detected: {0}")]
    MotorJam(Box<ErrorKind>),

    #[error("Velocity {0} does not fit in 24 bits")]
    VelocityOutOfRange(i32),

    #[error("Error history index {0} out of range <1..5>")]
    ErrorHistoryIndex(u8),

    #[error("Failed to change the remote state of the device")]
    RemoteState,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EposError {
    pub fn is_fault(&self) -> bool {
        matches!(self.kind, ErrorKind::Fault | ErrorKind::FaultNotRecovered)
    }
}
