//! # Effector Driver Interface
//!
//! Requests sent by an ECP to its robot's effector driver process (EDP), and the EDP's responses.
//! Every request gets exactly one response. Motion requests return as soon as the motion has been
//! started, the client polls [`EdpCommand::GetStatus`] to follow it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Profile used for a point to point move. Units are those of the motor controller (rpm and
/// rpm/s).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    pub velocity: u32,
    pub acceleration: u32,
    pub deceleration: u32,
}

/// One point of an interpolated trajectory for a single axis.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PvtPoint {
    /// Position in motor increments
    pub position: i32,

    /// Velocity in rpm
    pub velocity: i32,

    /// Time to reach this point from the previous one
    pub time_ms: u8,
}

/// Snapshot of one axis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AxisStatus {
    pub name: String,
    pub node_id: u8,

    /// Name of the CiA-402 state the controller reports
    pub state: String,

    pub position: i32,
    pub velocity: i32,
    pub current: i16,

    pub target_reached: bool,
    pub referenced: bool,
    pub fault: bool,
}

/// Snapshot of all axes of an effector.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct EdpStatus {
    pub axes: Vec<AxisStatus>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Requests to the effector driver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum EdpCommand {
    /// Read the status of all axes
    GetStatus,

    /// Bring all axes into operation enabled
    Enable,

    /// Clear faults on all faulted axes then enable
    ClearFault,

    /// Stop all axes with the quick stop deceleration
    QuickStop,

    /// Home all axes using the configured homing method and offset
    Home,

    /// Home one axis against a mechanical limit
    SoftwareHome {
        axis: usize,
        velocity: i32,
        offset: i32,
        home_position: i32,
    },

    /// Move all axes to motor positions given in increments
    MoveMotors {
        targets: Vec<i32>,
        relative: bool,
        profile: Option<MotionProfile>,
    },

    /// Move all axes to joint positions
    MoveJoints {
        joints: Vec<f64>,
        profile: Option<MotionProfile>,
    },

    /// Move the effector to an external pose
    MoveExternal {
        pose: Vec<f64>,
        profile: Option<MotionProfile>,
    },

    /// Run an interpolated trajectory, one list of points per axis
    Interpolate { trajectory: Vec<Vec<PvtPoint>> },

    /// Set the digital outputs of one axis
    SetDigitalOutputs { axis: usize, outputs: [bool; 8] },
}

/// Responses from the effector driver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum EdpResponse {
    /// The request was carried out, the status is read after it
    Ok(EdpStatus),

    /// The request was malformed and nothing was done
    Invalid { reason: String },

    /// The request failed on the equipment
    Failed { reason: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EdpStatus {
    /// True while any axis has not reached its target.
    pub fn motion_in_progress(&self) -> bool {
        self.axes.iter().any(|a| !a.target_reached)
    }

    /// True if any axis is in a fault state.
    pub fn any_fault(&self) -> bool {
        self.axes.iter().any(|a| a.fault)
    }

    pub fn positions(&self) -> Vec<i32> {
        self.axes.iter().map(|a| a.position).collect()
    }
}
