//! # EPOS motion command generators
//!
//! Start a motion of all axes on the EDP and follow it until every axis has reached its target.
//! The four registered variants only differ in how the payload describes the motion:
//!
//! | name                        | payload                                      |
//! |-----------------------------|----------------------------------------------|
//! | `epos_motor_command`        | `{"targets": [..], "relative": b, "profile": p}` |
//! | `epos_joint_command`        | `{"joints": [..], "profile": p}`             |
//! | `epos_external_command`     | `{"pose": [..], "profile": p}`               |
//! | `epos_interpolated_command` | `{"trajectory": [[{position, velocity, time_ms}, ..], ..]}` |
//!
//! `profile` is optional, the EDP's default profile is used without it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use serde::Deserialize;

use comms_if::{
    eqpt::edp::{EdpCommand, MotionProfile, PvtPoint},
    task::NextStateCmd,
};

use super::{Generator, GeneratorError, MotionMonitor};
use crate::{edp_link::EdpLink, params::PollParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct EposCommand {
    kind: MotionKind,
    command: Option<EdpCommand>,
    monitor: MotionMonitor,
}

#[derive(Deserialize)]
struct MotorTargets {
    targets: Vec<i32>,
    #[serde(default)]
    relative: bool,
    profile: Option<MotionProfile>,
}

#[derive(Deserialize)]
struct JointTargets {
    joints: Vec<f64>,
    profile: Option<MotionProfile>,
}

#[derive(Deserialize)]
struct ExternalTarget {
    pose: Vec<f64>,
    profile: Option<MotionProfile>,
}

#[derive(Deserialize)]
struct Trajectory {
    trajectory: Vec<Vec<PvtPoint>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    Motor,
    Joint,
    External,
    Interpolated,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotionKind {
    pub fn generator_name(&self) -> &'static str {
        match self {
            MotionKind::Motor => "epos_motor_command",
            MotionKind::Joint => "epos_joint_command",
            MotionKind::External => "epos_external_command",
            MotionKind::Interpolated => "epos_interpolated_command",
        }
    }

    /// Build the EDP request described by a payload of this kind.
    fn parse(&self, cmd: &NextStateCmd) -> Result<EdpCommand, GeneratorError> {
        Ok(match self {
            MotionKind::Motor => {
                let m: MotorTargets = cmd.payload_json()?;
                EdpCommand::MoveMotors {
                    targets: m.targets,
                    relative: m.relative,
                    profile: m.profile,
                }
            }
            MotionKind::Joint => {
                let j: JointTargets = cmd.payload_json()?;
                EdpCommand::MoveJoints {
                    joints: j.joints,
                    profile: j.profile,
                }
            }
            MotionKind::External => {
                let e: ExternalTarget = cmd.payload_json()?;
                EdpCommand::MoveExternal {
                    pose: e.pose,
                    profile: e.profile,
                }
            }
            MotionKind::Interpolated => {
                let t: Trajectory = cmd.payload_json()?;
                EdpCommand::Interpolate {
                    trajectory: t.trajectory,
                }
            }
        })
    }
}

impl EposCommand {
    pub fn new(kind: MotionKind, poll: PollParams) -> Self {
        Self {
            kind,
            command: None,
            monitor: MotionMonitor::new(poll),
        }
    }

    /// Use this generator for a command built in code rather than received from the MP.
    pub fn set_command(&mut self, command: EdpCommand) {
        self.command = Some(command);
    }
}

impl Generator for EposCommand {
    fn name(&self) -> &str {
        self.kind.generator_name()
    }

    fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError> {
        self.command = Some(self.kind.parse(cmd)?);
        Ok(())
    }

    fn first_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        let command = self
            .command
            .take()
            .ok_or_else(|| GeneratorError::Empty(format!("{} command", self.name())))?;

        let status = self.monitor.start(edp, &command)?;

        Ok(status.motion_in_progress())
    }

    fn next_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        let in_progress = self.monitor.poll(edp)?;

        if !in_progress {
            debug!(
                "{}: motion finished after {} polls",
                self.name(),
                self.monitor.polls()
            );
        }

        Ok(in_progress)
    }
}
