//! # Effector
//!
//! The axes of one robot and its kinematic model. The effector carries out [`EdpCommand`]s on the
//! axes and reports their status.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use thiserror::Error;

use comms_if::eqpt::edp::{AxisStatus, EdpCommand, EdpResponse, EdpStatus, MotionProfile, PvtPoint};
use epos::{
    ActualState, Epos, EposError, ErrorKind, Gateway, PvtRecord, SharedGateway,
};

use crate::{
    kinematics::{KinematicModel, KinematicsError},
    params::{AxisParams, EdpExecParams},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// All axes of one robot.
pub struct Effector<G: Gateway> {
    robot: String,
    axes: Vec<Axis<G>>,
    model: Box<dyn KinematicModel>,
    default_profile: MotionProfile,
}

struct Axis<G: Gateway> {
    epos: Epos<SharedGateway<G>>,
    params: AxisParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EdpError {
    #[error(transparent)]
    Epos(#[from] EposError),

    #[error("Kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),

    #[error("Expected data for {expected} axes, found {found}")]
    WrongAxisCount { expected: usize, found: usize },

    #[error("No axis with index {0}")]
    NoSuchAxis(usize),

    #[error("Invalid trajectory for axis {axis}: {reason}")]
    InvalidTrajectory { axis: usize, reason: String },

    #[error("Invalid software homing request: {0}")]
    InvalidHoming(String),

    #[error("The kinematic model has {model} joints but {axes} axes are configured")]
    ModelMismatch { model: usize, axes: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<G: Gateway> Effector<G> {
    /// Create the drivers of every configured axis on the given bus.
    pub fn new(
        robot: &str,
        gateway: SharedGateway<G>,
        params: &EdpExecParams,
        model: Box<dyn KinematicModel>,
    ) -> Result<Self, EdpError> {
        if model.num_joints() != params.axes.len() {
            return Err(EdpError::ModelMismatch {
                model: model.num_joints(),
                axes: params.axes.len(),
            });
        }

        let mut axes = Vec::with_capacity(params.axes.len());

        for axis_params in params.axes.iter() {
            let epos = Epos::new(gateway.clone(), axis_params.node_id, &axis_params.name)?
                .with_homing_max_polls(params.homing_max_polls);

            info!("{}: axis {} ready", robot, epos.description());

            axes.push(Axis {
                epos,
                params: axis_params.clone(),
            });
        }

        Ok(Self {
            robot: robot.to_string(),
            axes,
            model,
            default_profile: params.default_profile,
        })
    }

    pub fn num_axes(&self) -> usize {
        self.axes.len()
    }

    /// Carry out a command and build the response to it.
    ///
    /// Commands which are rejected before anything is sent to the axes get an
    /// [`EdpResponse::Invalid`], failures on the axes an [`EdpResponse::Failed`].
    pub fn handle(&mut self, cmd: &EdpCommand) -> EdpResponse {
        debug!("{}: handling {:?}", self.robot, cmd);

        match self.execute(cmd).and_then(|_| self.status()) {
            Ok(status) => EdpResponse::Ok(status),
            Err(e) if e.is_invalid_request() => {
                warn!("{}: invalid command: {}", self.robot, e);
                EdpResponse::Invalid {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                error!("{}: command failed: {}", self.robot, e);
                EdpResponse::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn execute(&mut self, cmd: &EdpCommand) -> Result<(), EdpError> {
        match cmd {
            EdpCommand::GetStatus => Ok(()),
            EdpCommand::Enable => self.enable(),
            EdpCommand::ClearFault => self.clear_fault(),
            EdpCommand::QuickStop => self.quick_stop(),
            EdpCommand::Home => self.home(),
            EdpCommand::SoftwareHome {
                axis,
                velocity,
                offset,
                home_position,
            } => self.software_home(*axis, *velocity, *offset, *home_position),
            EdpCommand::MoveMotors {
                targets,
                relative,
                profile,
            } => self.move_motors(targets, *relative, profile.as_ref()),
            EdpCommand::MoveJoints { joints, profile } => {
                let targets = self.model.joints_to_motors(joints)?;
                self.move_motors(&targets, false, profile.as_ref())
            }
            EdpCommand::MoveExternal { pose, profile } => {
                let targets = self.model.compute_motors(pose)?;
                self.move_motors(&targets, false, profile.as_ref())
            }
            EdpCommand::Interpolate { trajectory } => self.interpolate(trajectory),
            EdpCommand::SetDigitalOutputs { axis, outputs } => {
                self.axis_mut(*axis)?.epos.set_digital_outputs(*outputs)?;
                Ok(())
            }
        }
    }

    /// Status of every axis.
    pub fn status(&mut self) -> Result<EdpStatus, EdpError> {
        let mut axes = Vec::with_capacity(self.axes.len());

        for axis in self.axes.iter_mut() {
            let tm = axis.epos.telemetry()?;
            let state = ActualState::from_statusword(tm.statusword);

            axes.push(AxisStatus {
                name: axis.params.name.clone(),
                node_id: axis.params.node_id,
                state: state.to_string(),
                position: tm.position,
                velocity: tm.velocity,
                current: tm.current,
                target_reached: tm.statusword & epos::state::status_bits::TARGET_REACHED != 0,
                referenced: tm.statusword & epos::state::status_bits::REFERENCED != 0,
                // An undecodable statusword is reported as a fault
                fault: state.is_fault() || state == ActualState::Unknown,
            });
        }

        Ok(EdpStatus { axes })
    }

    pub fn enable(&mut self) -> Result<(), EdpError> {
        for axis in self.axes.iter_mut() {
            axis.epos.enable()?;
        }
        Ok(())
    }

    /// Clear the fault of every faulted axis, then enable all axes.
    pub fn clear_fault(&mut self) -> Result<(), EdpError> {
        for axis in self.axes.iter_mut() {
            axis.epos.clear_fault()?;
        }
        Ok(())
    }

    /// Quick stop every axis. All axes are stopped even if some fail, the first failure is
    /// returned.
    pub fn quick_stop(&mut self) -> Result<(), EdpError> {
        let mut result = Ok(());

        for axis in self.axes.iter_mut() {
            if let Err(e) = axis.epos.quick_stop() {
                error!("{}: quick stop failed: {}", self.robot, e);
                if result.is_ok() {
                    result = Err(e.into());
                }
            }
        }

        result
    }

    /// Home every axis in turn with its configured method.
    pub fn home(&mut self) -> Result<(), EdpError> {
        for axis in self.axes.iter_mut() {
            axis.epos.enable()?;
            axis.epos
                .do_homing(axis.params.homing_method, axis.params.home_offset)?;
        }
        Ok(())
    }

    pub fn software_home(
        &mut self,
        axis: usize,
        velocity: i32,
        offset: i32,
        home_position: i32,
    ) -> Result<(), EdpError> {
        let same_direction = (velocity >= 0 && offset >= 0) || (velocity <= 0 && offset <= 0);
        if same_direction {
            return Err(EdpError::InvalidHoming(format!(
                "offset {} must be opposite to the velocity {}",
                offset, velocity
            )));
        }

        self.axis_mut(axis)?
            .epos
            .do_software_homing(velocity, offset, home_position)?;
        Ok(())
    }

    /// Start a profile position move of every axis.
    pub fn move_motors(
        &mut self,
        targets: &[i32],
        relative: bool,
        profile: Option<&MotionProfile>,
    ) -> Result<(), EdpError> {
        self.check_axis_count(targets.len())?;
        let profile = *profile.unwrap_or(&self.default_profile);

        for (axis, target) in self.axes.iter_mut().zip(targets) {
            axis.epos.set_profile_velocity(profile.velocity)?;
            axis.epos.set_profile_acceleration(profile.acceleration)?;
            axis.epos.set_profile_deceleration(profile.deceleration)?;

            if relative {
                axis.epos.move_relative(*target)?;
            } else {
                axis.epos.move_absolute(*target)?;
            }
        }

        Ok(())
    }

    /// Load one trajectory per axis and start them together.
    ///
    /// Every point of every axis is checked before any axis is touched.
    pub fn interpolate(&mut self, trajectory: &[Vec<PvtPoint>]) -> Result<(), EdpError> {
        self.check_axis_count(trajectory.len())?;

        let records: Vec<Vec<PvtRecord>> = trajectory
            .iter()
            .map(|points| {
                points
                    .iter()
                    .map(|p| PvtRecord::new(p.position, p.velocity, p.time_ms))
                    .collect()
            })
            .collect();

        for (i, axis_records) in records.iter().enumerate() {
            if axis_records.is_empty() {
                return Err(EdpError::InvalidTrajectory {
                    axis: i,
                    reason: "no points".into(),
                });
            }
            if let Some(bad) = axis_records.iter().find(|r| !r.is_velocity_valid()) {
                return Err(EdpError::InvalidTrajectory {
                    axis: i,
                    reason: format!("velocity {} does not fit in 24 bits", bad.velocity),
                });
            }
        }

        for (axis, axis_records) in self.axes.iter_mut().zip(records.iter()) {
            axis.epos.load_trajectory(axis_records)?;
        }

        for axis in self.axes.iter_mut() {
            axis.epos.start_interpolated_position_motion()?;
        }

        Ok(())
    }

    fn check_axis_count(&self, found: usize) -> Result<(), EdpError> {
        if found != self.axes.len() {
            return Err(EdpError::WrongAxisCount {
                expected: self.axes.len(),
                found,
            });
        }
        Ok(())
    }

    fn axis_mut(&mut self, index: usize) -> Result<&mut Axis<G>, EdpError> {
        self.axes.get_mut(index).ok_or(EdpError::NoSuchAxis(index))
    }
}

impl EdpError {
    /// True if the error was raised before any axis was commanded.
    pub fn is_invalid_request(&self) -> bool {
        match self {
            EdpError::Kinematics(_)
            | EdpError::WrongAxisCount { .. }
            | EdpError::NoSuchAxis(_)
            | EdpError::InvalidTrajectory { .. }
            | EdpError::InvalidHoming(_) => true,
            EdpError::Epos(e) => matches!(e.kind, ErrorKind::VelocityOutOfRange(_)),
            EdpError::ModelMismatch { .. } => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::JointScaling;
    use epos::{sim::GatewayCall, HomingMethod, SimGateway, SimTiming};
    use std::sync::{Arc, Mutex};

    fn params() -> EdpExecParams {
        let axis = |name: &str, node_id| AxisParams {
            name: name.into(),
            node_id,
            homing_method: HomingMethod::ActualPosition,
            home_offset: 0,
            increments_per_unit: 100.0,
            motor_offset: 0,
            joint_min: -10.0,
            joint_max: 10.0,
        };

        EdpExecParams {
            command_endpoint: "inproc://edp".into(),
            default_profile: MotionProfile {
                velocity: 1000,
                acceleration: 2000,
                deceleration: 2000,
            },
            homing_max_polls: 100,
            sim_timing: SimTiming::default(),
            axes: vec![axis("joint_1", 1), axis("joint_2", 2)],
        }
    }

    fn effector() -> (Effector<SimGateway>, SharedGateway<SimGateway>) {
        let params = params();
        let mut sim = SimGateway::new(params.sim_timing);
        sim.add_node(1);
        sim.add_node(2);
        let bus = Arc::new(Mutex::new(sim));

        let model = Box::new(JointScaling::new(&params.axes));
        let eff = Effector::new("irp6", bus.clone(), &params, model).unwrap();
        (eff, bus)
    }

    fn wait_motion(eff: &mut Effector<SimGateway>) -> EdpStatus {
        for _ in 0..20 {
            let status = eff.status().unwrap();
            if !status.motion_in_progress() {
                return status;
            }
        }
        panic!("motion did not finish");
    }

    #[test]
    fn test_move_joints() {
        let (mut eff, _bus) = effector();

        match eff.handle(&EdpCommand::Enable) {
            EdpResponse::Ok(status) => {
                assert!(status.axes.iter().all(|a| a.state == "OPERATION_ENABLE"))
            }
            r => panic!("Unexpected response {:?}", r),
        }

        let resp = eff.handle(&EdpCommand::MoveJoints {
            joints: vec![1.5, -0.25],
            profile: None,
        });
        assert!(matches!(resp, EdpResponse::Ok(_)));

        assert_eq!(wait_motion(&mut eff).positions(), vec![150, -25]);
    }

    #[test]
    fn test_invalid_commands() {
        let (mut eff, bus) = effector();
        eff.enable().unwrap();
        bus.lock().unwrap().clear_calls();

        let wrong_count = eff.handle(&EdpCommand::MoveMotors {
            targets: vec![1, 2, 3],
            relative: false,
            profile: None,
        });
        assert!(matches!(wrong_count, EdpResponse::Invalid { .. }));

        let out_of_range = eff.handle(&EdpCommand::MoveExternal {
            pose: vec![0.0, 11.0],
            profile: None,
        });
        assert!(matches!(out_of_range, EdpResponse::Invalid { .. }));

        let bad_velocity = eff.handle(&EdpCommand::Interpolate {
            trajectory: vec![
                vec![PvtPoint {
                    position: 0,
                    velocity: 10,
                    time_ms: 10,
                }],
                vec![PvtPoint {
                    position: 0,
                    velocity: 1 << 23,
                    time_ms: 10,
                }],
            ],
        });
        assert!(matches!(bad_velocity, EdpResponse::Invalid { .. }));

        // Nothing reached the bus
        assert!(bus.lock().unwrap().calls().is_empty());
    }

    #[test]
    fn test_interpolate() {
        let (mut eff, bus) = effector();
        eff.enable().unwrap();

        let traj = |end| {
            vec![
                PvtPoint {
                    position: end / 2,
                    velocity: 20,
                    time_ms: 50,
                },
                PvtPoint {
                    position: end,
                    velocity: 0,
                    time_ms: 50,
                },
            ]
        };

        let resp = eff.handle(&EdpCommand::Interpolate {
            trajectory: vec![traj(400), traj(-800)],
        });
        assert!(matches!(resp, EdpResponse::Ok(_)));
        assert_eq!(wait_motion(&mut eff).positions(), vec![400, -800]);

        let segments = bus
            .lock()
            .unwrap()
            .calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Segmented { .. }))
            .count();
        assert_eq!(segments, 2 * 2 * 2);
    }

    #[test]
    fn test_fault_reported() {
        let (mut eff, bus) = effector();
        bus.lock().unwrap().inject_fault(2, &[0x8611]);

        match eff.handle(&EdpCommand::Enable) {
            EdpResponse::Failed { reason } => assert!(reason.contains("joint_2")),
            r => panic!("Unexpected response {:?}", r),
        }

        assert!(matches!(eff.handle(&EdpCommand::ClearFault), EdpResponse::Ok(_)));
        assert!(!eff.status().unwrap().any_fault());
    }

    #[test]
    fn test_unknown_state_reported_as_fault() {
        let (mut eff, bus) = effector();
        eff.enable().unwrap();
        bus.lock().unwrap().force_statusword(2, 0x0401);

        let status = eff.status().unwrap();
        assert_eq!(status.axes[1].state, "UNKNOWN");
        assert!(status.axes[1].fault);
        assert!(!status.axes[0].fault);
        assert!(status.any_fault());
    }

    #[test]
    fn test_home_and_outputs() {
        let (mut eff, _bus) = effector();

        match eff.handle(&EdpCommand::Home) {
            EdpResponse::Ok(status) => assert!(status.axes.iter().all(|a| a.referenced)),
            r => panic!("Unexpected response {:?}", r),
        }

        assert!(matches!(
            eff.handle(&EdpCommand::SetDigitalOutputs {
                axis: 5,
                outputs: [false; 8]
            }),
            EdpResponse::Invalid { .. }
        ));
        assert!(matches!(
            eff.handle(&EdpCommand::SoftwareHome {
                axis: 0,
                velocity: 100,
                offset: 100,
                home_position: 0
            }),
            EdpResponse::Invalid { .. }
        ));
    }
}
