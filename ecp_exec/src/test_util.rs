//! Test doubles for the MP and EDP links.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use comms_if::{
    eqpt::edp::{AxisStatus, EdpCommand, EdpStatus, MotionProfile},
    task::{EcpNotification, MpCommand},
};
use edp_lib::{
    effector::Effector,
    kinematics::JointScaling,
    params::{AxisParams, EdpExecParams},
};
use epos::{HomingMethod, SharedGateway, SimGateway, SimTiming};

use crate::{
    edp_link::{self, EdpLink, EdpLinkError},
    mp_link::{MpLink, MpLinkError},
};

/// A simulated two axis effector answers requests directly.
impl EdpLink for Effector<SimGateway> {
    fn request(&mut self, cmd: &EdpCommand) -> Result<EdpStatus, EdpLinkError> {
        edp_link::response_to_result(self.handle(cmd))
    }
}

/// Two axes `joint_1` and `joint_2` scaled at 100 increments per unit, limited to +/- 10 units.
pub fn sim_edp() -> (Effector<SimGateway>, SharedGateway<SimGateway>) {
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

    let params = EdpExecParams {
        command_endpoint: "inproc://edp".into(),
        default_profile: MotionProfile {
            velocity: 1000,
            acceleration: 2000,
            deceleration: 2000,
        },
        homing_max_polls: 100,
        sim_timing: SimTiming::default(),
        axes: vec![axis("joint_1", 1), axis("joint_2", 2)],
    };

    let mut sim = SimGateway::new(params.sim_timing);
    sim.add_node(1);
    sim.add_node(2);
    let bus = Arc::new(Mutex::new(sim));

    let model = Box::new(JointScaling::new(&params.axes));
    let effector = Effector::new("irp6", bus.clone(), &params, model).unwrap();

    (effector, bus)
}

/// Records requests and answers with a single axis status.
#[derive(Default)]
pub struct CountingEdp {
    pub requests: Vec<EdpCommand>,
    moving: bool,
}

impl CountingEdp {
    /// An EDP whose motion never finishes.
    pub fn moving() -> Self {
        Self {
            requests: Vec::new(),
            moving: true,
        }
    }
}

impl EdpLink for CountingEdp {
    fn request(&mut self, cmd: &EdpCommand) -> Result<EdpStatus, EdpLinkError> {
        self.requests.push(cmd.clone());

        Ok(EdpStatus {
            axes: vec![AxisStatus {
                name: "joint_1".into(),
                node_id: 1,
                state: "OPERATION_ENABLE".into(),
                position: 0,
                velocity: 0,
                current: 0,
                target_reached: !self.moving,
                referenced: true,
                fault: false,
            }],
        })
    }
}

/// Hands out queued commands then `Terminate`, keeping every notification.
#[derive(Default)]
pub struct QueueMp {
    pub commands: VecDeque<MpCommand>,
    pub notifications: Vec<EcpNotification>,
}

impl QueueMp {
    pub fn new(commands: Vec<MpCommand>) -> Self {
        Self {
            commands: commands.into(),
            notifications: Vec::new(),
        }
    }
}

impl MpLink for QueueMp {
    fn recv_command(&mut self) -> Result<Option<MpCommand>, MpLinkError> {
        Ok(Some(
            self.commands.pop_front().unwrap_or(MpCommand::Terminate),
        ))
    }

    fn notify(&mut self, notification: &EcpNotification) -> Result<(), MpLinkError> {
        self.notifications.push(notification.clone());
        Ok(())
    }
}
