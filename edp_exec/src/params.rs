//! # Effector Driver Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::eqpt::edp::MotionProfile;
use epos::{HomingMethod, SimTiming};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct EdpExecParams {
    /// Endpoint of the REP socket the ECP sends commands to
    pub command_endpoint: String,

    /// Profile used by moves which don't give one
    pub default_profile: MotionProfile,

    /// Upper bound on the 5 ms polls of a homing run
    #[serde(default = "default_homing_max_polls")]
    pub homing_max_polls: u32,

    /// Latencies of the simulated bus
    #[serde(default)]
    pub sim_timing: SimTiming,

    /// Axes in joint order
    pub axes: Vec<AxisParams>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AxisParams {
    pub name: String,

    /// CAN id of the axis' controller
    pub node_id: u8,

    pub homing_method: HomingMethod,

    #[serde(default)]
    pub home_offset: i32,

    /// Motor increments per joint unit (rad or m)
    pub increments_per_unit: f64,

    /// Motor position of the joint's zero
    #[serde(default)]
    pub motor_offset: i32,

    /// Joint limits, in joint units
    pub joint_min: f64,
    pub joint_max: f64,
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_homing_max_polls() -> u32 {
    12_000
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params: EdpExecParams = util::params::from_str(
            r#"
            command_endpoint = "tcp://*:5100"
            default_profile = { velocity = 1000, acceleration = 3000, deceleration = 3000 }

            [sim_timing]
            homing_reads = 10

            [[axes]]
            name = "joint_1"
            node_id = 1
            homing_method = "IndexPositiveSpeed"
            increments_per_unit = 1000.0
            joint_min = -1.0
            joint_max = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(params.homing_max_polls, 12_000);
        assert_eq!(params.sim_timing.homing_reads, 10);
        assert_eq!(params.sim_timing.enable_reads, SimTiming::default().enable_reads);
        assert_eq!(params.axes[0].homing_method, HomingMethod::IndexPositiveSpeed);
        assert_eq!(params.axes[0].motor_offset, 0);
    }
}
