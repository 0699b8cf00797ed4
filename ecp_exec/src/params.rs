//! # Effector Control Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::time::Duration;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct EcpExecParams {
    /// Endpoint the MP pushes commands for this robot to
    pub mp_command_endpoint: String,

    /// Endpoint the MP collects notifications on
    pub mp_notification_endpoint: String,

    /// Endpoint of the robot's EDP
    pub edp_endpoint: String,

    /// Time to wait for an EDP response. Homing requests are answered once homing is done.
    #[serde(default = "default_edp_timeout_ms")]
    pub edp_timeout_ms: i32,

    #[serde(flatten)]
    pub polling: PollParams,
}

/// How generators follow a motion.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PollParams {
    /// Period of the status polls of a running motion
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,

    /// Time after which a motion which has not finished is abandoned
    #[serde(default = "default_motion_timeout_s")]
    pub motion_timeout_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PollParams {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    /// Number of polls after which a motion is abandoned, at least one.
    pub fn max_polls(&self) -> u64 {
        let polls = self.motion_timeout_s * 1000.0 / self.poll_period_ms.max(1) as f64;
        (polls.ceil() as u64).max(1)
    }
}

impl Default for PollParams {
    fn default() -> Self {
        Self {
            poll_period_ms: default_poll_period_ms(),
            motion_timeout_s: default_motion_timeout_s(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_edp_timeout_ms() -> i32 {
    120_000
}

fn default_poll_period_ms() -> u64 {
    20
}

fn default_motion_timeout_s() -> f64 {
    60.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params: EcpExecParams = util::params::from_str(
            r#"
            mp_command_endpoint = "tcp://localhost:5201"
            mp_notification_endpoint = "tcp://localhost:5200"
            edp_endpoint = "tcp://localhost:5101"
            motion_timeout_s = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(params.edp_timeout_ms, 120_000);
        assert_eq!(params.polling.poll_period_ms, 20);
        assert_eq!(params.polling.max_polls(), 100);
    }
}
