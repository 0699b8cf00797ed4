//! # Master Process Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct MpExecParams {
    /// Endpoint the MP binds to collect notifications from every ECP
    pub notification_endpoint: String,

    /// Robots taking part in the task
    pub robots: Vec<RobotParams>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RobotParams {
    /// Name of the robot, must match the name its ECP was started with
    pub name: String,

    /// Endpoint the MP binds to push commands to the robot's ECP
    pub command_endpoint: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MpExecParams {
    pub fn robot_names(&self) -> Vec<String> {
        self.robots.iter().map(|r| r.name.clone()).collect()
    }
}
