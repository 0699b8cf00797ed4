//! # Poses file subtask
//!
//! Moves the robot through the joint poses listed in a JSON file whose path is the command
//! payload. Each pose is a joint move run by the `epos_joint_command` generator.

use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use comms_if::{
    eqpt::edp::{EdpCommand, MotionProfile},
    task::NextStateCmd,
};

use super::Subtask;
use crate::{
    edp_link::EdpLink,
    generator::{self, EposCommand, GeneratorError, MotionKind},
    params::PollParams,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointPose {
    pub joints: Vec<f64>,

    #[serde(default)]
    pub profile: Option<MotionProfile>,
}

pub struct PosesFile {
    joint_command: EposCommand,
}

impl PosesFile {
    pub fn new(poll: PollParams) -> Self {
        Self {
            joint_command: EposCommand::new(MotionKind::Joint, poll),
        }
    }

    fn load(path: &Path) -> Result<Vec<JointPose>, GeneratorError> {
        let file =
            fs::read_to_string(path).map_err(|e| GeneratorError::FileLoad(path.to_path_buf(), e))?;
        let poses: Vec<JointPose> = serde_json::from_str(&file)
            .map_err(|e| GeneratorError::InvalidFile(path.to_path_buf(), e))?;

        if poses.is_empty() {
            return Err(GeneratorError::Empty(format!("{:?}", path)));
        }

        Ok(poses)
    }
}

impl Subtask for PosesFile {
    fn name(&self) -> &str {
        "poses_file_from_mp"
    }

    fn execute(
        &mut self,
        cmd: &NextStateCmd,
        edp: &mut dyn EdpLink,
    ) -> Result<u64, GeneratorError> {
        let path = PathBuf::from(cmd.payload_str()?);
        let poses = Self::load(&path)?;

        info!("Moving through {} poses from {:?}", poses.len(), path);

        let mut num_steps = 0;

        for (i, pose) in poses.into_iter().enumerate() {
            self.joint_command.set_command(EdpCommand::MoveJoints {
                joints: pose.joints,
                profile: pose.profile,
            });

            num_steps += generator::run(&mut self.joint_command, edp)?;

            info!("Pose {} reached", i);
        }

        Ok(num_steps)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::sim_edp;

    #[test]
    fn test_poses_file() {
        let path = std::env::temp_dir().join("ecp_poses_file.json");
        let poses = vec![
            JointPose {
                joints: vec![1.0, 1.0],
                profile: None,
            },
            JointPose {
                joints: vec![0.5, -3.0],
                profile: None,
            },
        ];
        fs::write(&path, serde_json::to_string(&poses).unwrap()).unwrap();

        let (mut edp, _bus) = sim_edp();
        edp.enable().unwrap();

        let mut subtask = PosesFile::new(PollParams {
            poll_period_ms: 1,
            motion_timeout_s: 1.0,
        });
        let cmd = NextStateCmd::new(
            "irp6",
            "poses_file_from_mp",
            0,
            path.to_string_lossy().as_bytes().to_vec(),
        );

        // Three steps per pose
        assert_eq!(subtask.execute(&cmd, &mut edp).unwrap(), 6);
        assert_eq!(edp.status().unwrap().positions(), vec![50, -300]);

        fs::remove_file(&path).ok();
    }
}
