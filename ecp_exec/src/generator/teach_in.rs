//! # Teach-in generator
//!
//! Replays a recorded sequence of motor positions. The payload is the path of a JSON file holding
//! a list of [`TeachInPose`]s, each pose is reached before the next is started.

use log::info;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fs, path::PathBuf};

use comms_if::{
    eqpt::edp::{EdpCommand, MotionProfile},
    task::NextStateCmd,
};

use super::{Generator, GeneratorError, MotionMonitor};
use crate::{edp_link::EdpLink, params::PollParams};

/// One recorded pose, motor positions in increments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeachInPose {
    pub motors: Vec<i32>,

    #[serde(default)]
    pub profile: Option<MotionProfile>,
}

pub struct TeachIn {
    poses: VecDeque<TeachInPose>,
    monitor: MotionMonitor,
}

impl TeachIn {
    pub fn new(poll: PollParams) -> Self {
        Self {
            poses: VecDeque::new(),
            monitor: MotionMonitor::new(poll),
        }
    }

    /// Start the move to the next pose, `false` if none are left.
    fn start_next(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        let pose = match self.poses.pop_front() {
            Some(p) => p,
            None => return Ok(false),
        };

        self.monitor.start(
            edp,
            &EdpCommand::MoveMotors {
                targets: pose.motors,
                relative: false,
                profile: pose.profile,
            },
        )?;

        Ok(true)
    }
}

impl Generator for TeachIn {
    fn name(&self) -> &str {
        "teach_in"
    }

    fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError> {
        let path = PathBuf::from(cmd.payload_str()?);

        let file = fs::read_to_string(&path).map_err(|e| GeneratorError::FileLoad(path.clone(), e))?;
        let poses: Vec<TeachInPose> =
            serde_json::from_str(&file).map_err(|e| GeneratorError::InvalidFile(path.clone(), e))?;

        if poses.is_empty() {
            return Err(GeneratorError::Empty(format!("{:?}", path)));
        }

        info!("Loaded {} teach-in poses from {:?}", poses.len(), path);

        self.poses = poses.into();
        Ok(())
    }

    fn first_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        self.start_next(edp)
    }

    fn next_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        if self.monitor.poll(edp)? {
            return Ok(true);
        }

        self.start_next(edp)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{generator, test_util::sim_edp};

    #[test]
    fn test_replay() {
        let path = std::env::temp_dir().join("ecp_teach_in_replay.json");
        let poses = vec![
            TeachInPose {
                motors: vec![100, 100],
                profile: None,
            },
            TeachInPose {
                motors: vec![-50, 20],
                profile: None,
            },
        ];
        fs::write(&path, serde_json::to_string(&poses).unwrap()).unwrap();

        let (mut edp, _bus) = sim_edp();
        edp.enable().unwrap();

        let mut gen = TeachIn::new(PollParams {
            poll_period_ms: 1,
            motion_timeout_s: 1.0,
        });
        gen.configure(&NextStateCmd::new(
            "irp6",
            "teach_in",
            0,
            path.to_string_lossy().as_bytes().to_vec(),
        ))
        .unwrap();

        generator::run(&mut gen, &mut edp).unwrap();
        assert_eq!(edp.status().unwrap().positions(), vec![-50, 20]);

        fs::write(&path, "[]").unwrap();
        let empty = NextStateCmd::new("irp6", "teach_in", 0, path.to_string_lossy().as_bytes().to_vec());
        assert!(matches!(gen.configure(&empty), Err(GeneratorError::Empty(_))));

        fs::remove_file(&path).ok();

        let missing = NextStateCmd::new("irp6", "teach_in", 0, b"/nonexistent/poses.json".to_vec());
        assert!(matches!(gen.configure(&missing), Err(GeneratorError::FileLoad(..))));
    }
}
