//! # Transparent generator
//!
//! Forwards an [`EdpCommand`] given as the JSON payload to the EDP unchanged. With variant 1 the
//! resulting motion is followed until it finishes, with variant 0 the generator ends as soon as
//! the EDP has answered.

use comms_if::{eqpt::edp::EdpCommand, task::NextStateCmd};

use super::{Generator, GeneratorError, MotionMonitor};
use crate::{edp_link::EdpLink, params::PollParams};

pub struct Transparent {
    command: Option<EdpCommand>,
    follow: bool,
    monitor: MotionMonitor,
}

impl Transparent {
    pub fn new(poll: PollParams) -> Self {
        Self {
            command: None,
            follow: false,
            monitor: MotionMonitor::new(poll),
        }
    }
}

impl Generator for Transparent {
    fn name(&self) -> &str {
        "transparent"
    }

    fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError> {
        self.follow = match cmd.variant {
            0 => false,
            1 => true,
            v => return Err(GeneratorError::InvalidVariant(v)),
        };
        self.command = Some(cmd.payload_json()?);
        Ok(())
    }

    fn first_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        let command = self
            .command
            .take()
            .ok_or_else(|| GeneratorError::Empty("transparent command".into()))?;

        let status = self.monitor.start(edp, &command)?;

        Ok(self.follow && status.motion_in_progress())
    }

    fn next_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        self.monitor.poll(edp)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{generator, test_util::sim_edp};

    #[test]
    fn test_forward_and_follow() {
        let (mut edp, _bus) = sim_edp();
        let mut gen = Transparent::new(PollParams {
            poll_period_ms: 1,
            motion_timeout_s: 1.0,
        });

        gen.configure(&NextStateCmd::with_json("irp6", "transparent", 0, &EdpCommand::Enable).unwrap())
            .unwrap();
        assert_eq!(generator::run(&mut gen, &mut edp).unwrap(), 1);

        let cmd = EdpCommand::MoveMotors {
            targets: vec![300, -300],
            relative: true,
            profile: None,
        };
        gen.configure(&NextStateCmd::with_json("irp6", "transparent", 1, &cmd).unwrap())
            .unwrap();
        assert!(generator::run(&mut gen, &mut edp).unwrap() > 1);
        assert_eq!(edp.status().unwrap().positions(), vec![300, -300]);

        assert!(matches!(
            gen.configure(&NextStateCmd::with_json("irp6", "transparent", 7, &cmd).unwrap()),
            Err(GeneratorError::InvalidVariant(7))
        ));
    }
}
