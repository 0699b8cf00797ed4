//! # Sleep generator
//!
//! Waits for the number of milliseconds given as the JSON payload, in 20 ms steps. Nothing is
//! sent to the EDP.

use std::time::{Duration, Instant};

use comms_if::task::NextStateCmd;
use util::time::Ticker;

use super::{Generator, GeneratorError};
use crate::edp_link::EdpLink;

const STEP_PERIOD_MS: u64 = 20;

pub struct Sleep {
    duration: Duration,
    deadline: Instant,
    ticker: Ticker,
}

impl Sleep {
    pub fn new() -> Self {
        Self {
            duration: Duration::default(),
            deadline: Instant::now(),
            ticker: Ticker::from_millis(STEP_PERIOD_MS),
        }
    }
}

impl Default for Sleep {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for Sleep {
    fn name(&self) -> &str {
        "sleep"
    }

    fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError> {
        self.duration = Duration::from_millis(cmd.payload_json()?);
        Ok(())
    }

    fn first_step(&mut self, _edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        self.ticker = Ticker::from_millis(STEP_PERIOD_MS);
        self.deadline = self.ticker.deadline() + self.duration;

        Ok(self.duration > Duration::default())
    }

    fn next_step(&mut self, _edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        self.ticker.wait();
        Ok(self.ticker.deadline() < self.deadline)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{generator, test_util::CountingEdp};

    #[test]
    fn test_sleep() {
        let mut edp = CountingEdp::default();
        let mut gen = Sleep::new();

        gen.configure(&NextStateCmd::with_json("irp6", "sleep", 0, &60u64).unwrap())
            .unwrap();

        let start = Instant::now();
        let steps = generator::run(&mut gen, &mut edp).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(steps, 4);
        assert!(edp.requests.is_empty());

        assert!(gen
            .configure(&NextStateCmd::new("irp6", "sleep", 0, b"soon".to_vec()))
            .is_err());
    }
}
