//! # EPOS control generator
//!
//! One-shot device management requests selected by the variant:
//!
//! - 0: enable all axes
//! - 1: clear faults then enable all axes
//! - 2: quick stop all axes
//! - 3: set digital outputs, payload `{"axis": n, "outputs": [b0, .., b7]}`

use serde::Deserialize;

use comms_if::{eqpt::edp::EdpCommand, task::NextStateCmd};

use super::{Generator, GeneratorError};
use crate::edp_link::EdpLink;

#[derive(Deserialize)]
struct DigitalOutputs {
    axis: usize,
    outputs: [bool; 8],
}

#[derive(Default)]
pub struct EposControl {
    command: Option<EdpCommand>,
}

impl EposControl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generator for EposControl {
    fn name(&self) -> &str {
        "epos_control"
    }

    fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError> {
        self.command = Some(match cmd.variant {
            0 => EdpCommand::Enable,
            1 => EdpCommand::ClearFault,
            2 => EdpCommand::QuickStop,
            3 => {
                let d: DigitalOutputs = cmd.payload_json()?;
                EdpCommand::SetDigitalOutputs {
                    axis: d.axis,
                    outputs: d.outputs,
                }
            }
            v => return Err(GeneratorError::InvalidVariant(v)),
        });
        Ok(())
    }

    fn first_step(&mut self, edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        let command = self
            .command
            .take()
            .ok_or_else(|| GeneratorError::Empty("control command".into()))?;

        edp.request(&command)?;
        Ok(false)
    }

    fn next_step(&mut self, _edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        Ok(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{generator, test_util::sim_edp};

    fn control(gen: &mut EposControl, variant: i32, payload: Vec<u8>) {
        gen.configure(&NextStateCmd::new("irp6", "epos_control", variant, payload))
            .unwrap();
    }

    #[test]
    fn test_fault_recovery() {
        let (mut edp, bus) = sim_edp();
        let mut gen = EposControl::new();

        bus.lock().unwrap().inject_fault(1, &[0x8611, 0x3210]);

        control(&mut gen, 0, vec![]);
        assert!(generator::run(&mut gen, &mut edp).is_err());

        control(&mut gen, 1, vec![]);
        generator::run(&mut gen, &mut edp).unwrap();

        let status = edp.status().unwrap();
        assert!(!status.any_fault());
        assert!(status.axes.iter().all(|a| a.state == "OPERATION_ENABLE"));

        control(&mut gen, 3, br#"{"axis": 1, "outputs": [true, false, false, false, false, false, false, false]}"#.to_vec());
        generator::run(&mut gen, &mut edp).unwrap();

        assert!(matches!(
            gen.configure(&NextStateCmd::new("irp6", "epos_control", 9, vec![])),
            Err(GeneratorError::InvalidVariant(9))
        ));
    }
}
