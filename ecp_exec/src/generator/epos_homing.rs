//! # EPOS homing generator
//!
//! - variant 0: home every axis with its configured method, no payload.
//! - variant 1: software homing of one axis against its mechanical limit, the payload is
//!   `{"axis": n, "velocity": v, "offset": o, "home_position": p}`.
//!
//! The EDP answers once homing has finished, so a single step is enough. The step fails if a
//! homed axis is still not referenced.

use log::info;
use serde::Deserialize;

use comms_if::{
    eqpt::edp::{EdpCommand, EdpStatus},
    task::NextStateCmd,
};

use super::{Generator, GeneratorError};
use crate::edp_link::EdpLink;

#[derive(Deserialize)]
struct SoftwareHoming {
    axis: usize,
    velocity: i32,
    offset: i32,
    #[serde(default)]
    home_position: i32,
}

#[derive(Default)]
pub struct EposHoming {
    command: Option<EdpCommand>,
}

/// Names of the axes the command homed which are not referenced.
fn unreferenced_axes(command: &EdpCommand, status: &EdpStatus) -> Vec<String> {
    status
        .axes
        .iter()
        .enumerate()
        .filter(|(i, _)| match command {
            EdpCommand::SoftwareHome { axis, .. } => i == axis,
            _ => true,
        })
        .filter(|(_, a)| !a.referenced)
        .map(|(_, a)| a.name.clone())
        .collect()
}

impl EposHoming {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generator for EposHoming {
    fn name(&self) -> &str {
        "epos_homing"
    }

    fn configure(&mut self, cmd: &NextStateCmd) -> Result<(), GeneratorError> {
        self.command = Some(match cmd.variant {
            0 => EdpCommand::Home,
            1 => {
                let s: SoftwareHoming = cmd.payload_json()?;
                EdpCommand::SoftwareHome {
                    axis: s.axis,
                    velocity: s.velocity,
                    offset: s.offset,
                    home_position: s.home_position,
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
            .ok_or_else(|| GeneratorError::Empty("homing command".into()))?;

        let status = edp.request(&command)?;

        let unreferenced = unreferenced_axes(&command, &status);
        if !unreferenced.is_empty() {
            return Err(GeneratorError::NotReferenced(unreferenced.join(", ")));
        }
        info!("Homing done, {} axes referenced", status.axes.len());

        Ok(false)
    }

    fn next_step(&mut self, _edp: &mut dyn EdpLink) -> Result<bool, GeneratorError> {
        Ok(false)
    }
}
