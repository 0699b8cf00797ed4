//! # Registry
//!
//! Table of the generators and subtasks an ECP can run, keyed by the names the MP uses in its
//! commands. Built once at startup and owned by the ECP task.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use std::collections::BTreeMap;

use crate::{
    generator::{
        EposCommand, EposControl, EposHoming, Generator, MotionKind, Sleep, TeachIn, Transparent,
    },
    params::PollParams,
    subtask::{PosesFile, Subtask},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct Registry {
    generators: BTreeMap<String, Box<dyn Generator>>,
    subtasks: BTreeMap<String, Box<dyn Subtask>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What a command name resolved to.
pub enum Target<'a> {
    Generator(&'a mut dyn Generator),
    Subtask(&'a mut dyn Subtask),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every bundled generator and subtask.
    pub fn with_defaults(poll: PollParams) -> Self {
        let mut registry = Self::new();

        registry.add_generator(Box::new(Sleep::new()));
        registry.add_generator(Box::new(Transparent::new(poll)));
        for kind in [
            MotionKind::Motor,
            MotionKind::Joint,
            MotionKind::External,
            MotionKind::Interpolated,
        ]
        .iter()
        {
            registry.add_generator(Box::new(EposCommand::new(*kind, poll)));
        }
        registry.add_generator(Box::new(TeachIn::new(poll)));
        registry.add_generator(Box::new(EposHoming::new()));
        registry.add_generator(Box::new(EposControl::new()));

        registry.add_subtask(Box::new(PosesFile::new(poll)));

        registry
    }

    /// Register a generator under its own name, replacing any previous one.
    pub fn add_generator(&mut self, generator: Box<dyn Generator>) {
        let name = generator.name().to_string();
        if self.generators.insert(name.clone(), generator).is_some() {
            warn!("Generator {} registered twice", name);
        }
    }

    /// Register a subtask under its own name, replacing any previous one.
    pub fn add_subtask(&mut self, subtask: Box<dyn Subtask>) {
        let name = subtask.name().to_string();
        if self.subtasks.insert(name.clone(), subtask).is_some() {
            warn!("Subtask {} registered twice", name);
        }
    }

    /// Look a command name up. Generators take precedence over subtasks of the same name.
    pub fn resolve(&mut self, name: &str) -> Option<Target<'_>> {
        if let Some(g) = self.generators.get_mut(name) {
            return Some(Target::Generator(g.as_mut()));
        }

        self.subtasks
            .get_mut(name)
            .map(|s| Target::Subtask(s.as_mut()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(name) || self.subtasks.contains_key(name)
    }

    /// Names of every registered generator then every registered subtask.
    pub fn names(&self) -> Vec<&str> {
        self.generators
            .keys()
            .chain(self.subtasks.keys())
            .map(|k| k.as_str())
            .collect()
    }
}
