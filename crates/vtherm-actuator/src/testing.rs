//! Test doubles for the actuator boundary

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use vtherm_core::EntityId;

use crate::command::{ActuatorCommand, CommandError, CommandSink};

/// A command sink that records every command it receives
///
/// Entities registered with [`RecordingSink::fail_entity`] reject their
/// commands, simulating an unresponsive device.
#[derive(Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<(EntityId, ActuatorCommand)>>,
    failing: Mutex<HashSet<EntityId>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command recorded so far, in send order
    pub fn commands(&self) -> Vec<(EntityId, ActuatorCommand)> {
        self.commands.lock().unwrap().clone()
    }

    /// Drain and return the recorded commands
    pub fn take(&self) -> Vec<(EntityId, ActuatorCommand)> {
        std::mem::take(&mut self.commands.lock().unwrap())
    }

    /// The last command sent to the given entity
    pub fn last_for(&self, entity_id: &EntityId) -> Option<ActuatorCommand> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == entity_id)
            .map(|(_, c)| c.clone())
    }

    /// Make every future command to this entity fail
    pub fn fail_entity(&self, entity_id: EntityId) {
        self.failing.lock().unwrap().insert(entity_id);
    }
}

#[async_trait]
impl CommandSink for RecordingSink {
    async fn send(&self, target: &EntityId, command: ActuatorCommand) -> Result<(), CommandError> {
        if self.failing.lock().unwrap().contains(target) {
            return Err(CommandError::Rejected {
                entity_id: target.clone(),
                command: command.to_string(),
                reason: "simulated unresponsive device".into(),
            });
        }
        self.commands.lock().unwrap().push((target.clone(), command));
        Ok(())
    }
}
