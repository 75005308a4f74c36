//! Actuator command boundary
//!
//! Commands to underlying devices are fire-and-forget with best-effort
//! delivery: failures are logged, never propagated into a regulation
//! decision. The engine re-derives the actual actuator state from the
//! next state-change read-back.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use vtherm_core::{EntityId, HvacMode};

/// A command sent to an underlying actuator
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCommand {
    /// Switch the actuator on
    TurnOn,
    /// Switch the actuator off
    TurnOff,
    /// Set the target temperature of a climate actuator
    SetTemperature(f64),
    /// Set the HVAC mode of a climate actuator
    SetHvacMode(HvacMode),
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorCommand::TurnOn => write!(f, "turn_on"),
            ActuatorCommand::TurnOff => write!(f, "turn_off"),
            ActuatorCommand::SetTemperature(value) => write!(f, "set_temperature({})", value),
            ActuatorCommand::SetHvacMode(mode) => write!(f, "set_hvac_mode({})", mode),
        }
    }
}

/// Error delivering a command to an underlying actuator
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("actuator {entity_id} did not accept {command}: {reason}")]
    Rejected {
        entity_id: EntityId,
        command: String,
        reason: String,
    },
}

/// Sink delivering commands to the host platform's devices
///
/// The engine never blocks on confirmation; a send either succeeds
/// immediately (was queued) or reports a rejection the caller logs.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Deliver one command to one actuator entity
    async fn send(&self, target: &EntityId, command: ActuatorCommand) -> Result<(), CommandError>;
}

/// Deliver a command to several actuators concurrently, best effort
///
/// A member's failure is logged and does not block the others.
pub async fn fan_out(sink: &Arc<dyn CommandSink>, targets: &[EntityId], command: ActuatorCommand) {
    let sends = targets
        .iter()
        .map(|target| sink.send(target, command.clone()));
    for (target, result) in targets.iter().zip(futures::future::join_all(sends).await) {
        if let Err(e) = result {
            warn!(entity_id = %target, error = %e, "Actuator command failed");
        }
    }
}
