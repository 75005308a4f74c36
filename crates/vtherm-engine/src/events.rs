//! Significant events emitted by the thermostat
//!
//! Mode, preset, target and override transitions are published on the
//! event bus for downstream history and automations.

use serde::{Deserialize, Serialize};
use vtherm_core::EventData;

/// Event type carrying every significant thermostat transition
pub const THERMOSTAT_EVENT: &str = "versatile_thermostat_event";

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermostatEventKind {
    HvacMode,
    HvacAction,
    Preset,
    Target,
    Window,
    Motion,
    Presence,
    Override,
    Degraded,
}

/// Payload of a significant thermostat event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatEventData {
    /// The thermostat's unique id
    pub entity: String,
    pub kind: ThermostatEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
}

impl EventData for ThermostatEventData {
    fn event_type() -> &'static str {
        THERMOSTAT_EVENT
    }
}
