//! Shared harness for the engine integration tests
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::Arc;

use vtherm_actuator::testing::RecordingSink;
use vtherm_actuator::ActuatorCommand;
use vtherm_config::ThermostatConfig;
use vtherm_core::events::StateChangedData;
use vtherm_core::{Clock, EntityId, ManualClock, SensorState};
use vtherm_engine::{Ingest, Thermostat};
use vtherm_event_bus::EventBus;

/// Switch thermostat with every management feature enabled
pub const FULL_SWITCH_CONFIG: &str = r#"
name: Living room
unique_id: living_room_thermostat
temperature_sensor: sensor.room_temperature
outdoor_temperature_sensor: sensor.outdoor_temperature
actuator:
  type: switch
  entity_id: switch.heater
window:
  sensor: binary_sensor.window
motion:
  sensor: binary_sensor.motion
power:
  sensor: sensor.power
  ceiling_sensor: sensor.power_ceiling
  default_ceiling: 3000
presence:
  sensor: binary_sensor.presence
"#;

/// Switch thermostat that can also cool, with a separate cooling table
pub const AC_SWITCH_CONFIG: &str = r#"
name: Studio
unique_id: studio_thermostat
temperature_sensor: sensor.room_temperature
actuator:
  type: switch
  entity_id: switch.heater
ac_mode: true
ac_presets:
  frost: 30.0
  eco: 27.0
  comfort: 25.0
  boost: 23.0
"#;

/// Regulated climate-passthrough thermostat
pub const CLIMATE_CONFIG: &str = r#"
name: Bedroom
unique_id: bedroom_thermostat
temperature_sensor: sensor.room_temperature
actuator:
  type: climate
  entity_id: climate.heater
window:
  sensor: binary_sensor.window
"#;

/// Climate-passthrough forwarding the user setpoint verbatim
pub const CLIMATE_NOT_REGULATED_CONFIG: &str = r#"
name: Bedroom
unique_id: bedroom_thermostat
temperature_sensor: sensor.room_temperature
actuator:
  type: climate
  entity_id: climate.heater
  regulated: false
"#;

pub struct Harness {
    pub thermostat: Thermostat,
    pub sink: Arc<RecordingSink>,
    pub clock: ManualClock,
    pub bus: Arc<EventBus>,
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn build(yaml: &str) -> Harness {
    let config = ThermostatConfig::from_yaml_str(yaml).unwrap();
    let bus = Arc::new(EventBus::new());
    let sink = Arc::new(RecordingSink::new());
    let clock = ManualClock::at(start_time());
    let thermostat = Thermostat::new(
        config,
        Arc::clone(&bus),
        sink.clone(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    Harness {
        thermostat,
        sink,
        clock,
        bus,
    }
}

pub fn entity(s: &str) -> EntityId {
    s.parse().unwrap()
}

/// A notification with only a new state
pub fn change(entity_id: &str, value: &str, at: DateTime<Utc>) -> StateChangedData {
    StateChangedData {
        entity_id: entity(entity_id),
        old_state: None,
        new_state: Some(SensorState::at(entity(entity_id), value, at)),
    }
}

/// A binary notification with old and new states
pub fn bool_change(
    entity_id: &str,
    new: bool,
    old: Option<bool>,
    at: DateTime<Utc>,
) -> StateChangedData {
    let as_state = |on: bool| SensorState::at(entity(entity_id), if on { "on" } else { "off" }, at);
    StateChangedData {
        entity_id: entity(entity_id),
        old_state: old.map(as_state),
        new_state: Some(as_state(new)),
    }
}

pub async fn send_temperature(h: &mut Harness, value: f64) -> Ingest {
    let at = h.clock.now();
    h.thermostat
        .on_temperature_changed(&change("sensor.room_temperature", &value.to_string(), at))
        .await
}

pub async fn send_outdoor_temperature(h: &mut Harness, value: f64) -> Ingest {
    let at = h.clock.now();
    h.thermostat
        .on_outdoor_temperature_changed(&change(
            "sensor.outdoor_temperature",
            &value.to_string(),
            at,
        ))
        .await
}

pub async fn send_power(h: &mut Harness, value: f64) -> Ingest {
    let at = h.clock.now();
    h.thermostat
        .on_power_changed(&change("sensor.power", &value.to_string(), at))
        .await
}

pub async fn send_power_ceiling(h: &mut Harness, value: f64) -> Ingest {
    let at = h.clock.now();
    h.thermostat
        .on_power_ceiling_changed(&change("sensor.power_ceiling", &value.to_string(), at))
        .await
}

pub async fn send_window(h: &mut Harness, new: bool, old: Option<bool>) -> Ingest {
    let at = h.clock.now();
    h.thermostat
        .on_window_changed(&bool_change("binary_sensor.window", new, old, at))
        .await
}

pub async fn send_motion(h: &mut Harness, new: bool, old: Option<bool>) -> Ingest {
    let at = h.clock.now();
    h.thermostat
        .on_motion_changed(&bool_change("binary_sensor.motion", new, old, at))
        .await
}

pub async fn send_presence(h: &mut Harness, new: bool, old: Option<bool>) -> Ingest {
    let at = h.clock.now();
    h.thermostat
        .on_presence_changed(&bool_change("binary_sensor.presence", new, old, at))
        .await
}

/// Let spawned cycle tasks run up to their next suspension point
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn count(commands: &[(EntityId, ActuatorCommand)], wanted: &ActuatorCommand) -> usize {
    commands.iter().filter(|(_, c)| c == wanted).count()
}
