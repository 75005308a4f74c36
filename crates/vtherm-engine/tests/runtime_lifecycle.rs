//! Bus-driven lifecycle: subscription pump, dispatch and teardown

mod common;

use common::*;
use std::sync::Arc;
use vtherm_actuator::testing::RecordingSink;
use vtherm_config::{ConfigError, ThermostatConfig};
use vtherm_core::{Clock, Context, HvacAction, HvacMode, ManualClock};
use vtherm_engine::ThermostatRuntime;
use vtherm_event_bus::EventBus;

struct RuntimeHarness {
    runtime: ThermostatRuntime,
    bus: Arc<EventBus>,
    sink: Arc<RecordingSink>,
    clock: ManualClock,
}

fn setup(yaml: &str) -> RuntimeHarness {
    let config = ThermostatConfig::from_yaml_str(yaml).unwrap();
    let bus = Arc::new(EventBus::new());
    let sink = Arc::new(RecordingSink::new());
    let clock = ManualClock::at(start_time());
    let runtime = ThermostatRuntime::setup(
        config,
        Arc::clone(&bus),
        sink.clone(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    RuntimeHarness {
        runtime,
        bus,
        sink,
        clock,
    }
}

/// Give the pump task time to drain the bus
async fn pump_settle() {
    for _ in 0..30 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn notifications_flow_from_the_bus_to_the_engine() {
    let mut h = setup(FULL_SWITCH_CONFIG);

    h.runtime.set_hvac_mode(HvacMode::Heat).await;
    h.bus.fire_state_changed(
        change("sensor.room_temperature", "15.0", h.clock.now()),
        Context::new(),
        h.clock.now(),
    );
    pump_settle().await;

    {
        let thermostat = h.runtime.thermostat().lock().await;
        assert_eq!(thermostat.current_temperature(), Some(15.0));
        assert_eq!(thermostat.hvac_action(), HvacAction::Heating);
    }
    assert!(count(&h.sink.commands(), &vtherm_actuator::ActuatorCommand::TurnOn) >= 1);

    h.bus.fire_state_changed(
        bool_change("binary_sensor.window", true, Some(false), h.clock.now()),
        Context::new(),
        h.clock.now(),
    );
    pump_settle().await;

    let thermostat = h.runtime.thermostat().lock().await;
    assert_eq!(thermostat.hvac_action(), HvacAction::Idle);
    assert!(thermostat.window_open());
    drop(thermostat);

    h.runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unrelated_entities_are_ignored() {
    let mut h = setup(FULL_SWITCH_CONFIG);

    h.runtime.set_hvac_mode(HvacMode::Heat).await;
    h.bus.fire_state_changed(
        change("sensor.some_other_sensor", "99.0", h.clock.now()),
        Context::new(),
        h.clock.now(),
    );
    pump_settle().await;

    {
        let thermostat = h.runtime.thermostat().lock().await;
        assert_eq!(thermostat.current_temperature(), None);
    }

    h.runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn actuator_read_back_updates_is_on() {
    let mut h = setup(FULL_SWITCH_CONFIG);

    h.bus.fire_state_changed(
        change("switch.heater", "on", h.clock.now()),
        Context::new(),
        h.clock.now(),
    );
    pump_settle().await;

    {
        let thermostat = h.runtime.thermostat().lock().await;
        assert!(thermostat.underlying_is_on());
    }

    h.runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_cycles_and_the_pump() {
    let mut h = setup(FULL_SWITCH_CONFIG);

    h.runtime.set_hvac_mode(HvacMode::Heat).await;
    h.bus.fire_state_changed(
        change("sensor.room_temperature", "18.4", h.clock.now()),
        Context::new(),
        h.clock.now(),
    );
    pump_settle().await;
    {
        let thermostat = h.runtime.thermostat().lock().await;
        assert!(thermostat.has_active_cycle());
    }

    h.runtime.stop().await;
    {
        let thermostat = h.runtime.thermostat().lock().await;
        assert!(!thermostat.has_active_cycle());
    }

    // A stopped runtime processes nothing further
    h.bus.fire_state_changed(
        change("sensor.room_temperature", "10.0", h.clock.now()),
        Context::new(),
        h.clock.now(),
    );
    pump_settle().await;
    let thermostat = h.runtime.thermostat().lock().await;
    assert_eq!(thermostat.current_temperature(), Some(18.4));
}

#[tokio::test(start_paused = true)]
async fn inconsistent_configuration_fails_setup() {
    let yaml = r#"
name: Broken
unique_id: broken_thermostat
temperature_sensor: sensor.room_temperature
actuator:
  type: switch_group
  entity_ids: []
"#;
    let config: Result<ThermostatConfig, _> = ThermostatConfig::from_yaml_str(yaml);
    assert!(matches!(config, Err(ConfigError::EmptySwitchGroup)));

    // A config that bypassed the loader still fails at entity creation
    let mut config = ThermostatConfig::from_yaml_str(FULL_SWITCH_CONFIG).unwrap();
    config.min_temp = 40.0;
    let bus = Arc::new(EventBus::new());
    let sink = Arc::new(RecordingSink::new());
    let clock = ManualClock::at(start_time());
    assert!(ThermostatRuntime::setup(config, bus, sink, Arc::new(clock)).is_err());
}
