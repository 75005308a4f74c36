//! Pass-through control of a wrapped climate device

mod common;

use common::*;
use serde_json::json;
use vtherm_actuator::ActuatorCommand;
use vtherm_core::events::StateChangedData;
use vtherm_core::{Clock, HvacAction, HvacMode, Preset, SensorState};
use vtherm_engine::{Ingest, RejectReason, ThermostatOverride};

/// A state change reported by the wrapped climate device
fn climate_report(
    h: &Harness,
    mode: &str,
    action: &str,
    temperature: Option<f64>,
) -> StateChangedData {
    let at = h.clock.now();
    let mut state = SensorState::at(entity("climate.heater"), mode, at)
        .with_attribute("hvac_action", json!(action));
    if let Some(t) = temperature {
        state = state.with_attribute("temperature", json!(t));
    }
    StateChangedData {
        entity_id: entity("climate.heater"),
        old_state: None,
        new_state: Some(state),
    }
}

#[tokio::test(start_paused = true)]
async fn forwards_mode_and_setpoint() {
    let mut h = build(CLIMATE_CONFIG);

    h.thermostat.set_hvac_mode(HvacMode::Heat).await;
    send_temperature(&mut h, 18.0).await;
    settle().await;

    let commands: Vec<_> = h.sink.commands().into_iter().map(|(_, c)| c).collect();
    assert!(commands.contains(&ActuatorCommand::SetHvacMode(HvacMode::Heat)));
    assert!(commands.contains(&ActuatorCommand::SetTemperature(19.0)));

    // The realized action is read back from the device, not assumed
    assert_eq!(h.thermostat.hvac_action(), HvacAction::Idle);
    h.thermostat
        .on_underlying_changed(&climate_report(&h, "heat", "heating", None))
        .await;
    settle().await;
    assert_eq!(h.thermostat.hvac_action(), HvacAction::Heating);
}

#[tokio::test(start_paused = true)]
async fn setpoint_is_not_resent_when_unchanged() {
    let mut h = build(CLIMATE_CONFIG);

    h.thermostat.set_hvac_mode(HvacMode::Heat).await;
    send_temperature(&mut h, 18.0).await;
    settle().await;
    let sets_before = h
        .sink
        .commands()
        .iter()
        .filter(|(_, c)| matches!(c, ActuatorCommand::SetTemperature(_)))
        .count();

    h.clock.advance_seconds(60);
    send_temperature(&mut h, 18.3).await;
    settle().await;
    let sets_after = h
        .sink
        .commands()
        .iter()
        .filter(|(_, c)| matches!(c, ActuatorCommand::SetTemperature(_)))
        .count();
    assert_eq!(sets_before, sets_after);

    h.thermostat.set_preset(Preset::Boost).await;
    settle().await;
    assert_eq!(
        h.sink.last_for(&entity("climate.heater")),
        Some(ActuatorCommand::SetTemperature(21.0))
    );
}

#[tokio::test(start_paused = true)]
async fn window_override_turns_the_device_off() {
    let mut h = build(CLIMATE_CONFIG);

    h.thermostat.set_hvac_mode(HvacMode::Heat).await;
    send_temperature(&mut h, 15.0).await;
    settle().await;

    send_window(&mut h, true, Some(false)).await;
    settle().await;
    assert_eq!(h.thermostat.active_override(), ThermostatOverride::WindowOpen);
    assert_eq!(
        h.sink.last_for(&entity("climate.heater")),
        Some(ActuatorCommand::SetHvacMode(HvacMode::Off))
    );

    send_window(&mut h, false, Some(true)).await;
    settle().await;
    assert_eq!(
        h.sink.last_for(&entity("climate.heater")),
        Some(ActuatorCommand::SetHvacMode(HvacMode::Heat))
    );
}

#[tokio::test(start_paused = true)]
async fn adopts_mode_changed_on_the_device() {
    let mut h = build(CLIMATE_CONFIG);

    h.thermostat.set_hvac_mode(HvacMode::Heat).await;
    send_temperature(&mut h, 18.0).await;
    settle().await;

    // Someone changed the device itself
    let outcome = h
        .thermostat
        .on_underlying_changed(&climate_report(&h, "cool", "cooling", None))
        .await;
    settle().await;

    assert!(outcome.is_accepted());
    assert_eq!(h.thermostat.hvac_mode(), HvacMode::Cool);
    assert_eq!(h.thermostat.hvac_action(), HvacAction::Cooling);
}

#[tokio::test(start_paused = true)]
async fn unavailable_device_report_is_ignored() {
    let mut h = build(CLIMATE_CONFIG);

    h.thermostat.set_hvac_mode(HvacMode::Heat).await;
    send_temperature(&mut h, 18.0).await;
    settle().await;

    let at = h.clock.now();
    let outcome = h
        .thermostat
        .on_underlying_changed(&StateChangedData {
            entity_id: entity("climate.heater"),
            old_state: None,
            new_state: Some(SensorState::at(entity("climate.heater"), "unavailable", at)),
        })
        .await;

    assert_eq!(outcome, Ingest::Rejected(RejectReason::Missing));
    assert_eq!(h.thermostat.hvac_mode(), HvacMode::Heat);
}

#[tokio::test(start_paused = true)]
async fn unregulated_device_receives_the_manual_setpoint() {
    let mut h = build(CLIMATE_NOT_REGULATED_CONFIG);

    h.thermostat.set_hvac_mode(HvacMode::Heat).await;
    h.thermostat.set_preset(Preset::Boost).await;
    send_temperature(&mut h, 15.0).await;
    settle().await;

    // The engine's own target follows the preset, but the forwarded
    // setpoint stays the user's
    assert_eq!(h.thermostat.target_temperature(), Some(21.0));
    assert_eq!(
        h.sink.last_for(&entity("climate.heater")),
        Some(ActuatorCommand::SetTemperature(19.0))
    );

    h.thermostat.set_target_temperature(18.0).await;
    settle().await;
    assert_eq!(
        h.sink.last_for(&entity("climate.heater")),
        Some(ActuatorCommand::SetTemperature(18.0))
    );
}
