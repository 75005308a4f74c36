//! The three underlying actuator kinds
//!
//! A uniform capability surface over an on/off switch, a group of
//! switches and a wrapped climate device. Commands are best effort; the
//! locally tracked on/off and mode fields are refreshed from state-change
//! read-backs, never assumed from the commands we sent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};
use vtherm_core::{EntityId, HvacAction, HvacMode, SensorState};

use crate::command::{fan_out, ActuatorCommand, CommandSink};
use crate::cycler::DutyCycler;

/// A single on/off switch driven by a duty cycle
pub struct UnderlyingSwitch {
    entity_id: EntityId,
    sink: Arc<dyn CommandSink>,
    cycler: DutyCycler,
    reported_on: bool,
}

impl UnderlyingSwitch {
    pub fn new(entity_id: EntityId, sink: Arc<dyn CommandSink>) -> Self {
        let cycler = DutyCycler::new(Arc::clone(&sink), vec![entity_id.clone()]);
        Self {
            entity_id,
            sink,
            cycler,
            reported_on: false,
        }
    }
}

/// Several switches commanded together by one duty cycle
pub struct UnderlyingSwitchGroup {
    members: Vec<EntityId>,
    sink: Arc<dyn CommandSink>,
    cycler: DutyCycler,
    reported_on: HashMap<EntityId, bool>,
}

impl UnderlyingSwitchGroup {
    pub fn new(members: Vec<EntityId>, sink: Arc<dyn CommandSink>) -> Self {
        let cycler = DutyCycler::new(Arc::clone(&sink), members.clone());
        let reported_on = members.iter().map(|id| (id.clone(), false)).collect();
        Self {
            members,
            sink,
            cycler,
            reported_on,
        }
    }
}

/// A wrapped climate device receiving mode and setpoint commands
pub struct UnderlyingClimate {
    entity_id: EntityId,
    sink: Arc<dyn CommandSink>,
    reported_mode: Option<HvacMode>,
    reported_action: Option<HvacAction>,
    reported_target: Option<f64>,
}

impl UnderlyingClimate {
    pub fn new(entity_id: EntityId, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            entity_id,
            sink,
            reported_mode: None,
            reported_action: None,
            reported_target: None,
        }
    }
}

/// The underlying actuator a thermostat entity drives
pub enum UnderlyingActuator {
    Switch(UnderlyingSwitch),
    SwitchGroup(UnderlyingSwitchGroup),
    Climate(UnderlyingClimate),
}

impl UnderlyingActuator {
    /// Every actuator entity this thermostat commands
    pub fn entity_ids(&self) -> Vec<&EntityId> {
        match self {
            UnderlyingActuator::Switch(s) => vec![&s.entity_id],
            UnderlyingActuator::SwitchGroup(g) => g.members.iter().collect(),
            UnderlyingActuator::Climate(c) => vec![&c.entity_id],
        }
    }

    /// Whether the actuator is a wrapped climate device
    pub fn is_climate(&self) -> bool {
        matches!(self, UnderlyingActuator::Climate(_))
    }

    /// Last reported power state; a group is on when any member is on
    pub fn is_on(&self) -> bool {
        match self {
            UnderlyingActuator::Switch(s) => s.reported_on,
            UnderlyingActuator::SwitchGroup(g) => g.reported_on.values().any(|on| *on),
            UnderlyingActuator::Climate(c) => {
                c.reported_mode.is_some_and(|mode| !mode.is_off())
            }
        }
    }

    /// Realize the given mode: switches turn on, a climate device is set
    /// to the mode itself
    pub async fn turn_on(&self, mode: HvacMode) {
        match self {
            UnderlyingActuator::Switch(s) => {
                send_logged(&s.sink, &s.entity_id, ActuatorCommand::TurnOn).await;
            }
            UnderlyingActuator::SwitchGroup(g) => {
                fan_out(&g.sink, &g.members, ActuatorCommand::TurnOn).await;
            }
            UnderlyingActuator::Climate(c) => {
                send_logged(&c.sink, &c.entity_id, ActuatorCommand::SetHvacMode(mode)).await;
            }
        }
    }

    /// Switch everything off (a climate device is set to mode off)
    pub async fn turn_off(&self) {
        match self {
            UnderlyingActuator::Switch(s) => {
                send_logged(&s.sink, &s.entity_id, ActuatorCommand::TurnOff).await;
            }
            UnderlyingActuator::SwitchGroup(g) => {
                fan_out(&g.sink, &g.members, ActuatorCommand::TurnOff).await;
            }
            UnderlyingActuator::Climate(c) => {
                send_logged(
                    &c.sink,
                    &c.entity_id,
                    ActuatorCommand::SetHvacMode(HvacMode::Off),
                )
                .await;
            }
        }
    }

    /// Forward a setpoint to a climate device; no-op for switch kinds
    pub async fn set_temperature(&self, value: f64) {
        if let UnderlyingActuator::Climate(c) = self {
            send_logged(&c.sink, &c.entity_id, ActuatorCommand::SetTemperature(value)).await;
        }
    }

    /// Start the duty cycle on switch kinds; no-op for climate
    pub fn start_cycle(&mut self, ratio: f64, period: Duration) {
        match self {
            UnderlyingActuator::Switch(s) => s.cycler.start(ratio, period),
            UnderlyingActuator::SwitchGroup(g) => g.cycler.start(ratio, period),
            UnderlyingActuator::Climate(_) => {
                trace!("Climate actuator has no duty cycle");
            }
        }
    }

    /// Cancel any scheduled duty-cycle transition
    pub fn cancel_cycle(&mut self) {
        match self {
            UnderlyingActuator::Switch(s) => s.cycler.cancel(),
            UnderlyingActuator::SwitchGroup(g) => g.cycler.cancel(),
            UnderlyingActuator::Climate(_) => {}
        }
    }

    /// Whether a duty cycle still has scheduled transitions
    pub fn has_active_cycle(&self) -> bool {
        match self {
            UnderlyingActuator::Switch(s) => s.cycler.is_running(),
            UnderlyingActuator::SwitchGroup(g) => g.cycler.is_running(),
            UnderlyingActuator::Climate(_) => false,
        }
    }

    /// The HVAC action reported by a wrapped climate device
    pub fn hvac_action(&self) -> Option<HvacAction> {
        match self {
            UnderlyingActuator::Climate(c) => c.reported_action,
            _ => None,
        }
    }

    /// The HVAC mode reported by a wrapped climate device
    pub fn hvac_mode(&self) -> Option<HvacMode> {
        match self {
            UnderlyingActuator::Climate(c) => c.reported_mode,
            _ => None,
        }
    }

    /// The target temperature reported by a wrapped climate device
    pub fn target_temperature(&self) -> Option<f64> {
        match self {
            UnderlyingActuator::Climate(c) => c.reported_target,
            _ => None,
        }
    }

    /// Reconcile the locally tracked state with a read-back from the bus
    pub fn note_reported_state(&mut self, state: &SensorState) {
        match self {
            UnderlyingActuator::Switch(s) => {
                if state.entity_id == s.entity_id {
                    if let Some(on) = state.is_on() {
                        s.reported_on = on;
                    }
                }
            }
            UnderlyingActuator::SwitchGroup(g) => {
                if let Some(on) = state.is_on() {
                    if let Some(entry) = g.reported_on.get_mut(&state.entity_id) {
                        *entry = on;
                    }
                }
            }
            UnderlyingActuator::Climate(c) => {
                if state.entity_id != c.entity_id || state.is_missing() {
                    return;
                }
                match state.state.parse::<HvacMode>() {
                    Ok(mode) => c.reported_mode = Some(mode),
                    Err(e) => warn!(entity_id = %state.entity_id, error = %e,
                        "Ignoring unparseable climate state"),
                }
                if let Some(action) = state.attribute::<String>("hvac_action") {
                    if let Ok(action) = action.parse::<HvacAction>() {
                        c.reported_action = Some(action);
                    }
                }
                if let Some(target) = state.attribute::<f64>("temperature") {
                    c.reported_target = Some(target);
                }
            }
        }
    }
}

async fn send_logged(sink: &Arc<dyn CommandSink>, target: &EntityId, command: ActuatorCommand) {
    if let Err(e) = sink.send(target, command).await {
        warn!(entity_id = %target, error = %e, "Actuator command failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use chrono::Utc;
    use serde_json::json;

    fn switch(name: &str) -> EntityId {
        EntityId::new("switch", name).unwrap()
    }

    #[tokio::test]
    async fn test_switch_read_back() {
        let sink = Arc::new(RecordingSink::new());
        let mut actuator =
            UnderlyingActuator::Switch(UnderlyingSwitch::new(switch("heater"), sink));

        assert!(!actuator.is_on());
        actuator.note_reported_state(&SensorState::at(switch("heater"), "on", Utc::now()));
        assert!(actuator.is_on());
        actuator.note_reported_state(&SensorState::at(switch("heater"), "off", Utc::now()));
        assert!(!actuator.is_on());

        // An unknown value does not change the tracked state
        actuator.note_reported_state(&SensorState::at(switch("heater"), "on", Utc::now()));
        actuator.note_reported_state(&SensorState::at(switch("heater"), "unknown", Utc::now()));
        assert!(actuator.is_on());
    }

    #[tokio::test]
    async fn test_group_is_on_any_member() {
        let sink = Arc::new(RecordingSink::new());
        let members = vec![switch("heater_1"), switch("heater_2")];
        let mut actuator =
            UnderlyingActuator::SwitchGroup(UnderlyingSwitchGroup::new(members, sink));

        assert!(!actuator.is_on());
        actuator.note_reported_state(&SensorState::at(switch("heater_2"), "on", Utc::now()));
        assert!(actuator.is_on());
        actuator.note_reported_state(&SensorState::at(switch("heater_2"), "off", Utc::now()));
        assert!(!actuator.is_on());
    }

    #[tokio::test]
    async fn test_group_turn_off_reaches_all_members() {
        let sink = Arc::new(RecordingSink::new());
        let members = vec![switch("heater_1"), switch("heater_2")];
        let actuator = UnderlyingActuator::SwitchGroup(UnderlyingSwitchGroup::new(
            members.clone(),
            sink.clone(),
        ));

        actuator.turn_off().await;
        let commands = sink.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|(_, c)| *c == ActuatorCommand::TurnOff));
    }

    #[tokio::test]
    async fn test_climate_commands() {
        let sink = Arc::new(RecordingSink::new());
        let heater = EntityId::new("climate", "heater").unwrap();
        let actuator =
            UnderlyingActuator::Climate(UnderlyingClimate::new(heater.clone(), sink.clone()));

        actuator.turn_on(HvacMode::Heat).await;
        actuator.set_temperature(20.5).await;
        actuator.turn_off().await;

        assert_eq!(
            sink.commands()
                .into_iter()
                .map(|(_, c)| c)
                .collect::<Vec<_>>(),
            vec![
                ActuatorCommand::SetHvacMode(HvacMode::Heat),
                ActuatorCommand::SetTemperature(20.5),
                ActuatorCommand::SetHvacMode(HvacMode::Off),
            ]
        );
    }

    #[tokio::test]
    async fn test_climate_read_back() {
        let sink = Arc::new(RecordingSink::new());
        let heater = EntityId::new("climate", "heater").unwrap();
        let mut actuator =
            UnderlyingActuator::Climate(UnderlyingClimate::new(heater.clone(), sink));

        let state = SensorState::at(heater.clone(), "heat", Utc::now())
            .with_attribute("hvac_action", json!("heating"))
            .with_attribute("temperature", json!(21.0));
        actuator.note_reported_state(&state);

        assert_eq!(actuator.hvac_mode(), Some(HvacMode::Heat));
        assert_eq!(actuator.hvac_action(), Some(HvacAction::Heating));
        assert_eq!(actuator.target_temperature(), Some(21.0));
        assert!(actuator.is_on());

        // Unavailable reports leave the tracked state untouched
        actuator.note_reported_state(&SensorState::at(heater, "unavailable", Utc::now()));
        assert_eq!(actuator.hvac_mode(), Some(HvacMode::Heat));
    }
}
