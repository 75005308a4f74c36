//! The thermostat entity and its regulation state machine

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use vtherm_actuator::{
    CommandSink, UnderlyingActuator, UnderlyingClimate, UnderlyingSwitch, UnderlyingSwitchGroup,
};
use vtherm_config::{ActuatorConfig, ConfigError, PresetTable, ThermostatConfig};
use vtherm_core::{Clock, Context, HvacAction, HvacMode, Preset};
use vtherm_event_bus::EventBus;

use crate::events::{ThermostatEventData, ThermostatEventKind};
use crate::regulation::{demand_for, Demand};
use crate::tpi::TpiAlgorithm;

/// A sensor reading together with the time it was accepted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub at: DateTime<Utc>,
}

/// The override condition currently shaping the regulation decision
///
/// At most one is active; arbitration order is window > power > absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThermostatOverride {
    #[default]
    None,
    /// Open window suppresses all demand
    WindowOpen,
    /// Power draw at or above the ceiling suppresses all demand
    PowerLimit,
    /// Nobody home, targets come from the away preset table
    Absence,
}

impl ThermostatOverride {
    /// Whether this override suppresses heating/cooling entirely
    pub fn suppresses(&self) -> bool {
        matches!(self, ThermostatOverride::WindowOpen | ThermostatOverride::PowerLimit)
    }
}

impl fmt::Display for ThermostatOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThermostatOverride::None => "none",
            ThermostatOverride::WindowOpen => "window_open",
            ThermostatOverride::PowerLimit => "power_limit",
            ThermostatOverride::Absence => "absence",
        };
        write!(f, "{}", s)
    }
}

/// The thermostat entity
///
/// Holds the regulation state and drives the underlying actuator. All
/// mutation goes through the ingestion handlers and the explicit command
/// entry points; each call runs to completion before the next (the
/// runtime serializes them on one task).
pub struct Thermostat {
    pub(crate) config: ThermostatConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) underlying: UnderlyingActuator,
    pub(crate) tpi: TpiAlgorithm,

    pub(crate) hvac_mode: HvacMode,
    pub(crate) hvac_action: HvacAction,
    pub(crate) preset: Preset,
    pub(crate) manual_target: f64,
    pub(crate) target_temperature: Option<f64>,
    pub(crate) on_ratio: f64,

    pub(crate) current_temp: Option<Reading>,
    pub(crate) outdoor_temp: Option<Reading>,
    pub(crate) power: Option<Reading>,
    pub(crate) power_ceiling: Option<Reading>,

    pub(crate) window_open: bool,
    pub(crate) window_at: Option<DateTime<Utc>>,
    pub(crate) motion: bool,
    pub(crate) motion_at: Option<DateTime<Utc>>,
    pub(crate) presence: Option<bool>,
    pub(crate) presence_at: Option<DateTime<Utc>>,
    pub(crate) underlying_at: Option<DateTime<Utc>>,

    pub(crate) active_override: ThermostatOverride,
    pub(crate) degraded: bool,

    // Last commands forwarded to a wrapped climate device, to avoid
    // re-sending an unchanged mode or setpoint on every recompute
    pub(crate) climate_commanded_mode: Option<HvacMode>,
    pub(crate) climate_forwarded_target: Option<f64>,
}

impl Thermostat {
    /// Build the entity from its configuration record
    ///
    /// Configuration inconsistencies are fatal: the entity is never
    /// created and the error surfaces to the caller's availability
    /// handling.
    pub fn new(
        config: ThermostatConfig,
        bus: Arc<EventBus>,
        sink: Arc<dyn CommandSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let underlying = match &config.actuator {
            ActuatorConfig::Switch { entity_id } => UnderlyingActuator::Switch(
                UnderlyingSwitch::new(entity_id.clone(), Arc::clone(&sink)),
            ),
            ActuatorConfig::SwitchGroup { entity_ids } => UnderlyingActuator::SwitchGroup(
                UnderlyingSwitchGroup::new(entity_ids.clone(), Arc::clone(&sink)),
            ),
            ActuatorConfig::Climate { entity_id, .. } => UnderlyingActuator::Climate(
                UnderlyingClimate::new(entity_id.clone(), Arc::clone(&sink)),
            ),
        };

        let tpi = TpiAlgorithm::new(&config.tpi);
        let manual_target = config.clamp_target(config.presets.comfort);

        debug!(entity = %config.unique_id, "Creating thermostat");

        Ok(Self {
            config,
            clock,
            bus,
            underlying,
            tpi,
            hvac_mode: HvacMode::Off,
            hvac_action: HvacAction::Off,
            preset: Preset::None,
            manual_target,
            target_temperature: None,
            on_ratio: 0.0,
            current_temp: None,
            outdoor_temp: None,
            power: None,
            power_ceiling: None,
            window_open: false,
            window_at: None,
            motion: false,
            motion_at: None,
            presence: None,
            presence_at: None,
            underlying_at: None,
            active_override: ThermostatOverride::None,
            degraded: false,
            climate_commanded_mode: None,
            climate_forwarded_target: None,
        })
    }

    // --- Read surface ---

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.hvac_mode
    }

    pub fn hvac_action(&self) -> HvacAction {
        self.hvac_action
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// The effective target temperature after presets and overrides
    pub fn target_temperature(&self) -> Option<f64> {
        self.target_temperature
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.current_temp.map(|r| r.value)
    }

    /// The last computed duty-cycle ratio
    pub fn on_ratio(&self) -> f64 {
        self.on_ratio
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn window_open(&self) -> bool {
        self.window_open
    }

    pub fn active_override(&self) -> ThermostatOverride {
        self.active_override
    }

    /// Whether the underlying actuator still has scheduled duty-cycle
    /// transitions
    pub fn has_active_cycle(&self) -> bool {
        self.underlying.has_active_cycle()
    }

    /// Last reported power state of the underlying actuator
    pub fn underlying_is_on(&self) -> bool {
        self.underlying.is_on()
    }

    /// Extra state attributes exposed to the host platform
    pub fn attributes(&self) -> HashMap<String, serde_json::Value> {
        let mut attrs = HashMap::new();
        attrs.insert("hvac_mode".into(), serde_json::json!(self.hvac_mode));
        attrs.insert("hvac_action".into(), serde_json::json!(self.hvac_action));
        attrs.insert("preset".into(), serde_json::json!(self.preset));
        attrs.insert(
            "target_temperature".into(),
            serde_json::json!(self.target_temperature),
        );
        attrs.insert(
            "current_temperature".into(),
            serde_json::json!(self.current_temperature()),
        );
        attrs.insert(
            "outdoor_temperature".into(),
            serde_json::json!(self.outdoor_temp.map(|r| r.value)),
        );
        attrs.insert("power".into(), serde_json::json!(self.power.map(|r| r.value)));
        attrs.insert(
            "power_ceiling".into(),
            serde_json::json!(self.effective_power_ceiling()),
        );
        if let Some((low, high)) = self.target_pair() {
            attrs.insert("target_temperature_low".into(), serde_json::json!(low));
            attrs.insert("target_temperature_high".into(), serde_json::json!(high));
        }
        attrs.insert("on_ratio".into(), serde_json::json!(self.on_ratio));
        attrs.insert("window_open".into(), serde_json::json!(self.window_open));
        attrs.insert("motion".into(), serde_json::json!(self.motion));
        attrs.insert("presence".into(), serde_json::json!(self.presence));
        attrs.insert(
            "active_override".into(),
            serde_json::json!(self.active_override.to_string()),
        );
        attrs.insert("degraded".into(), serde_json::json!(self.degraded));
        attrs.insert("is_on".into(), serde_json::json!(self.underlying.is_on()));
        attrs
    }

    // --- Command entry points ---

    /// Select the operating mode
    #[instrument(skip(self), fields(entity = %self.config.unique_id))]
    pub async fn set_hvac_mode(&mut self, mode: HvacMode) {
        if mode == self.hvac_mode {
            return;
        }
        if mode == HvacMode::Cool && !self.config.ac_mode && !self.underlying.is_climate() {
            warn!("Cooling requested but ac_mode is not enabled");
            return;
        }

        let old = self.hvac_mode;
        self.hvac_mode = mode;
        self.send_event(
            ThermostatEventKind::HvacMode,
            Some(old.to_string()),
            Some(mode.to_string()),
        );

        if mode.is_off() {
            // Must happen before any further notification is processed
            self.underlying.cancel_cycle();
        }
        self.recompute().await;
    }

    /// Select a preset profile
    #[instrument(skip(self), fields(entity = %self.config.unique_id))]
    pub async fn set_preset(&mut self, preset: Preset) {
        if preset == self.preset {
            return;
        }
        if preset == Preset::Activity && self.config.motion.is_none() {
            warn!("Activity preset requires motion management");
            return;
        }

        let old = self.preset;
        self.preset = preset;
        self.send_event(
            ThermostatEventKind::Preset,
            Some(old.to_string()),
            Some(preset.to_string()),
        );
        self.recompute().await;
    }

    /// Set an explicit target temperature, leaving any preset
    #[instrument(skip(self), fields(entity = %self.config.unique_id))]
    pub async fn set_target_temperature(&mut self, value: f64) {
        self.manual_target = self.config.clamp_target(value);
        if self.preset != Preset::None {
            let old = self.preset;
            self.preset = Preset::None;
            self.send_event(
                ThermostatEventKind::Preset,
                Some(old.to_string()),
                Some(Preset::None.to_string()),
            );
        }
        self.recompute().await;
    }

    /// Tear the entity down, cancelling every outstanding duty cycle
    pub async fn shutdown(&mut self) {
        debug!(entity = %self.config.unique_id, "Shutting down thermostat");
        self.underlying.cancel_cycle();
    }

    // --- Regulation ---

    /// Recompute the regulation decision from the current fields
    ///
    /// Deterministic given the entity state: override arbitration, target
    /// resolution, hysteresis demand, then the actuator command (duty
    /// cycle or climate pass-through).
    #[instrument(skip(self), fields(entity = %self.config.unique_id))]
    pub async fn recompute(&mut self) {
        let target = self.resolve_target();
        self.set_target(target);

        if self.hvac_mode.is_off() {
            self.update_override(ThermostatOverride::None);
            if self.hvac_action != HvacAction::Off {
                self.underlying.cancel_cycle();
                self.underlying.turn_off().await;
                if self.underlying.is_climate() {
                    self.climate_commanded_mode = Some(HvacMode::Off);
                }
                self.set_action(HvacAction::Off);
            }
            return;
        }

        // No valid indoor reading within the staleness window: report the
        // degraded state and stay idle rather than heat blindly.
        let now = self.clock.now();
        let current = match &self.current_temp {
            Some(r) if now.signed_duration_since(r.at) <= self.config.sensor_staleness() => {
                Some(r.value)
            }
            _ => None,
        };
        self.update_degraded(current.is_none());
        let Some(current) = current else {
            self.idle_actuator().await;
            return;
        };

        let active = self.compute_override();
        self.update_override(active);
        let suppressed = active.suppresses();

        if self.underlying.is_climate() {
            self.recompute_climate(suppressed, target).await;
            return;
        }

        let demand = if suppressed {
            Demand::Idle
        } else {
            demand_for(
                self.hvac_mode,
                current,
                target,
                self.config.hysteresis,
                self.hvac_action,
            )
        };

        let cooling = demand == Demand::Cool;
        let period = self.config.cycle_period();
        let ratio = match demand {
            Demand::Idle => 0.0,
            _ => {
                let outdoor = self.outdoor_temp.map(|r| r.value);
                let raw = self.tpi.on_ratio(target, current, outdoor, cooling);
                self.tpi.round_short_activation(raw, period)
            }
        };
        self.on_ratio = ratio;

        if ratio <= 0.0 {
            if self.hvac_action != HvacAction::Idle {
                // Replaces any running cycle with a single off command
                self.underlying.start_cycle(0.0, period);
                self.set_action(HvacAction::Idle);
            }
        } else {
            self.underlying.start_cycle(ratio, period);
            self.set_action(if cooling {
                HvacAction::Cooling
            } else {
                HvacAction::Heating
            });
        }
    }

    /// Pass-through control of a wrapped climate device
    async fn recompute_climate(&mut self, suppressed: bool, target: f64) {
        if suppressed {
            if self.climate_commanded_mode != Some(HvacMode::Off) {
                self.underlying.turn_off().await;
                self.climate_commanded_mode = Some(HvacMode::Off);
            }
            self.set_action(HvacAction::Idle);
            return;
        }

        if self.climate_commanded_mode != Some(self.hvac_mode) {
            self.underlying.turn_on(self.hvac_mode).await;
            self.climate_commanded_mode = Some(self.hvac_mode);
        }

        let regulated = matches!(
            &self.config.actuator,
            ActuatorConfig::Climate { regulated: true, .. }
        );
        let forwarded = if regulated { target } else { self.manual_target };
        if self.climate_forwarded_target != Some(forwarded) {
            self.underlying.set_temperature(forwarded).await;
            self.climate_forwarded_target = Some(forwarded);
        }

        let action = self.underlying.hvac_action().unwrap_or(HvacAction::Idle);
        self.set_action(action);
    }

    /// Cancel the cycle and command everything off, keeping mode
    async fn idle_actuator(&mut self) {
        if self.hvac_action != HvacAction::Idle {
            self.underlying.cancel_cycle();
            self.underlying.turn_off().await;
            if self.underlying.is_climate() {
                self.climate_commanded_mode = Some(HvacMode::Off);
            }
            self.on_ratio = 0.0;
            self.set_action(HvacAction::Idle);
        }
    }

    /// Arbitrate the override conditions, window > power > absence
    fn compute_override(&self) -> ThermostatOverride {
        if self.config.window.is_some() && self.window_open {
            return ThermostatOverride::WindowOpen;
        }
        if let Some(power_config) = &self.config.power {
            let ceiling = self
                .power_ceiling
                .map(|r| r.value)
                .or(power_config.default_ceiling);
            if let (Some(power), Some(ceiling)) = (self.power, ceiling) {
                if power.value >= ceiling {
                    return ThermostatOverride::PowerLimit;
                }
            }
        }
        if self.config.presence.is_some() && self.presence == Some(false) {
            return ThermostatOverride::Absence;
        }
        ThermostatOverride::None
    }

    /// Resolve the effective target temperature from preset and flags
    fn resolve_target(&self) -> f64 {
        let away = self
            .config
            .presence
            .as_ref()
            .filter(|_| self.presence == Some(false))
            .map(|p| &p.away);
        let table = away.unwrap_or_else(|| self.config.preset_table(self.hvac_mode));
        self.target_from_table(table)
    }

    fn target_from_table(&self, table: &PresetTable) -> f64 {
        let value = match self.preset {
            Preset::None => self.manual_target,
            Preset::Activity => match &self.config.motion {
                Some(motion) => {
                    let preset = if self.motion {
                        motion.motion_preset
                    } else {
                        motion.no_motion_preset
                    };
                    table.temperature_for(preset).unwrap_or(self.manual_target)
                }
                None => self.manual_target,
            },
            preset => table.temperature_for(preset).unwrap_or(self.manual_target),
        };
        self.config.clamp_target(value)
    }

    /// The heating/cooling setpoint pair of an AC configuration
    pub fn target_pair(&self) -> Option<(f64, f64)> {
        if !self.config.ac_mode {
            return None;
        }
        let low = self.target_from_table(&self.config.presets);
        let high = self.target_from_table(
            self.config.ac_presets.as_ref().unwrap_or(&self.config.presets),
        );
        Some((low, high))
    }

    fn effective_power_ceiling(&self) -> Option<f64> {
        self.power_ceiling
            .map(|r| r.value)
            .or_else(|| self.config.power.as_ref().and_then(|p| p.default_ceiling))
    }

    // --- Transition bookkeeping ---

    pub(crate) fn send_event(
        &self,
        kind: ThermostatEventKind,
        old: Option<String>,
        new: Option<String>,
    ) {
        self.bus.fire_typed(
            ThermostatEventData {
                entity: self.config.unique_id.clone(),
                kind,
                old,
                new,
            },
            Context::new(),
            self.clock.now(),
        );
    }

    fn set_action(&mut self, action: HvacAction) {
        if self.hvac_action != action {
            debug!(old = %self.hvac_action, new = %action, "HVAC action changed");
            self.send_event(
                ThermostatEventKind::HvacAction,
                Some(self.hvac_action.to_string()),
                Some(action.to_string()),
            );
            self.hvac_action = action;
        }
    }

    fn set_target(&mut self, target: f64) {
        if self.target_temperature != Some(target) {
            self.send_event(
                ThermostatEventKind::Target,
                self.target_temperature.map(|t| t.to_string()),
                Some(target.to_string()),
            );
            self.target_temperature = Some(target);
        }
    }

    fn update_override(&mut self, active: ThermostatOverride) {
        if self.active_override != active {
            debug!(old = %self.active_override, new = %active, "Override changed");
            self.send_event(
                ThermostatEventKind::Override,
                Some(self.active_override.to_string()),
                Some(active.to_string()),
            );
            self.active_override = active;
        }
    }

    fn update_degraded(&mut self, degraded: bool) {
        if self.degraded != degraded {
            if degraded {
                warn!(entity = %self.config.unique_id,
                    "Indoor temperature missing or stale, regulation degraded");
            }
            self.send_event(
                ThermostatEventKind::Degraded,
                Some(self.degraded.to_string()),
                Some(degraded.to_string()),
            );
            self.degraded = degraded;
        }
    }
}
