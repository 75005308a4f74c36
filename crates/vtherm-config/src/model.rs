//! Serde model of the thermostat configuration
//!
//! Optional feature blocks (window, motion, power, presence) enable the
//! corresponding management when present, the way the original merged
//! configuration dictionaries do.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vtherm_core::{EntityId, HvacMode, Preset};

use crate::error::{ConfigError, ConfigResult};

/// The configuration record a thermostat entity is created from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatConfig {
    /// Human-readable display name
    pub name: String,

    /// Stable identifier of the entity
    pub unique_id: String,

    /// Indoor temperature sensor, the regulation input
    pub temperature_sensor: EntityId,

    /// Outdoor temperature sensor feeding the TPI external term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdoor_temperature_sensor: Option<EntityId>,

    /// The underlying actuator this thermostat drives
    pub actuator: ActuatorConfig,

    /// Duty-cycle period for switch actuators, in seconds
    #[serde(default = "default_cycle_period_sec")]
    pub cycle_period_sec: u64,

    /// TPI coefficients
    #[serde(default)]
    pub tpi: TpiConfig,

    /// Lowest allowed target temperature
    #[serde(default = "default_min_temp")]
    pub min_temp: f64,

    /// Highest allowed target temperature
    #[serde(default = "default_max_temp")]
    pub max_temp: f64,

    /// Half-width of the demand dead band around the target
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,

    /// Age beyond which the indoor reading is considered stale, in seconds
    #[serde(default = "default_sensor_staleness_sec")]
    pub sensor_staleness_sec: u64,

    /// Per-preset target temperatures for heating
    #[serde(default)]
    pub presets: PresetTable,

    /// Whether this thermostat can cool
    #[serde(default)]
    pub ac_mode: bool,

    /// Per-preset target temperatures when cooling; falls back to
    /// `presets` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac_presets: Option<PresetTable>,

    /// Window management; present = enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowConfig>,

    /// Motion management for the activity preset; present = enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionConfig>,

    /// Power management; present = enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerConfig>,

    /// Presence management; present = enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceConfig>,
}

/// The underlying actuator kind and its device references
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActuatorConfig {
    /// A single on/off switch driven by a duty cycle
    Switch { entity_id: EntityId },

    /// Several on/off switches driven together by one duty cycle
    SwitchGroup { entity_ids: Vec<EntityId> },

    /// A wrapped climate device receiving mode and setpoint commands
    Climate {
        entity_id: EntityId,
        /// When true the engine recomputes the forwarded setpoint;
        /// when false the user setpoint is passed through verbatim
        #[serde(default = "default_true")]
        regulated: bool,
    },
}

impl ActuatorConfig {
    /// Whether the actuator is a wrapped climate device
    pub fn is_climate(&self) -> bool {
        matches!(self, ActuatorConfig::Climate { .. })
    }

    /// Every entity this actuator references
    pub fn entity_ids(&self) -> Vec<&EntityId> {
        match self {
            ActuatorConfig::Switch { entity_id } => vec![entity_id],
            ActuatorConfig::SwitchGroup { entity_ids } => entity_ids.iter().collect(),
            ActuatorConfig::Climate { entity_id, .. } => vec![entity_id],
        }
    }
}

/// Time-proportional-and-integral coefficients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpiConfig {
    /// Gain applied to the indoor temperature error
    #[serde(default = "default_coef_int")]
    pub coef_int: f64,

    /// Gain applied to the outdoor temperature error
    #[serde(default = "default_coef_ext")]
    pub coef_ext: f64,

    /// On-phases shorter than this are rounded down to zero, in seconds
    #[serde(default = "default_minimal_activation_delay_sec")]
    pub minimal_activation_delay_sec: u64,
}

impl Default for TpiConfig {
    fn default() -> Self {
        Self {
            coef_int: default_coef_int(),
            coef_ext: default_coef_ext(),
            minimal_activation_delay_sec: default_minimal_activation_delay_sec(),
        }
    }
}

/// Target temperature per preset
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PresetTable {
    #[serde(default = "default_frost_temp")]
    pub frost: f64,
    #[serde(default = "default_eco_temp")]
    pub eco: f64,
    #[serde(default = "default_comfort_temp")]
    pub comfort: f64,
    #[serde(default = "default_boost_temp")]
    pub boost: f64,
}

impl PresetTable {
    /// The configured temperature for a preset
    ///
    /// Returns None for `Preset::None` (manual setpoint) and
    /// `Preset::Activity` (resolved through the motion configuration).
    pub fn temperature_for(&self, preset: Preset) -> Option<f64> {
        match preset {
            Preset::Frost => Some(self.frost),
            Preset::Eco => Some(self.eco),
            Preset::Comfort => Some(self.comfort),
            Preset::Boost => Some(self.boost),
            Preset::None | Preset::Activity => None,
        }
    }

    /// Default away targets used by presence management
    pub fn away_defaults() -> Self {
        Self {
            frost: default_frost_temp(),
            eco: 16.0,
            comfort: 17.0,
            boost: 18.0,
        }
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self {
            frost: default_frost_temp(),
            eco: default_eco_temp(),
            comfort: default_comfort_temp(),
            boost: default_boost_temp(),
        }
    }
}

/// Window management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Binary sensor reporting "on" while the window is open
    pub sensor: EntityId,
}

/// Motion management settings backing the activity preset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Binary sensor reporting "on" while motion is detected
    pub sensor: EntityId,

    /// Preset applied while motion is detected
    #[serde(default = "default_motion_preset")]
    pub motion_preset: Preset,

    /// Preset applied while no motion is detected
    #[serde(default = "default_no_motion_preset")]
    pub no_motion_preset: Preset,
}

/// Power management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    /// Sensor reporting the current total power draw
    pub sensor: EntityId,

    /// Sensor reporting the allowed power ceiling
    pub ceiling_sensor: EntityId,

    /// Ceiling used until the ceiling sensor reports a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ceiling: Option<f64>,
}

/// Presence management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Binary sensor reporting "on" while someone is home
    pub sensor: EntityId,

    /// Per-preset targets applied while nobody is home
    #[serde(default = "PresetTable::away_defaults")]
    pub away: PresetTable,
}

impl ThermostatConfig {
    /// The duty-cycle period
    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(self.cycle_period_sec)
    }

    /// The staleness bound for the indoor temperature reading
    pub fn sensor_staleness(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.sensor_staleness_sec as i64)
    }

    /// The preset table active in the given mode
    pub fn preset_table(&self, mode: HvacMode) -> &PresetTable {
        match (mode, self.ac_mode, &self.ac_presets) {
            (HvacMode::Cool, true, Some(table)) => table,
            _ => &self.presets,
        }
    }

    /// Clamp a temperature into the configured bounds
    pub fn clamp_target(&self, value: f64) -> f64 {
        value.clamp(self.min_temp, self.max_temp)
    }

    /// Check the configuration for inconsistencies
    ///
    /// Called by the loader; any error here is fatal at setup and the
    /// entity is never created.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "name".into(),
                reason: "cannot be empty".into(),
            });
        }
        if self.cycle_period_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cycle_period_sec".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.min_temp >= self.max_temp {
            return Err(ConfigError::InvalidValue {
                key: "min_temp".into(),
                reason: format!(
                    "must be below max_temp ({} >= {})",
                    self.min_temp, self.max_temp
                ),
            });
        }
        if self.hysteresis < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "hysteresis".into(),
                reason: "cannot be negative".into(),
            });
        }
        if self.tpi.coef_int < 0.0 || self.tpi.coef_ext < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "tpi".into(),
                reason: "coefficients cannot be negative".into(),
            });
        }
        if let ActuatorConfig::SwitchGroup { entity_ids } = &self.actuator {
            if entity_ids.is_empty() {
                return Err(ConfigError::EmptySwitchGroup);
            }
        }
        for table in std::iter::once(&self.presets).chain(self.ac_presets.as_ref()) {
            for (name, value) in [
                ("frost", table.frost),
                ("eco", table.eco),
                ("comfort", table.comfort),
                ("boost", table.boost),
            ] {
                if value < self.min_temp || value > self.max_temp {
                    return Err(ConfigError::InvalidValue {
                        key: format!("presets.{}", name),
                        reason: format!(
                            "{} is outside [{}, {}]",
                            value, self.min_temp, self.max_temp
                        ),
                    });
                }
            }
        }
        if let Some(motion) = &self.motion {
            for (key, preset) in [
                ("motion.motion_preset", motion.motion_preset),
                ("motion.no_motion_preset", motion.no_motion_preset),
            ] {
                if matches!(preset, Preset::None | Preset::Activity) {
                    return Err(ConfigError::InvalidValue {
                        key: key.into(),
                        reason: "must name a preset with a configured temperature".into(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_cycle_period_sec() -> u64 {
    600
}

fn default_min_temp() -> f64 {
    7.0
}

fn default_max_temp() -> f64 {
    35.0
}

fn default_hysteresis() -> f64 {
    0.5
}

fn default_sensor_staleness_sec() -> u64 {
    3600
}

fn default_coef_int() -> f64 {
    0.6
}

fn default_coef_ext() -> f64 {
    0.01
}

fn default_minimal_activation_delay_sec() -> u64 {
    10
}

fn default_frost_temp() -> f64 {
    7.0
}

fn default_eco_temp() -> f64 {
    17.0
}

fn default_comfort_temp() -> f64 {
    19.0
}

fn default_boost_temp() -> f64 {
    21.0
}

fn default_motion_preset() -> Preset {
    Preset::Comfort
}

fn default_no_motion_preset() -> Preset {
    Preset::Eco
}
