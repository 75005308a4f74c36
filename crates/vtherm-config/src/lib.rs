//! Configuration record for the versatile thermostat
//!
//! The configuration is read once at entity creation. Inconsistencies are
//! fatal at setup: a config that fails validation never produces an
//! entity.

mod error;
mod loader;
mod model;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    ActuatorConfig, MotionConfig, PowerConfig, PresenceConfig, PresetTable, ThermostatConfig,
    TpiConfig, WindowConfig,
};
