//! YAML loading for the thermostat configuration

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ThermostatConfig;

impl ThermostatConfig {
    /// Parse and validate a configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("Loading thermostat configuration: {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }
}
