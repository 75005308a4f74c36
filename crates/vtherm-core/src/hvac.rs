//! HVAC mode, action and preset enums

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The user-selected operating mode of a thermostat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    /// Thermostat disabled, no demand is ever produced
    #[default]
    Off,
    /// Heating mode
    Heat,
    /// Cooling (AC) mode
    Cool,
    /// Let the device decide between heating and cooling
    Auto,
}

impl HvacMode {
    pub fn is_off(&self) -> bool {
        matches!(self, HvacMode::Off)
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::Auto => "auto",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for HvacMode {
    type Err = HvacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(HvacMode::Off),
            "heat" => Ok(HvacMode::Heat),
            "cool" => Ok(HvacMode::Cool),
            "auto" => Ok(HvacMode::Auto),
            other => Err(HvacParseError::unknown("hvac mode", other)),
        }
    }
}

/// The instantaneous realized behavior, distinct from the selected mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    /// Mode is off
    #[default]
    Off,
    /// Mode is active but no demand right now
    Idle,
    /// Currently producing heat
    Heating,
    /// Currently cooling
    Cooling,
}

impl fmt::Display for HvacAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HvacAction::Off => "off",
            HvacAction::Idle => "idle",
            HvacAction::Heating => "heating",
            HvacAction::Cooling => "cooling",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for HvacAction {
    type Err = HvacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(HvacAction::Off),
            "idle" => Ok(HvacAction::Idle),
            "heating" => Ok(HvacAction::Heating),
            "cooling" => Ok(HvacAction::Cooling),
            other => Err(HvacParseError::unknown("hvac action", other)),
        }
    }
}

/// A named target-temperature profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// No preset, target is the user-set temperature
    #[default]
    None,
    /// Frost protection
    Frost,
    /// Energy saving
    Eco,
    /// Normal occupancy
    Comfort,
    /// Fast warm-up
    Boost,
    /// Follows the motion sensor between two configured presets
    Activity,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Preset::None => "none",
            Preset::Frost => "frost",
            Preset::Eco => "eco",
            Preset::Comfort => "comfort",
            Preset::Boost => "boost",
            Preset::Activity => "activity",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Preset {
    type Err = HvacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Preset::None),
            "frost" => Ok(Preset::Frost),
            "eco" => Ok(Preset::Eco),
            "comfort" => Ok(Preset::Comfort),
            "boost" => Ok(Preset::Boost),
            "activity" => Ok(Preset::Activity),
            other => Err(HvacParseError::unknown("preset", other)),
        }
    }
}

/// Error parsing an HVAC enum from its string form
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct HvacParseError {
    kind: &'static str,
    value: String,
}

impl HvacParseError {
    fn unknown(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_roundtrip() {
        for mode in [HvacMode::Off, HvacMode::Heat, HvacMode::Cool, HvacMode::Auto] {
            assert_eq!(mode.to_string().parse::<HvacMode>().unwrap(), mode);
        }
        for action in [
            HvacAction::Off,
            HvacAction::Idle,
            HvacAction::Heating,
            HvacAction::Cooling,
        ] {
            assert_eq!(action.to_string().parse::<HvacAction>().unwrap(), action);
        }
        for preset in [
            Preset::None,
            Preset::Frost,
            Preset::Eco,
            Preset::Comfort,
            Preset::Boost,
            Preset::Activity,
        ] {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
        }
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&HvacMode::Heat).unwrap(),
            "\"heat\""
        );
        assert_eq!(
            serde_json::from_str::<Preset>("\"comfort\"").unwrap(),
            Preset::Comfort
        );
    }

    #[test]
    fn test_unknown_value() {
        assert!("toasty".parse::<Preset>().is_err());
        assert!("defrost".parse::<HvacMode>().is_err());
    }
}
