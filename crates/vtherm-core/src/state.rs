//! Sensor state snapshot carried by state-change notifications

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, STATE_OFF, STATE_ON, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// The state of an entity at a point in time
///
/// Carries the raw state value (as a string, the way the platform reports
/// it), any associated attributes, and the change/update timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorState {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The state value (e.g., "on", "off", "23.5", "unavailable")
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if the value did not change
    pub last_updated: DateTime<Utc>,

    /// Context of the change that created this state
    pub context: Context,
}

impl SensorState {
    /// Create a new state with the given timestamp
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: at,
            last_updated: at,
            context,
        }
    }

    /// Create a bare state with no attributes and a fresh context
    pub fn at(entity_id: EntityId, state: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(entity_id, state, HashMap::new(), Context::new(), at)
    }

    /// Add an attribute, builder style
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Check if the state value represents an unavailable entity
    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    /// Check if the state value represents an unknown state
    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Check if the state carries no usable value at all
    pub fn is_missing(&self) -> bool {
        self.is_unavailable() || self.is_unknown() || self.state.is_empty()
    }

    /// Parse the state value as a finite number
    pub fn numeric(&self) -> Option<f64> {
        self.state.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Resolve the state value as an on/off boolean
    pub fn is_on(&self) -> Option<bool> {
        match self.state.as_str() {
            STATE_ON => Some(true),
            STATE_OFF => Some(false),
            _ => None,
        }
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for SensorState {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eid() -> EntityId {
        EntityId::new("sensor", "temperature").unwrap()
    }

    #[test]
    fn test_numeric() {
        let state = SensorState::at(eid(), "21.5", Utc::now());
        assert_eq!(state.numeric(), Some(21.5));

        let state = SensorState::at(eid(), "not a number", Utc::now());
        assert_eq!(state.numeric(), None);

        let state = SensorState::at(eid(), "NaN", Utc::now());
        assert_eq!(state.numeric(), None);

        let state = SensorState::at(eid(), "inf", Utc::now());
        assert_eq!(state.numeric(), None);
    }

    #[test]
    fn test_missing_states() {
        assert!(SensorState::at(eid(), "unavailable", Utc::now()).is_missing());
        assert!(SensorState::at(eid(), "unknown", Utc::now()).is_missing());
        assert!(SensorState::at(eid(), "", Utc::now()).is_missing());
        assert!(!SensorState::at(eid(), "19.0", Utc::now()).is_missing());
    }

    #[test]
    fn test_boolean_resolution() {
        assert_eq!(SensorState::at(eid(), "on", Utc::now()).is_on(), Some(true));
        assert_eq!(SensorState::at(eid(), "off", Utc::now()).is_on(), Some(false));
        assert_eq!(SensorState::at(eid(), "unknown", Utc::now()).is_on(), None);
    }

    #[test]
    fn test_typed_attribute() {
        let state =
            SensorState::at(eid(), "heat", Utc::now()).with_attribute("hvac_action", json!("idle"));
        assert_eq!(
            state.attribute::<String>("hvac_action"),
            Some("idle".to_string())
        );
        assert_eq!(state.attribute::<f64>("hvac_action"), None);
    }
}
