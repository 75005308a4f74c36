//! Core types for the versatile thermostat
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: EntityId, SensorState, the event envelope, Context, the
//! HVAC enums and the injectable Clock.

mod clock;
mod context;
mod entity_id;
mod event;
mod hvac;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use hvac::{HvacAction, HvacMode, HvacParseError, Preset};
pub use state::SensorState;

/// State value reported by an entity that is currently unreachable
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value reported by an entity whose state was never established
pub const STATE_UNKNOWN: &str = "unknown";

/// State value of a binary entity that is on
pub const STATE_ON: &str = "on";

/// State value of a binary entity that is off
pub const STATE_OFF: &str = "off";

/// Standard event types delivered over the bus
pub mod events {
    use super::*;

    /// Event type for entity state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for STATE_CHANGED events
    ///
    /// This is the State-Change Notification consumed by the ingestion
    /// handlers: the entity that changed, its previous state (if any) and
    /// its new state (None when the entity was removed).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<SensorState>,
        pub new_state: Option<SensorState>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
