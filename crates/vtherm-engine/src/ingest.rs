//! Event ingestion handlers
//!
//! One handler per notification category. Each validates the incoming
//! state change, updates the corresponding entity field and triggers a
//! recompute. Invalid, stale and redundant notifications are rejected
//! without touching any state; the outcome is returned so callers and
//! tests can observe what happened.

use tracing::{debug, trace};

use vtherm_core::events::StateChangedData;
use vtherm_core::SensorState;

use crate::filter::{check_fresh, extract_bool, extract_numeric, RejectReason};
use crate::thermostat::{Reading, Thermostat};
use crate::events::ThermostatEventKind;

/// Outcome of one ingestion handler invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// The state was updated and a recompute ran
    Accepted,
    /// The notification was discarded, nothing changed
    Rejected(RejectReason),
}

impl Ingest {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Ingest::Accepted)
    }
}

/// Pull the new state out of a notification, or reject
fn new_state(change: &StateChangedData) -> Result<&SensorState, RejectReason> {
    match &change.new_state {
        Some(state) if !state.is_missing() => Ok(state),
        _ => Err(RejectReason::Missing),
    }
}

impl Thermostat {
    /// Indoor temperature sensor changed
    pub async fn on_temperature_changed(&mut self, change: &StateChangedData) -> Ingest {
        let result = (|| {
            let state = new_state(change)?;
            let value = extract_numeric(state)?;
            check_fresh(self.current_temp.map(|r| r.at), state.last_updated)?;
            Ok((value, state.last_updated))
        })();
        match result {
            Ok((value, at)) => {
                trace!(value, "Indoor temperature accepted");
                self.current_temp = Some(Reading { value, at });
                self.recompute().await;
                Ingest::Accepted
            }
            Err(reason) => {
                debug!(?reason, "Indoor temperature rejected");
                Ingest::Rejected(reason)
            }
        }
    }

    /// Outdoor temperature sensor changed
    pub async fn on_outdoor_temperature_changed(&mut self, change: &StateChangedData) -> Ingest {
        let result = (|| {
            let state = new_state(change)?;
            let value = extract_numeric(state)?;
            check_fresh(self.outdoor_temp.map(|r| r.at), state.last_updated)?;
            Ok((value, state.last_updated))
        })();
        match result {
            Ok((value, at)) => {
                self.outdoor_temp = Some(Reading { value, at });
                self.recompute().await;
                Ingest::Accepted
            }
            Err(reason) => Ingest::Rejected(reason),
        }
    }

    /// Power draw sensor changed
    pub async fn on_power_changed(&mut self, change: &StateChangedData) -> Ingest {
        let result = (|| {
            let state = new_state(change)?;
            let value = extract_numeric(state)?;
            check_fresh(self.power.map(|r| r.at), state.last_updated)?;
            Ok((value, state.last_updated))
        })();
        match result {
            Ok((value, at)) => {
                self.power = Some(Reading { value, at });
                self.recompute().await;
                Ingest::Accepted
            }
            Err(reason) => Ingest::Rejected(reason),
        }
    }

    /// Power ceiling sensor changed
    pub async fn on_power_ceiling_changed(&mut self, change: &StateChangedData) -> Ingest {
        let result = (|| {
            let state = new_state(change)?;
            let value = extract_numeric(state)?;
            check_fresh(self.power_ceiling.map(|r| r.at), state.last_updated)?;
            Ok((value, state.last_updated))
        })();
        match result {
            Ok((value, at)) => {
                self.power_ceiling = Some(Reading { value, at });
                self.recompute().await;
                Ingest::Accepted
            }
            Err(reason) => Ingest::Rejected(reason),
        }
    }

    /// Window sensor changed
    pub async fn on_window_changed(&mut self, change: &StateChangedData) -> Ingest {
        let result = (|| {
            let state = new_state(change)?;
            let open = extract_bool(state)?;
            reject_unchanged_bool(change, open)?;
            check_fresh(self.window_at, state.last_updated)?;
            Ok((open, state.last_updated))
        })();
        match result {
            Ok((open, at)) => {
                debug!(open, "Window state accepted");
                let old = self.window_open;
                self.window_open = open;
                self.window_at = Some(at);
                self.send_event(
                    ThermostatEventKind::Window,
                    Some(old.to_string()),
                    Some(open.to_string()),
                );
                self.recompute().await;
                Ingest::Accepted
            }
            Err(reason) => {
                debug!(?reason, "Window state rejected");
                Ingest::Rejected(reason)
            }
        }
    }

    /// Motion sensor changed
    pub async fn on_motion_changed(&mut self, change: &StateChangedData) -> Ingest {
        let result = (|| {
            let state = new_state(change)?;
            let motion = extract_bool(state)?;
            reject_unchanged_bool(change, motion)?;
            check_fresh(self.motion_at, state.last_updated)?;
            Ok((motion, state.last_updated))
        })();
        match result {
            Ok((motion, at)) => {
                let old = self.motion;
                self.motion = motion;
                self.motion_at = Some(at);
                self.send_event(
                    ThermostatEventKind::Motion,
                    Some(old.to_string()),
                    Some(motion.to_string()),
                );
                self.recompute().await;
                Ingest::Accepted
            }
            Err(reason) => Ingest::Rejected(reason),
        }
    }

    /// Presence sensor changed
    pub async fn on_presence_changed(&mut self, change: &StateChangedData) -> Ingest {
        let result = (|| {
            let state = new_state(change)?;
            let present = extract_bool(state)?;
            reject_unchanged_bool(change, present)?;
            check_fresh(self.presence_at, state.last_updated)?;
            Ok((present, state.last_updated))
        })();
        match result {
            Ok((present, at)) => {
                let old = self.presence;
                self.presence = Some(present);
                self.presence_at = Some(at);
                self.send_event(
                    ThermostatEventKind::Presence,
                    old.map(|p| p.to_string()),
                    Some(present.to_string()),
                );
                self.recompute().await;
                Ingest::Accepted
            }
            Err(reason) => Ingest::Rejected(reason),
        }
    }

    /// An underlying actuator entity reported a state change
    ///
    /// Switch read-backs refresh the tracked on/off state. A wrapped
    /// climate device additionally reconciles drift: when the device
    /// reports a mode other than ours (changed on the device itself),
    /// the engine adopts it.
    pub async fn on_underlying_changed(&mut self, change: &StateChangedData) -> Ingest {
        let state = match new_state(change) {
            Ok(state) => state,
            Err(reason) => return Ingest::Rejected(reason),
        };
        if let Err(reason) = check_fresh(self.underlying_at, state.last_updated) {
            return Ingest::Rejected(reason);
        }
        self.underlying_at = Some(state.last_updated);
        self.underlying.note_reported_state(state);

        if !self.underlying.is_climate() {
            // Nothing to recompute, the duty cycle keeps running
            return Ingest::Accepted;
        }

        if let Some(reported) = self.underlying.hvac_mode() {
            if reported != self.hvac_mode && self.climate_commanded_mode != Some(reported) {
                debug!(reported = %reported, ours = %self.hvac_mode,
                    "Underlying climate changed externally, adopting its mode");
                let old = self.hvac_mode;
                self.hvac_mode = reported;
                self.climate_commanded_mode = Some(reported);
                if reported.is_off() {
                    self.underlying.cancel_cycle();
                }
                self.send_event(
                    ThermostatEventKind::HvacMode,
                    Some(old.to_string()),
                    Some(reported.to_string()),
                );
            }
        }
        self.recompute().await;
        Ingest::Accepted
    }
}

/// Boolean signals are deduplicated: identical resolved old and new
/// values never trigger a recompute
fn reject_unchanged_bool(change: &StateChangedData, new: bool) -> Result<(), RejectReason> {
    if let Some(old) = change.old_state.as_ref().and_then(|s| s.is_on()) {
        if old == new {
            return Err(RejectReason::Unchanged);
        }
    }
    Ok(())
}
