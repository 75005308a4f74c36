//! Safety filters guarding the ingestion handlers
//!
//! Readings that are missing, non-numeric, non-finite or older than the
//! last accepted reading for the same source never reach the regulation
//! state. Absence of valid data biases toward idle, never toward heating.

use chrono::{DateTime, Utc};
use vtherm_core::SensorState;

/// Why a notification was discarded without touching the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// New state absent, unavailable or unknown
    Missing,
    /// A numeric reading could not be parsed as a finite number
    NotNumeric,
    /// A binary reading was neither "on" nor "off"
    NotBoolean,
    /// Timestamp older than the last accepted reading for this source
    Stale,
    /// Old and new resolved values are identical
    Unchanged,
}

/// Extract a finite numeric reading from a sensor state
pub(crate) fn extract_numeric(state: &SensorState) -> Result<f64, RejectReason> {
    if state.is_missing() {
        return Err(RejectReason::Missing);
    }
    state.numeric().ok_or(RejectReason::NotNumeric)
}

/// Extract an on/off reading from a sensor state
pub(crate) fn extract_bool(state: &SensorState) -> Result<bool, RejectReason> {
    if state.is_missing() {
        return Err(RejectReason::Missing);
    }
    state.is_on().ok_or(RejectReason::NotBoolean)
}

/// Enforce monotonically non-decreasing timestamps per source
pub(crate) fn check_fresh(
    last_accepted: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> Result<(), RejectReason> {
    match last_accepted {
        Some(last) if at < last => Err(RejectReason::Stale),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vtherm_core::EntityId;

    fn state(value: &str) -> SensorState {
        SensorState::at(
            EntityId::new("sensor", "temperature").unwrap(),
            value,
            Utc::now(),
        )
    }

    #[test]
    fn test_extract_numeric() {
        assert_eq!(extract_numeric(&state("20.5")), Ok(20.5));
        assert_eq!(extract_numeric(&state("unavailable")), Err(RejectReason::Missing));
        assert_eq!(extract_numeric(&state("unknown")), Err(RejectReason::Missing));
        assert_eq!(extract_numeric(&state("warm")), Err(RejectReason::NotNumeric));
        assert_eq!(extract_numeric(&state("NaN")), Err(RejectReason::NotNumeric));
    }

    #[test]
    fn test_extract_bool() {
        assert_eq!(extract_bool(&state("on")), Ok(true));
        assert_eq!(extract_bool(&state("off")), Ok(false));
        assert_eq!(extract_bool(&state("unavailable")), Err(RejectReason::Missing));
        assert_eq!(extract_bool(&state("21.0")), Err(RejectReason::NotBoolean));
    }

    #[test]
    fn test_check_fresh() {
        let now = Utc::now();
        assert!(check_fresh(None, now).is_ok());
        assert!(check_fresh(Some(now), now).is_ok());
        assert!(check_fresh(Some(now), now + Duration::seconds(1)).is_ok());
        assert_eq!(
            check_fresh(Some(now), now - Duration::seconds(1)),
            Err(RejectReason::Stale)
        );
    }
}
