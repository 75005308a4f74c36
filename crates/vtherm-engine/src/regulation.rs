//! Demand decision with hysteresis
//!
//! The dead band around the target keeps switch actuators from thrashing
//! when the temperature hovers at the setpoint. Inside the band the
//! previous action is retained.

use vtherm_core::{HvacAction, HvacMode};

/// What the thermostat currently asks of its actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    Heat,
    Cool,
    Idle,
}

/// Decide the demand from the current and target temperatures
///
/// `hysteresis` is the half-width of the dead band. The previous action
/// breaks ties inside the band.
pub fn demand_for(
    mode: HvacMode,
    current: f64,
    target: f64,
    hysteresis: f64,
    previous: HvacAction,
) -> Demand {
    match mode {
        HvacMode::Off => Demand::Idle,
        HvacMode::Heat => {
            if current <= target - hysteresis {
                Demand::Heat
            } else if current >= target + hysteresis {
                Demand::Idle
            } else if previous == HvacAction::Heating {
                Demand::Heat
            } else {
                Demand::Idle
            }
        }
        HvacMode::Cool => {
            if current >= target + hysteresis {
                Demand::Cool
            } else if current <= target - hysteresis {
                Demand::Idle
            } else if previous == HvacAction::Cooling {
                Demand::Cool
            } else {
                Demand::Idle
            }
        }
        HvacMode::Auto => {
            if current <= target - hysteresis {
                Demand::Heat
            } else if current >= target + hysteresis {
                Demand::Cool
            } else {
                match previous {
                    HvacAction::Heating => Demand::Heat,
                    HvacAction::Cooling => Demand::Cool,
                    _ => Demand::Idle,
                }
            }
        }
    }
}
