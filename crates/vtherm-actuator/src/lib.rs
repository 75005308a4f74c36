//! Underlying actuator abstraction for the versatile thermostat
//!
//! This crate provides the command boundary to the host platform
//! (CommandSink), the duty-cycle cycler that time-proportions switch
//! actuators, and the three underlying actuator kinds the regulation
//! engine drives: a single switch, a switch group and a wrapped climate
//! device.

mod command;
mod cycler;
pub mod testing;
mod underlying;

pub use command::{fan_out, ActuatorCommand, CommandError, CommandSink};
pub use cycler::DutyCycler;
pub use underlying::{
    UnderlyingActuator, UnderlyingClimate, UnderlyingSwitch, UnderlyingSwitchGroup,
};
