//! Regulation engine for the versatile thermostat
//!
//! The Thermostat aggregate consumes state-change notifications through
//! its ingestion handlers, arbitrates override conditions (open window >
//! power ceiling > absence), resolves the effective target temperature
//! from the active preset, and drives the underlying actuator: a TPI
//! duty cycle for switch kinds, mode/setpoint pass-through for a wrapped
//! climate device.

mod events;
mod filter;
mod ingest;
mod regulation;
mod runtime;
mod thermostat;
mod tpi;

pub use events::{ThermostatEventData, ThermostatEventKind, THERMOSTAT_EVENT};
pub use filter::RejectReason;
pub use ingest::Ingest;
pub use regulation::{demand_for, Demand};
pub use runtime::ThermostatRuntime;
pub use thermostat::{Reading, Thermostat, ThermostatOverride};
pub use tpi::TpiAlgorithm;
