//! Runtime wiring: subscription pump and entity lifecycle
//!
//! One task pumps state-change notifications from the bus into the
//! ingestion handlers. Notifications are processed strictly in arrival
//! order and each handler runs to completion before the next starts, so
//! entity state is never mutated concurrently.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use vtherm_config::{ConfigError, ThermostatConfig};
use vtherm_core::events::StateChangedData;
use vtherm_core::{Clock, EntityId, HvacMode, Preset};
use vtherm_event_bus::EventBus;

use vtherm_actuator::CommandSink;

use crate::thermostat::Thermostat;

/// Owns a running thermostat entity and its notification pump
pub struct ThermostatRuntime {
    thermostat: Arc<Mutex<Thermostat>>,
    pump: Option<JoinHandle<()>>,
}

impl ThermostatRuntime {
    /// Create the entity from its configuration and start pumping
    ///
    /// Configuration errors are fatal: nothing is subscribed and no
    /// entity exists afterwards.
    pub fn setup(
        config: ThermostatConfig,
        bus: Arc<EventBus>,
        sink: Arc<dyn CommandSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let thermostat = Thermostat::new(config, Arc::clone(&bus), sink, clock)?;
        Ok(Self::start(thermostat, bus))
    }

    /// Start the notification pump for an already-built entity
    pub fn start(thermostat: Thermostat, bus: Arc<EventBus>) -> Self {
        let routes = Routes::from_config(thermostat.config());
        let shared = Arc::new(Mutex::new(thermostat));
        let pump = tokio::spawn(pump_task(Arc::clone(&shared), bus, routes));
        Self {
            thermostat: shared,
            pump: Some(pump),
        }
    }

    /// The shared entity, for state reads and direct handler calls
    pub fn thermostat(&self) -> &Arc<Mutex<Thermostat>> {
        &self.thermostat
    }

    /// Select the operating mode
    pub async fn set_hvac_mode(&self, mode: HvacMode) {
        self.thermostat.lock().await.set_hvac_mode(mode).await;
    }

    /// Select a preset profile
    pub async fn set_preset(&self, preset: Preset) {
        self.thermostat.lock().await.set_preset(preset).await;
    }

    /// Set an explicit target temperature
    pub async fn set_target_temperature(&self, value: f64) {
        self.thermostat
            .lock()
            .await
            .set_target_temperature(value)
            .await;
    }

    /// Stop the pump and tear the entity down
    ///
    /// Every outstanding duty-cycle timer is cancelled; a timer leaking
    /// past this point is a bug.
    pub async fn stop(&mut self) {
        if let Some(pump) = self.pump.take() {
            debug!("Stopping notification pump");
            pump.abort();
        }
        self.thermostat.lock().await.shutdown().await;
    }
}

impl Drop for ThermostatRuntime {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Which entity feeds which ingestion handler
struct Routes {
    temperature: EntityId,
    outdoor: Option<EntityId>,
    power: Option<EntityId>,
    ceiling: Option<EntityId>,
    window: Option<EntityId>,
    motion: Option<EntityId>,
    presence: Option<EntityId>,
    actuators: Vec<EntityId>,
}

impl Routes {
    fn from_config(config: &ThermostatConfig) -> Self {
        Self {
            temperature: config.temperature_sensor.clone(),
            outdoor: config.outdoor_temperature_sensor.clone(),
            power: config.power.as_ref().map(|p| p.sensor.clone()),
            ceiling: config.power.as_ref().map(|p| p.ceiling_sensor.clone()),
            window: config.window.as_ref().map(|w| w.sensor.clone()),
            motion: config.motion.as_ref().map(|m| m.sensor.clone()),
            presence: config.presence.as_ref().map(|p| p.sensor.clone()),
            actuators: config
                .actuator
                .entity_ids()
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

async fn pump_task(shared: Arc<Mutex<Thermostat>>, bus: Arc<EventBus>, routes: Routes) {
    let mut rx = bus.subscribe_all();
    loop {
        match rx.recv().await {
            Ok(event) => dispatch(&shared, &routes, event.data).await,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "State-change stream lagged, notifications dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn dispatch(shared: &Arc<Mutex<Thermostat>>, routes: &Routes, change: StateChangedData) {
    let id = &change.entity_id;
    let mut thermostat = shared.lock().await;

    if *id == routes.temperature {
        let _ = thermostat.on_temperature_changed(&change).await;
    } else if routes.outdoor.as_ref() == Some(id) {
        let _ = thermostat.on_outdoor_temperature_changed(&change).await;
    } else if routes.power.as_ref() == Some(id) {
        let _ = thermostat.on_power_changed(&change).await;
    } else if routes.ceiling.as_ref() == Some(id) {
        let _ = thermostat.on_power_ceiling_changed(&change).await;
    } else if routes.window.as_ref() == Some(id) {
        let _ = thermostat.on_window_changed(&change).await;
    } else if routes.motion.as_ref() == Some(id) {
        let _ = thermostat.on_motion_changed(&change).await;
    } else if routes.presence.as_ref() == Some(id) {
        let _ = thermostat.on_presence_changed(&change).await;
    } else if routes.actuators.contains(id) {
        let _ = thermostat.on_underlying_changed(&change).await;
    }
}
