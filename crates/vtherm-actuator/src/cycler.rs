//! Duty-cycle cycler for switch actuators
//!
//! Converts a computed power-on ratio into a repeating on/off cycle.
//! The cycler owns at most one scheduled cycle at a time: starting a new
//! cycle atomically replaces the previous one, and cancellation is
//! idempotent and honored before the next phase fires. Phase deadlines
//! are derived from the ideal period boundaries, not from accumulated
//! "now + duration" offsets, so long-running cycles do not drift.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};
use vtherm_core::EntityId;

use crate::command::{fan_out, ActuatorCommand, CommandSink};

/// Schedules the on/off time-proportioning cycle of one actuator
///
/// Owned by an underlying switch or switch group; the targets receive
/// every phase command together.
pub struct DutyCycler {
    sink: Arc<dyn CommandSink>,
    targets: Arc<[EntityId]>,
    handle: Option<JoinHandle<()>>,
}

impl DutyCycler {
    /// Create an idle cycler for the given actuator entities
    pub fn new(sink: Arc<dyn CommandSink>, targets: Vec<EntityId>) -> Self {
        Self {
            sink,
            targets: targets.into(),
            handle: None,
        }
    }

    /// Start a cycle with an on-phase of `ratio * period`
    ///
    /// Replaces any active cycle. A ratio of 0 sends a single off command
    /// and schedules nothing; a ratio of 1 sends a single on command (no
    /// toggling).
    pub fn start(&mut self, ratio: f64, period: Duration) {
        self.cancel();

        let ratio = ratio.clamp(0.0, 1.0);
        let sink = Arc::clone(&self.sink);
        let targets = Arc::clone(&self.targets);

        debug!(
            ratio,
            period_secs = period.as_secs_f64(),
            "Starting duty cycle"
        );

        let handle = if ratio <= 0.0 {
            tokio::spawn(async move {
                fan_out(&sink, &targets, ActuatorCommand::TurnOff).await;
            })
        } else if ratio >= 1.0 {
            tokio::spawn(async move {
                fan_out(&sink, &targets, ActuatorCommand::TurnOn).await;
            })
        } else {
            let on_time = period.mul_f64(ratio);
            tokio::spawn(async move {
                let mut boundary = Instant::now();
                loop {
                    fan_out(&sink, &targets, ActuatorCommand::TurnOn).await;
                    sleep_until(boundary + on_time).await;
                    fan_out(&sink, &targets, ActuatorCommand::TurnOff).await;
                    boundary += period;
                    sleep_until(boundary).await;
                }
            })
        };
        self.handle = Some(handle);
    }

    /// Cancel any scheduled phase transition
    ///
    /// Safe to call when nothing is scheduled.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            trace!("Cancelling duty cycle");
            handle.abort();
        }
    }

    /// Whether a cycle still has scheduled phase transitions
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DutyCycler {
    fn drop(&mut self) {
        self.cancel();
    }
}
