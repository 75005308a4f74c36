//! Time-proportional-and-integral control
//!
//! Converts the temperature error into a power-on ratio for the duty
//! cycle: `coef_int * (target - indoor) + coef_ext * (target - outdoor)`,
//! clamped to [0, 1]. The outdoor term compensates heat loss; it drops
//! out when no outdoor sensor is configured. When cooling, both error
//! terms are mirrored.

use std::time::Duration;
use vtherm_config::TpiConfig;

/// The TPI ratio computation for switch actuators
#[derive(Debug, Clone)]
pub struct TpiAlgorithm {
    coef_int: f64,
    coef_ext: f64,
    minimal_activation: Duration,
}

impl TpiAlgorithm {
    pub fn new(config: &TpiConfig) -> Self {
        Self {
            coef_int: config.coef_int,
            coef_ext: config.coef_ext,
            minimal_activation: Duration::from_secs(config.minimal_activation_delay_sec),
        }
    }

    /// Compute the power-on ratio for one cycle
    pub fn on_ratio(&self, target: f64, current: f64, outdoor: Option<f64>, cooling: bool) -> f64 {
        let (err_int, err_ext) = if cooling {
            (current - target, outdoor.map(|o| o - target))
        } else {
            (target - current, outdoor.map(|o| target - o))
        };
        let ratio = self.coef_int * err_int + self.coef_ext * err_ext.unwrap_or(0.0);
        ratio.clamp(0.0, 1.0)
    }

    /// Round on-phases shorter than the minimal activation delay to zero
    ///
    /// Pointlessly short activations wear relays without producing heat.
    pub fn round_short_activation(&self, ratio: f64, period: Duration) -> f64 {
        if ratio > 0.0 && period.mul_f64(ratio) < self.minimal_activation {
            0.0
        } else {
            ratio
        }
    }
}
