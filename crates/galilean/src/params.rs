//! Engine tuning parameters.

use serde::{Deserialize, Serialize};

use crate::{GalileanError, Result};

/// What `execute` reports as its number of moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Number of accepted sub-steps in the call.
    #[default]
    Accepted,
    /// Length of the walker's parameter vector when at least one sub-step
    /// was accepted, otherwise 0. Kept for callers that relied on it.
    MoveSize,
}

/// Galilean engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Mean number of accepted sub-steps per call.
    pub target_steps: usize,

    /// Initial mean step length in unit space.
    pub step_size: f64,

    /// Trial budget per call, as a multiple of the drawn target.
    pub max_trials_factor: usize,

    /// Seed of the engine's random number generator.
    pub seed: u64,

    pub count_mode: CountMode,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            target_steps: 3,
            step_size: 0.5,
            max_trials_factor: 100,
            seed: 4213,
            count_mode: CountMode::Accepted,
        }
    }
}

impl EngineParams {
    pub fn validate(&self) -> Result<()> {
        if self.target_steps == 0 {
            return Err(GalileanError::InvalidParameter(
                "target_steps must be at least 1".to_string(),
            ));
        }
        if self.max_trials_factor == 0 {
            return Err(GalileanError::InvalidParameter(
                "max_trials_factor must be at least 1".to_string(),
            ));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(GalileanError::InvalidParameter(format!(
                "step_size must be positive and finite, got {}",
                self.step_size
            )));
        }
        Ok(())
    }
}
