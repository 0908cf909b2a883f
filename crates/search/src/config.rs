use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Parameters of the visit-count smoothing that turns a node's child visits
/// into a training policy.
///
/// `p_i = v_i^(1/temperature) / sum_j v_j^(1/temperature)` is mixed with the
/// uniform distribution: `q_i = (1 - uniform_mix) * p_i + uniform_mix / n`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Exponent temperature applied to the visit counts (1.0 = proportional)
    pub temperature: f32,

    /// Share of probability mass spread uniformly over all children
    pub uniform_mix: f32,
}

impl SmoothingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_uniform_mix(mut self, mix: f32) -> Self {
        self.uniform_mix = mix;
        self
    }

    /// Plain visit proportions, no smoothing
    pub fn proportional() -> Self {
        Self {
            temperature: 1.0,
            uniform_mix: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "temperature must be finite and >= 0, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.uniform_mix) {
            return Err(SearchError::InvalidConfig(format!(
                "uniform_mix must be in [0, 1], got {}",
                self.uniform_mix
            )));
        }
        Ok(())
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            uniform_mix: 0.2,
        }
    }
}

/// Configuration for the uniform stand-in search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of simulations to run
    pub num_simulations: u32,

    /// Temperature for move selection (1.0 = proportional to visits, 0.0 = argmax)
    pub temperature: f32,

    /// Render castling moves in chess960 notation
    pub chess960: bool,

    /// Smoothing used for the exported training policy
    pub smoothing: SmoothingConfig,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of simulations
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.num_simulations = n;
        self
    }

    /// Set temperature for move selection
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_chess960(mut self, chess960: bool) -> Self {
        self.chess960 = chess960;
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingConfig) -> Self {
        self.smoothing = smoothing;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_simulations: 200,
            temperature: 1.0,
            chess960: false,
            smoothing: SmoothingConfig::default(),
        }
    }
}
