//! Simulation parameters and attach-time configuration.
//!
//! [`SimulationParams`] is the live state forces read every tick.
//! [`SimulationConfig`] is what a host hands to `attach`: every numeric field
//! is an optional override, merged onto the defaults by
//! [`SimulationParams::from_config`].

use serde::{Deserialize, Serialize};

use super::error::SimulationError;
use crate::graph::Dimensions;

/// Initial energy when a simulation starts.
pub const DEFAULT_ALPHA: f32 = 1.0;

/// Energy below which a simulation is settled.
pub const DEFAULT_ALPHA_MIN: f32 = 0.001;

/// Per-tick cooling rate, about `1 - 0.001^(1/300)`: settles in ~300 ticks.
pub const DEFAULT_ALPHA_DECAY: f32 = 0.0227;

/// Energy the simulation cools toward.
pub const DEFAULT_ALPHA_TARGET: f32 = 0.0;

/// Per-tick velocity multiplier (friction).
pub const DEFAULT_VELOCITY_DECAY: f32 = 0.6;

/// Live simulation parameters, passed to every force on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParams {
    /// Current energy.
    pub alpha: f32,
    /// Stop threshold.
    pub alpha_min: f32,
    /// Exponential cooling rate toward `alpha_target`.
    pub alpha_decay: f32,
    /// Value `alpha` decays toward; nonzero keeps the layout warm.
    pub alpha_target: f32,
    /// Friction multiplier applied to velocities before integration.
    pub velocity_decay: f32,
    /// Dimensionality, taken from the attached graph.
    pub dim: Dimensions,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            alpha_min: DEFAULT_ALPHA_MIN,
            alpha_decay: DEFAULT_ALPHA_DECAY,
            alpha_target: DEFAULT_ALPHA_TARGET,
            velocity_decay: DEFAULT_VELOCITY_DECAY,
            dim: Dimensions::Two,
        }
    }
}

impl SimulationParams {
    /// Merge config overrides onto the defaults.
    ///
    /// `dim` always comes from the graph, never from the config.
    pub fn from_config(config: &SimulationConfig, dim: Dimensions) -> Self {
        let defaults = Self::default();
        Self {
            alpha: config.alpha.unwrap_or(defaults.alpha),
            alpha_min: config.alpha_min.unwrap_or(defaults.alpha_min),
            alpha_decay: config.alpha_decay.unwrap_or(defaults.alpha_decay),
            alpha_target: config.alpha_target.unwrap_or(defaults.alpha_target),
            velocity_decay: config.velocity_decay.unwrap_or(defaults.velocity_decay),
            dim,
        }
    }

    /// Whether the energy has dropped below the stop threshold.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.alpha < self.alpha_min
    }

    /// Move alpha one step toward its target.
    #[inline]
    pub fn cool(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
    }
}

/// Options accepted when attaching a simulation to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    pub alpha: Option<f32>,
    pub alpha_min: Option<f32>,
    pub alpha_decay: Option<f32>,
    pub alpha_target: Option<f32>,
    pub velocity_decay: Option<f32>,
    /// Start ticking right after attaching.
    pub start_on_ready: bool,
    /// Ask the scheduler for on-demand frames instead of every frame.
    pub demand_frame: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha: None,
            alpha_min: None,
            alpha_decay: None,
            alpha_target: None,
            velocity_decay: None,
            start_on_ready: true,
            demand_frame: false,
        }
    }
}

impl SimulationConfig {
    /// Reject values the cooling schedule cannot work with.
    pub fn validate(&self) -> Result<(), SimulationError> {
        fn unit(name: &str, value: Option<f32>) -> Result<(), SimulationError> {
            match value {
                Some(v) if !(0.0..=1.0).contains(&v) => Err(SimulationError::InvalidConfig(
                    format!("{name} must be within [0, 1], got {v}"),
                )),
                _ => Ok(()),
            }
        }
        fn non_negative(name: &str, value: Option<f32>) -> Result<(), SimulationError> {
            match value {
                Some(v) if !(v >= 0.0 && v.is_finite()) => Err(SimulationError::InvalidConfig(
                    format!("{name} must be a finite non-negative number, got {v}"),
                )),
                _ => Ok(()),
            }
        }

        unit("alphaDecay", self.alpha_decay)?;
        unit("velocityDecay", self.velocity_decay)?;
        non_negative("alphaMin", self.alpha_min)?;
        non_negative("alpha", self.alpha)?;
        non_negative("alphaTarget", self.alpha_target)
    }
}
