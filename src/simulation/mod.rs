//! Force-directed layout simulation.
//!
//! - [`Simulation`]: cooling schedule, tick loop and lifecycle
//! - [`ForceRegistry`]: ordered, keyed force units
//! - [`SimulationGraph`]: what the engine needs from a graph

mod adapter;
mod engine;
mod error;
mod params;
mod registry;

pub use adapter::{LinkedGraph, SimulationGraph};
pub use engine::{Simulation, SimulationState};
pub use error::{ForceError, SimulationError};
pub use params::{
    DEFAULT_ALPHA, DEFAULT_ALPHA_DECAY, DEFAULT_ALPHA_MIN, DEFAULT_ALPHA_TARGET,
    DEFAULT_VELOCITY_DECAY, SimulationConfig, SimulationParams,
};
pub use registry::{Force, ForceKey, ForceRegistry, ForceSubscription};
