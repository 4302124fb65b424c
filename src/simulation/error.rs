use thiserror::Error;

use super::registry::ForceKey;
use crate::graph::NodeId;

/// Errors surfaced by the simulation engine.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// An engine-scoped operation was called with no graph attached.
    #[error("no graph is attached to the simulation")]
    NotAttached,

    /// The graph lost a node while the engine was writing it back.
    #[error("{0} is missing from the attached graph")]
    MissingNode(NodeId),

    /// A registered force failed; velocities written before it stay applied.
    #[error("force `{key}` failed")]
    Force {
        key: ForceKey,
        #[source]
        source: ForceError,
    },

    /// The attached graph is borrowed elsewhere, so the engine cannot
    /// release it yet.
    #[error("the attached graph is borrowed elsewhere")]
    GraphBusy,

    /// The attach-time configuration is out of range.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),
}

/// Errors a force unit may return from [`Force::apply`](super::Force::apply).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForceError {
    #[error("{0} is not in the graph")]
    MissingNode(NodeId),

    #[error("{0}")]
    Other(String),
}
