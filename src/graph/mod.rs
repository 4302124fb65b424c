//! Graph data structures and operations.
//!
//! This module provides the core graph structure using petgraph's StableGraph
//! for stable node/edge indices, with one kinematic body per node slot for the
//! force simulation to read and write.

mod body;
mod edge;
mod engine;
mod node;

pub use body::{Body, Dimensions, NodePatch};
pub use edge::{EdgeId, Link};
pub use engine::{GraphEngine, HookId, NodeAddedHook};
pub use node::{NodeId, NodeState};
