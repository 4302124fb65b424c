//! Node identifiers and per-node flags.
//!
//! Nodes are the vertices in the graph. Each node has:
//! - A stable unique identifier (survives graph mutations)
//! - A kinematic [`Body`](super::Body) (position and velocity)
//! - Pinned state (excluded from integration when true)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable node identifier.
///
/// This ID remains valid even after other nodes are removed from the graph.
/// It wraps a u32 for efficient storage and WebAssembly interop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new NodeId from a raw u32.
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl From<u32> for NodeId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<NodeId> for u32 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Node state flags packed into a single byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeState {
    flags: u8,
}

impl NodeState {
    const PINNED: u8 = 0b0000_0001;

    /// Create a new default node state.
    #[inline]
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    /// Check if the node is pinned (excluded from integration).
    #[inline]
    pub fn is_pinned(self) -> bool {
        self.flags & Self::PINNED != 0
    }

    /// Set the pinned state.
    #[inline]
    pub fn set_pinned(&mut self, pinned: bool) {
        if pinned {
            self.flags |= Self::PINNED;
        } else {
            self.flags &= !Self::PINNED;
        }
    }
}
