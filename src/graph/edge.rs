//! Edge type and related structures.
//!
//! Edges are the links between nodes. Each edge has:
//! - A stable unique identifier
//! - Source and target node IDs (held by the graph topology)
//! - Weight, read by link forces
//! - Cached geometry, refreshed when its endpoints move

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable edge identifier.
///
/// This ID remains valid even after other edges are removed from the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({})", self.0)
    }
}

impl From<u32> for EdgeId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Edge payload stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    /// Stable identifier of this edge.
    pub id: EdgeId,
    /// Weight handed to link forces.
    pub weight: f32,
    /// Distance between the endpoints as of the last refresh.
    pub length: f32,
}

impl Link {
    /// Create a link with the given weight and cached length.
    #[inline]
    pub fn new(id: EdgeId, weight: f32, length: f32) -> Self {
        Self { id, weight, length }
    }
}
