//! R-tree based spatial index using the rstar crate.
//!
//! Provides O(log n) spatial queries for:
//! - Nearest neighbor
//! - Box intersection
//!
//! Points are three-dimensional; planar graphs keep `z` at zero.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::graph::NodeId;

/// A point in the spatial index with associated node ID.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePoint {
    /// The node identifier.
    pub id: NodeId,
    /// Position in graph space.
    pub position: [f32; 3],
}

impl NodePoint {
    /// Create a new NodePoint.
    pub fn new(id: NodeId, x: f32, y: f32, z: f32) -> Self {
        Self {
            id,
            position: [x, y, z],
        }
    }
}

impl RTreeObject for NodePoint {
    type Envelope = AABB<[f32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for NodePoint {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Spatial index for graph nodes.
///
/// Uses an R*-tree for efficient spatial queries.
pub struct SpatialIndex {
    tree: RTree<NodePoint>,
}

impl SpatialIndex {
    /// Create a new empty spatial index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Find the nearest node to a point.
    pub fn nearest(&self, point: [f32; 3]) -> Option<NodeId> {
        self.tree.nearest_neighbor(&point).map(|p| p.id)
    }

    /// Find the nearest node within a maximum distance.
    pub fn nearest_within(&self, point: [f32; 3], max_distance: f32) -> Option<NodeId> {
        let max_distance_sq = max_distance * max_distance;
        self.tree
            .nearest_neighbor(&point)
            .filter(|p| p.distance_2(&point) <= max_distance_sq)
            .map(|p| p.id)
    }

    /// Find all nodes inside an axis-aligned box.
    pub fn in_box(&self, min: [f32; 3], max: [f32; 3]) -> Vec<NodeId> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|p| p.id)
            .collect()
    }

    /// Rebuild the index from a list of (id, x, y, z) tuples.
    ///
    /// Bulk loading beats incremental inserts once every node has moved,
    /// which is the common case after a simulation tick.
    pub fn rebuild(&mut self, points: &[(NodeId, f32, f32, f32)]) {
        let node_points: Vec<_> = points
            .iter()
            .map(|&(id, x, y, z)| NodePoint::new(id, x, y, z))
            .collect();

        self.tree = RTree::bulk_load(node_points);
    }

    /// Clear all nodes from the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Get the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
