//! Spatial indexing for O(log n) hit testing.
//!
//! This module provides an R-tree based spatial index for efficient
//! nearest-neighbor and range queries on graph nodes. Hosts use it to pick
//! the node under the pointer before pinning and dragging it.

mod rtree;

pub use rtree::SpatialIndex;
