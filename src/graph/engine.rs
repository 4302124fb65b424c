//! GraphEngine - Core graph data structure.
//!
//! The GraphEngine stores the graph topology using petgraph's StableGraph
//! and keeps one [`Body`] per node slot, indexed by the petgraph node index,
//! so the simulation can walk positions and velocities without hashing.
//!
//! Besides topology it maintains two pieces of derived state:
//! - the cached length of every link, refreshed through [`GraphEngine::update_node`]
//! - a lazily rebuilt spatial index for hit testing

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::{Directed, Direction};

use super::body::{Body, Dimensions, NodePatch};
use super::edge::{EdgeId, Link};
use super::node::{NodeId, NodeState};
use crate::spatial::SpatialIndex;

/// Callback run for every node added to the graph.
pub type NodeAddedHook = Box<dyn FnMut(NodeId, &mut Body)>;

/// Handle to a registered node-added hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u32);

/// The core graph engine.
///
/// This struct manages:
/// - Graph topology via petgraph
/// - Node bodies (position and velocity)
/// - Node state (pinned)
/// - Node-added hooks
/// - Spatial index for hit testing
/// - ID mapping between stable IDs and internal indices
pub struct GraphEngine {
    /// The underlying graph structure.
    /// Nodes store their stable NodeId, edges store their link payload.
    graph: StableGraph<NodeId, Link, Directed>,

    /// Map from stable NodeId to petgraph NodeIndex
    node_id_to_index: HashMap<NodeId, NodeIndex>,

    /// Map from stable EdgeId to petgraph EdgeIndex
    edge_id_to_index: HashMap<EdgeId, EdgeIndex>,

    /// Next node ID to assign
    next_node_id: u32,

    /// Next edge ID to assign
    next_edge_id: u32,

    /// Layout dimensionality
    dimensions: Dimensions,

    /// Bodies, one per node slot
    bodies: Vec<Body>,

    /// Node states, one per node slot
    states: Vec<NodeState>,

    /// Hooks run on node addition, in subscription order
    node_added_hooks: Vec<(HookId, NodeAddedHook)>,

    /// Next hook ID to assign
    next_hook_id: u32,

    /// Spatial index for hit testing
    spatial: RefCell<SpatialIndex>,

    /// Whether the spatial index needs rebuilding
    spatial_dirty: Cell<bool>,
}

impl GraphEngine {
    /// Create a new empty planar graph.
    pub fn new() -> Self {
        Self::with_dimensions(Dimensions::Two)
    }

    /// Create a new empty graph with the given dimensionality.
    pub fn with_dimensions(dimensions: Dimensions) -> Self {
        Self {
            graph: StableGraph::new(),
            node_id_to_index: HashMap::new(),
            edge_id_to_index: HashMap::new(),
            next_node_id: 0,
            next_edge_id: 0,
            dimensions,
            bodies: Vec::new(),
            states: Vec::new(),
            node_added_hooks: Vec::new(),
            next_hook_id: 0,
            spatial: RefCell::new(SpatialIndex::new()),
            spatial_dirty: Cell::new(false),
        }
    }

    /// Layout dimensionality of this graph.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Add a node at rest at a planar position.
    pub fn add_node(&mut self, x: f32, y: f32) -> NodeId {
        self.add_body(Body::at(x, y))
    }

    /// Add a node at rest at a spatial position.
    pub fn add_node_3d(&mut self, x: f32, y: f32, z: f32) -> NodeId {
        self.add_body(Body::at_3d(x, y, z))
    }

    /// Add a node with a fully specified body.
    ///
    /// Node-added hooks run after the body is stored and may rewrite it.
    pub fn add_body(&mut self, body: Body) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let index = self.graph.add_node(id);
        self.node_id_to_index.insert(id, index);

        // StableGraph hands out vacated indices before growing.
        let slot = index.index();
        if slot < self.bodies.len() {
            self.bodies[slot] = body;
            self.states[slot] = NodeState::new();
        } else {
            self.bodies.push(body);
            self.states.push(NodeState::new());
        }

        for (_, hook) in self.node_added_hooks.iter_mut() {
            hook(id, &mut self.bodies[slot]);
        }

        self.spatial_dirty.set(true);
        id
    }

    /// Remove a node and all its connected edges.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(index) = self.node_id_to_index.remove(&id) else {
            return false;
        };

        let edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .chain(self.graph.edges_directed(index, Direction::Incoming))
            .map(|e| e.weight().id)
            .collect();
        for edge_id in edges {
            self.edge_id_to_index.remove(&edge_id);
        }

        let slot = index.index();
        self.bodies[slot] = Body::default();
        self.states[slot] = NodeState::new();

        self.graph.remove_node(index);
        self.spatial_dirty.set(true);
        true
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> u32 {
        self.graph.node_count() as u32
    }

    /// IDs of all live nodes, in slot order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter_map(|index| self.graph.node_weight(index).copied())
            .collect()
    }

    /// Get a node's body.
    pub fn body(&self, id: NodeId) -> Option<&Body> {
        self.node_id_to_index
            .get(&id)
            .map(|index| &self.bodies[index.index()])
    }

    /// Get mutable access to a node's body.
    ///
    /// Writes made here bypass derived-state bookkeeping; position changes
    /// should go through [`GraphEngine::update_node`].
    pub fn body_mut(&mut self, id: NodeId) -> Option<&mut Body> {
        self.node_id_to_index
            .get(&id)
            .map(|index| &mut self.bodies[index.index()])
    }

    /// Get a node's position.
    pub fn get_node_position(&self, id: NodeId) -> Option<(f32, f32, f32)> {
        self.body(id).map(|b| (b.x, b.y, b.z))
    }

    /// Move a node and refresh every link touching it.
    pub fn set_node_position(&mut self, id: NodeId, x: f32, y: f32, z: f32) -> bool {
        self.update_node(id, NodePatch::position(x, y, z), true)
    }

    /// Apply a patch to a node and refresh derived state.
    ///
    /// Outgoing link geometry is always refreshed. Incoming links are only
    /// refreshed when `propagate` is set; bulk writers that visit every node
    /// once can skip that pass because each link is refreshed via its source.
    pub fn update_node(&mut self, id: NodeId, patch: NodePatch, propagate: bool) -> bool {
        let Some(&index) = self.node_id_to_index.get(&id) else {
            return false;
        };

        patch.apply_to(&mut self.bodies[index.index()]);
        self.spatial_dirty.set(true);

        self.refresh_links(index, Direction::Outgoing);
        if propagate {
            self.refresh_links(index, Direction::Incoming);
        }
        true
    }

    fn refresh_links(&mut self, index: NodeIndex, direction: Direction) {
        let mut walker = self.graph.neighbors_directed(index, direction).detach();
        while let Some((edge, other)) = walker.next(&self.graph) {
            let (source, target) = match direction {
                Direction::Outgoing => (index, other),
                Direction::Incoming => (other, index),
            };
            let length = self.bodies[source.index()]
                .distance_to(&self.bodies[target.index()], self.dimensions);
            if let Some(link) = self.graph.edge_weight_mut(edge) {
                link.length = length;
            }
        }
    }

    /// Pin a node (exclude from integration).
    pub fn pin_node(&mut self, id: NodeId) {
        if let Some(&index) = self.node_id_to_index.get(&id) {
            self.states[index.index()].set_pinned(true);
        }
    }

    /// Unpin a node.
    pub fn unpin_node(&mut self, id: NodeId) {
        if let Some(&index) = self.node_id_to_index.get(&id) {
            self.states[index.index()].set_pinned(false);
        }
    }

    /// Check if a node is pinned.
    pub fn is_node_pinned(&self, id: NodeId) -> bool {
        self.node_id_to_index
            .get(&id)
            .map(|&index| self.states[index.index()].is_pinned())
            .unwrap_or(false)
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Register a hook run for every node added from now on.
    pub fn subscribe_node_added(&mut self, hook: NodeAddedHook) -> HookId {
        let id = HookId(self.next_hook_id);
        self.next_hook_id += 1;
        self.node_added_hooks.push((id, hook));
        id
    }

    /// Remove a node-added hook. Returns false if it was already gone.
    pub fn unsubscribe_node_added(&mut self, id: HookId) -> bool {
        let before = self.node_added_hooks.len();
        self.node_added_hooks.retain(|(hook_id, _)| *hook_id != id);
        self.node_added_hooks.len() != before
    }

    /// Number of registered node-added hooks.
    pub fn hook_count(&self) -> usize {
        self.node_added_hooks.len()
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Add an edge between two nodes.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, weight: f32) -> Option<EdgeId> {
        let source_index = *self.node_id_to_index.get(&source)?;
        let target_index = *self.node_id_to_index.get(&target)?;

        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;

        let length = self.bodies[source_index.index()]
            .distance_to(&self.bodies[target_index.index()], self.dimensions);
        let index = self
            .graph
            .add_edge(source_index, target_index, Link::new(id, weight, length));
        self.edge_id_to_index.insert(id, index);

        Some(id)
    }

    /// Remove an edge.
    pub fn remove_edge(&mut self, id: EdgeId) -> bool {
        match self.edge_id_to_index.remove(&id) {
            Some(index) => self.graph.remove_edge(index).is_some(),
            None => false,
        }
    }

    /// Get the number of edges.
    pub fn edge_count(&self) -> u32 {
        self.graph.edge_count() as u32
    }

    /// All edges as (source, target, weight).
    pub fn links(&self) -> Vec<(NodeId, NodeId, f32)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()], e.weight().weight))
            .collect()
    }

    /// Cached length of an edge as of its last refresh.
    pub fn link_length(&self, id: EdgeId) -> Option<f32> {
        let index = self.edge_id_to_index.get(&id)?;
        self.graph.edge_weight(*index).map(|link| link.length)
    }

    /// Recompute the cached length of every edge.
    pub fn refresh_all_links(&mut self) {
        let dimensions = self.dimensions;
        let edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (e.id(), e.source(), e.target()))
            .collect();
        for (edge, source, target) in edges {
            let length =
                self.bodies[source.index()].distance_to(&self.bodies[target.index()], dimensions);
            if let Some(link) = self.graph.edge_weight_mut(edge) {
                link.length = length;
            }
        }
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the nearest node to a point.
    pub fn find_nearest_node(&self, x: f32, y: f32, z: f32) -> Option<NodeId> {
        self.ensure_spatial_index_up_to_date();
        self.spatial.borrow().nearest([x, y, z])
    }

    /// Find the nearest node within a maximum distance.
    pub fn find_nearest_node_within(
        &self,
        x: f32,
        y: f32,
        z: f32,
        max_distance: f32,
    ) -> Option<NodeId> {
        self.ensure_spatial_index_up_to_date();
        self.spatial.borrow().nearest_within([x, y, z], max_distance)
    }

    /// Find all nodes in a planar rectangle, any depth.
    pub fn find_nodes_in_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<NodeId> {
        self.ensure_spatial_index_up_to_date();
        self.spatial.borrow().in_box(
            [min_x, min_y, f32::NEG_INFINITY],
            [max_x, max_y, f32::INFINITY],
        )
    }

    fn ensure_spatial_index_up_to_date(&self) {
        if !self.spatial_dirty.get() {
            return;
        }
        let points: Vec<_> = self
            .node_id_to_index
            .iter()
            .map(|(&id, &index)| {
                let b = &self.bodies[index.index()];
                (id, b.x, b.y, b.z)
            })
            .collect();
        self.spatial.borrow_mut().rebuild(&points);
        self.spatial_dirty.set(false);
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Get the planar bounding box of all live nodes.
    pub fn get_bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let mut nodes = self.graph.node_indices().map(|index| &self.bodies[index.index()]);
        let first = nodes.next()?;
        let init = (first.x, first.y, first.x, first.y);
        Some(nodes.fold(init, |(min_x, min_y, max_x, max_y), b| {
            (min_x.min(b.x), min_y.min(b.y), max_x.max(b.x), max_y.max(b.y))
        }))
    }

    /// Clear all nodes and edges. Hooks stay registered.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_id_to_index.clear();
        self.edge_id_to_index.clear();
        self.next_node_id = 0;
        self.next_edge_id = 0;
        self.bodies.clear();
        self.states.clear();
        self.spatial.borrow_mut().clear();
        self.spatial_dirty.set(false);
    }
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::new()
    }
}
