//! The minimal graph surface the simulation needs.

use crate::graph::{Body, Dimensions, GraphEngine, HookId, NodeAddedHook, NodeId, NodePatch};

/// A graph the simulation can attach to.
///
/// The graph owns its nodes. The engine only touches velocities through
/// [`SimulationGraph::body_mut`] and routes every position write through
/// [`SimulationGraph::update_node`].
pub trait SimulationGraph {
    /// Layout dimensionality.
    fn dimensions(&self) -> Dimensions;

    /// Snapshot of the live node IDs, in a stable order.
    fn node_ids(&self) -> Vec<NodeId>;

    fn body(&self, id: NodeId) -> Option<&Body>;

    fn body_mut(&mut self, id: NodeId) -> Option<&mut Body>;

    /// Pinned nodes keep their position through integration.
    fn is_pinned(&self, _id: NodeId) -> bool {
        false
    }

    /// Write a node back. `propagate = false` asks the graph to skip the
    /// incoming-link bookkeeping a full pass over all nodes makes redundant.
    fn update_node(&mut self, id: NodeId, patch: NodePatch, propagate: bool) -> bool;

    /// Run `hook` for every node added from now on.
    fn subscribe_node_added(&mut self, hook: NodeAddedHook) -> HookId;

    fn unsubscribe_node_added(&mut self, hook: HookId) -> bool;
}

/// A graph that also exposes its links, for spring-like forces.
pub trait LinkedGraph: SimulationGraph {
    /// Every link as (source, target, weight).
    fn links(&self) -> Vec<(NodeId, NodeId, f32)>;
}

impl SimulationGraph for GraphEngine {
    fn dimensions(&self) -> Dimensions {
        GraphEngine::dimensions(self)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        GraphEngine::node_ids(self)
    }

    fn body(&self, id: NodeId) -> Option<&Body> {
        GraphEngine::body(self, id)
    }

    fn body_mut(&mut self, id: NodeId) -> Option<&mut Body> {
        GraphEngine::body_mut(self, id)
    }

    fn is_pinned(&self, id: NodeId) -> bool {
        self.is_node_pinned(id)
    }

    fn update_node(&mut self, id: NodeId, patch: NodePatch, propagate: bool) -> bool {
        GraphEngine::update_node(self, id, patch, propagate)
    }

    fn subscribe_node_added(&mut self, hook: NodeAddedHook) -> HookId {
        GraphEngine::subscribe_node_added(self, hook)
    }

    fn unsubscribe_node_added(&mut self, hook: HookId) -> bool {
        GraphEngine::unsubscribe_node_added(self, hook)
    }
}

impl LinkedGraph for GraphEngine {
    fn links(&self) -> Vec<(NodeId, NodeId, f32)> {
        GraphEngine::links(self)
    }
}
