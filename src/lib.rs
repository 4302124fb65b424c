//! Heroine Force - WASM Module
//!
//! Force-directed layout simulation for the Heroine Graph visualization
//! library. A [`Simulation`] attaches to a shared [`GraphEngine`], cools an
//! energy value (`alpha`) tick by tick, lets registered forces push node
//! velocities around and integrates the result into positions. Ticks are
//! driven from outside through the [`Scheduler`] seam.
//!
//! # Architecture
//!
//! - `graph`: Graph data structure using petgraph's StableGraph
//! - `spatial`: R-tree spatial indexing for hit testing
//! - `simulation`: Cooling schedule, force registry and integration
//! - `scheduler`: Frame scheduling seam and a deterministic driver
//! - `forces`: Link, many-body and centering forces

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Float32Array, Function};
use tracing::warn;
use wasm_bindgen::prelude::*;

pub mod forces;
pub mod graph;
pub mod scheduler;
pub mod simulation;
pub mod spatial;

use forces::{CenterForce, LinkForce, ManyBodyForce};
use graph::{Dimensions, GraphEngine, NodeId};
use scheduler::Scheduler;
use simulation::{ForceKey, Simulation, SimulationConfig, SimulationError, SimulationState};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // A host may have installed its own subscriber first.
    #[cfg(target_arch = "wasm32")]
    let _ = tracing_wasm::try_set_as_global_default();
}

/// Scheduler backed by a JS callback.
///
/// The callback receives `"always"`, `"demand"` or `"advance"` and must only
/// schedule work (e.g. `requestAnimationFrame(() => sim.runFrame())`), never
/// call back into the simulation synchronously.
#[derive(Clone, Default)]
struct JsScheduler {
    callback: Rc<RefCell<Option<Function>>>,
}

impl JsScheduler {
    fn notify(&self, event: &str) {
        let callback = self.callback.borrow();
        let Some(callback) = callback.as_ref() else {
            warn!(event, "No scheduler callback set");
            return;
        };
        if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(event)) {
            warn!(event, error = ?err, "Scheduler callback threw");
        }
    }
}

impl Scheduler for JsScheduler {
    fn request_continuous(&mut self) {
        self.notify("always");
    }

    fn request_on_demand(&mut self) {
        self.notify("demand");
    }

    fn advance_once(&mut self) {
        self.notify("advance");
    }
}

/// Main entry point for the force layout.
///
/// Owns a graph and a simulation attached to it, and exposes both to
/// JavaScript.
#[wasm_bindgen]
pub struct HeroineForceWasm {
    graph: Rc<RefCell<GraphEngine>>,
    simulation: Simulation<GraphEngine>,
    scheduler: JsScheduler,
}

#[wasm_bindgen]
impl HeroineForceWasm {
    /// Create an empty planar layout.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::from_graph(GraphEngine::new())
    }

    /// Create an empty layout with 2 or 3 dimensions.
    #[wasm_bindgen(js_name = withDimensions)]
    pub fn with_dimensions(dimensions: u32) -> Self {
        let dimensions = if dimensions >= 3 {
            Dimensions::Three
        } else {
            Dimensions::Two
        };
        Self::from_graph(GraphEngine::with_dimensions(dimensions))
    }

    /// Install the scheduler callback. See the module docs for the protocol.
    #[wasm_bindgen(js_name = setScheduler)]
    pub fn set_scheduler(&mut self, callback: Function) {
        *self.scheduler.callback.borrow_mut() = Some(callback);
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Add a node at the specified position.
    ///
    /// Returns the stable node ID.
    #[wasm_bindgen(js_name = addNode)]
    pub fn add_node(&mut self, x: f32, y: f32) -> u32 {
        self.graph.borrow_mut().add_node(x, y).0
    }

    #[wasm_bindgen(js_name = addNode3d)]
    pub fn add_node_3d(&mut self, x: f32, y: f32, z: f32) -> u32 {
        self.graph.borrow_mut().add_node_3d(x, y, z).0
    }

    /// Remove a node by ID.
    ///
    /// Returns true if the node existed and was removed.
    #[wasm_bindgen(js_name = removeNode)]
    pub fn remove_node(&mut self, node_id: u32) -> bool {
        self.graph.borrow_mut().remove_node(NodeId(node_id))
    }

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.graph.borrow().node_count()
    }

    /// Live node IDs, in the order `getPositions` reports them.
    #[wasm_bindgen(js_name = getNodeIds)]
    pub fn get_node_ids(&self) -> Vec<u32> {
        self.graph.borrow().node_ids().into_iter().map(|id| id.0).collect()
    }

    /// Get a node's position as `[x, y, z]`.
    #[wasm_bindgen(js_name = getNodePosition)]
    pub fn get_node_position(&self, node_id: u32) -> Option<Vec<f32>> {
        self.graph
            .borrow()
            .get_node_position(NodeId(node_id))
            .map(|(x, y, z)| vec![x, y, z])
    }

    /// Set a node's position. Used when dragging.
    #[wasm_bindgen(js_name = setNodePosition)]
    pub fn set_node_position(&mut self, node_id: u32, x: f32, y: f32, z: f32) -> bool {
        self.graph
            .borrow_mut()
            .set_node_position(NodeId(node_id), x, y, z)
    }

    /// Pin a node (exclude from simulation).
    #[wasm_bindgen(js_name = pinNode)]
    pub fn pin_node(&mut self, node_id: u32) {
        self.graph.borrow_mut().pin_node(NodeId(node_id));
    }

    #[wasm_bindgen(js_name = unpinNode)]
    pub fn unpin_node(&mut self, node_id: u32) {
        self.graph.borrow_mut().unpin_node(NodeId(node_id));
    }

    #[wasm_bindgen(js_name = isNodePinned)]
    pub fn is_node_pinned(&self, node_id: u32) -> bool {
        self.graph.borrow().is_node_pinned(NodeId(node_id))
    }

    /// Positions of every live node, packed as `[x0, y0, x1, y1, ...]`, or
    /// with a z component per node in 3D.
    ///
    /// Returns a copy; it stays valid across WASM memory growth.
    #[wasm_bindgen(js_name = getPositions)]
    pub fn get_positions(&self) -> Float32Array {
        Float32Array::from(self.packed_positions().as_slice())
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Add an edge between two nodes.
    ///
    /// Returns the stable edge ID, or None if either node doesn't exist.
    #[wasm_bindgen(js_name = addEdge)]
    pub fn add_edge(&mut self, source: u32, target: u32, weight: f32) -> Option<u32> {
        self.graph
            .borrow_mut()
            .add_edge(NodeId(source), NodeId(target), weight)
            .map(|id| id.0)
    }

    #[wasm_bindgen(js_name = removeEdge)]
    pub fn remove_edge(&mut self, edge_id: u32) -> bool {
        self.graph.borrow_mut().remove_edge(graph::EdgeId(edge_id))
    }

    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> u32 {
        self.graph.borrow().edge_count()
    }

    /// Recompute every cached link length from current positions.
    ///
    /// Ticks only refresh a link when its source is written, so call this
    /// before reading exact lengths after a run.
    #[wasm_bindgen(js_name = refreshAllLinks)]
    pub fn refresh_all_links(&mut self) {
        self.graph.borrow_mut().refresh_all_links();
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the nearest node to a point.
    #[wasm_bindgen(js_name = findNearestNode)]
    pub fn find_nearest_node(&self, x: f32, y: f32, z: f32) -> Option<u32> {
        self.graph.borrow().find_nearest_node(x, y, z).map(|id| id.0)
    }

    /// Find the nearest node within a maximum distance.
    #[wasm_bindgen(js_name = findNearestNodeWithin)]
    pub fn find_nearest_node_within(&self, x: f32, y: f32, z: f32, max_distance: f32) -> Option<u32> {
        self.graph
            .borrow()
            .find_nearest_node_within(x, y, z, max_distance)
            .map(|id| id.0)
    }

    #[wasm_bindgen(js_name = findNodesInRect)]
    pub fn find_nodes_in_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<u32> {
        self.graph
            .borrow()
            .find_nodes_in_rect(min_x, min_y, max_x, max_y)
            .into_iter()
            .map(|id| id.0)
            .collect()
    }

    /// Returns [min_x, min_y, max_x, max_y], or None if graph is empty.
    #[wasm_bindgen(js_name = getBounds)]
    pub fn get_bounds(&self) -> Option<Vec<f32>> {
        self.graph
            .borrow()
            .get_bounds()
            .map(|(min_x, min_y, max_x, max_y)| vec![min_x, min_y, max_x, max_y])
    }

    /// Clear all nodes and edges. The simulation stays attached.
    pub fn clear(&mut self) {
        self.graph.borrow_mut().clear();
    }

    // =========================================================================
    // Simulation Lifecycle
    // =========================================================================

    /// Attach the simulation to the graph.
    ///
    /// `config` is an optional object with `alpha`, `alphaMin`, `alphaDecay`,
    /// `alphaTarget`, `velocityDecay`, `startOnReady` and `demandFrame`.
    pub fn attach(&mut self, config: JsValue) -> Result<(), JsError> {
        let config = if config.is_undefined() || config.is_null() {
            SimulationConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        Ok(self.attach_config(config)?)
    }

    /// Release the graph. Returns false if nothing was attached.
    pub fn detach(&mut self) -> Result<bool, JsError> {
        Ok(self.simulation.detach()?)
    }

    /// Reheat to `alpha` and ask the scheduler for frames.
    pub fn start(&mut self, alpha: f32) -> Result<(), JsError> {
        Ok(self.simulation.start(alpha)?)
    }

    pub fn stop(&mut self) {
        self.simulation.stop();
    }

    /// Advance `iterations` steps. Returns false once settled.
    pub fn tick(&mut self, iterations: u32) -> Result<bool, JsError> {
        Ok(self.simulation.tick(iterations as usize)?)
    }

    /// Frame callback. Keep requesting frames while this returns true.
    #[wasm_bindgen(js_name = runFrame)]
    pub fn run_frame(&mut self) -> Result<bool, JsError> {
        Ok(self.simulation.run_frame()?)
    }

    /// Request one frame in demand mode.
    pub fn frame(&mut self) {
        self.simulation.frame();
    }

    pub fn alpha(&self) -> f32 {
        self.simulation.alpha()
    }

    #[wasm_bindgen(js_name = setAlphaTarget)]
    pub fn set_alpha_target(&mut self, alpha_target: f32) {
        self.simulation.set_alpha_target(alpha_target);
    }

    /// One of `"idle"`, `"attached"`, `"running"`, `"settled"`, `"detached"`.
    pub fn state(&self) -> String {
        match self.simulation.state() {
            SimulationState::Idle => "idle",
            SimulationState::Attached => "attached",
            SimulationState::Running => "running",
            SimulationState::Settled => "settled",
            SimulationState::Detached => "detached",
        }
        .to_string()
    }

    #[wasm_bindgen(js_name = isScheduled)]
    pub fn is_scheduled(&self) -> bool {
        self.simulation.is_scheduled()
    }

    // =========================================================================
    // Forces
    // =========================================================================

    /// Register or replace a link force under `key`.
    #[wasm_bindgen(js_name = setLinkForce)]
    pub fn set_link_force(
        &mut self,
        key: String,
        distance: f32,
        strength: Option<f32>,
        iterations: Option<u32>,
    ) -> Result<(), JsError> {
        let mut force = LinkForce::new()
            .with_distance(distance)
            .with_iterations(iterations.unwrap_or(1) as usize);
        if let Some(strength) = strength {
            force = force.with_strength(strength);
        }
        self.simulation.subscribe_force(key, force)?;
        Ok(())
    }

    /// Register or replace a many-body force under `key`.
    #[wasm_bindgen(js_name = setManyBodyForce)]
    pub fn set_many_body_force(
        &mut self,
        key: String,
        strength: f32,
        distance_min: Option<f32>,
        distance_max: Option<f32>,
    ) -> Result<(), JsError> {
        let mut force = ManyBodyForce::new().with_strength(strength);
        if let Some(distance_min) = distance_min {
            force = force.with_distance_min(distance_min);
        }
        if let Some(distance_max) = distance_max {
            force = force.with_distance_max(distance_max);
        }
        self.simulation.subscribe_force(key, force)?;
        Ok(())
    }

    /// Register or replace a centering force under `key`.
    #[wasm_bindgen(js_name = setCenterForce)]
    pub fn set_center_force(
        &mut self,
        key: String,
        x: f32,
        y: f32,
        z: f32,
        strength: Option<f32>,
    ) -> Result<(), JsError> {
        let force = CenterForce::new(x, y, z).with_strength(strength.unwrap_or(1.0));
        self.simulation.subscribe_force(key, force)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = removeForce)]
    pub fn remove_force(&mut self, key: String) -> bool {
        self.simulation.unsubscribe_force(&ForceKey::from(key))
    }

    #[wasm_bindgen(js_name = forceKeys)]
    pub fn force_keys(&self) -> Vec<String> {
        self.simulation
            .force_keys()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl HeroineForceWasm {
    fn from_graph(graph: GraphEngine) -> Self {
        let scheduler = JsScheduler::default();
        Self {
            graph: Rc::new(RefCell::new(graph)),
            simulation: Simulation::new(scheduler.clone()),
            scheduler,
        }
    }

    /// Attach with an already parsed config.
    pub fn attach_config(&mut self, config: SimulationConfig) -> Result<(), SimulationError> {
        self.simulation.attach(Rc::clone(&self.graph), config)
    }

    fn packed_positions(&self) -> Vec<f32> {
        let graph = self.graph.borrow();
        let has_z = graph.dimensions().has_z();
        let ids = graph.node_ids();
        let mut packed = Vec::with_capacity(ids.len() * graph.dimensions().count());
        for id in ids {
            if let Some(body) = graph.body(id) {
                packed.push(body.x);
                packed.push(body.y);
                if has_z {
                    packed.push(body.z);
                }
            }
        }
        packed
    }
}

impl Default for HeroineForceWasm {
    fn default() -> Self {
        Self::new()
    }
}
