//! The simulation engine: cooling schedule, force composition and
//! integration, driven one frame at a time by an external [`Scheduler`].
//!
//! Lifecycle:
//!
//! ```text
//! Idle --attach--> Attached --start--> Running <--start/stop--> Settled
//!                      |                                            |
//!                      +------------------detach--------------------+--> Detached
//! ```
//!
//! A running simulation settles on its own once `alpha < alpha_min`; it stays
//! attached, holding its graph and forces, until [`Simulation::detach`].
//! An attached simulation that was never started still ticks on demand.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::adapter::SimulationGraph;
use super::error::SimulationError;
use super::params::{SimulationConfig, SimulationParams};
use super::registry::{Force, ForceKey, ForceRegistry, ForceSubscription};
use crate::graph::{Body, HookId, NodePatch};
use crate::scheduler::{FrameLoop, Scheduler};

/// Observable lifecycle state of a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// Never attached.
    Idle,
    /// Attached and warm, but not scheduled.
    Attached,
    /// Attached, scheduled and above the stop threshold.
    Running,
    /// Attached, with alpha below the stop threshold.
    Settled,
    /// Was attached, has since been released.
    Detached,
}

struct Attachment<G> {
    graph: Rc<RefCell<G>>,
    hook: HookId,
}

/// Force-directed layout simulation over a shared graph.
pub struct Simulation<G: SimulationGraph + 'static> {
    attachment: Option<Attachment<G>>,
    params: SimulationParams,
    frame_loop: FrameLoop,
    forces: ForceRegistry<G>,
    scheduler: Box<dyn Scheduler>,
    scheduled: bool,
    was_attached: bool,
    next_force_id: u64,
}

impl<G: SimulationGraph + 'static> Simulation<G> {
    /// Create an idle simulation that will register with `scheduler`.
    pub fn new(scheduler: impl Scheduler + 'static) -> Self {
        Self {
            attachment: None,
            params: SimulationParams::default(),
            frame_loop: FrameLoop::Always,
            forces: ForceRegistry::new(),
            scheduler: Box::new(scheduler),
            scheduled: false,
            was_attached: false,
            next_force_id: 0,
        }
    }

    // =========================================================================
    // Attachment
    // =========================================================================

    /// Attach to a graph. See [`Simulation::attach_with`].
    pub fn attach(
        &mut self,
        graph: Rc<RefCell<G>>,
        config: SimulationConfig,
    ) -> Result<(), SimulationError> {
        self.attach_with(graph, config, |_| {})
    }

    /// Attach to a graph and run `on_ready` once attachment is complete.
    ///
    /// Zeroes the velocity of every existing node and hooks the graph so
    /// nodes added later start at rest too. Config overrides are merged onto
    /// the default parameters; the dimensionality comes from the graph. A
    /// previous attachment is released first.
    pub fn attach_with<F>(
        &mut self,
        graph: Rc<RefCell<G>>,
        config: SimulationConfig,
        on_ready: F,
    ) -> Result<(), SimulationError>
    where
        F: FnOnce(&mut Self),
    {
        config.validate()?;
        self.detach()?;

        let (hook, dim, node_count) = {
            let mut g = graph.borrow_mut();
            let ids = g.node_ids();
            for &id in &ids {
                if let Some(body) = g.body_mut(id) {
                    body.clear_velocity();
                }
            }
            let hook = g.subscribe_node_added(Box::new(|_, body: &mut Body| body.clear_velocity()));
            (hook, g.dimensions(), ids.len())
        };

        self.params = SimulationParams::from_config(&config, dim);
        self.frame_loop = if config.demand_frame {
            FrameLoop::Demand
        } else {
            FrameLoop::Always
        };
        self.attachment = Some(Attachment { graph, hook });
        self.was_attached = true;
        debug!(nodes = node_count, dim = dim.count(), "Simulation attached");

        if config.start_on_ready {
            self.start(self.params.alpha)?;
        }
        on_ready(self);
        Ok(())
    }

    /// Release the graph: stop, and remove the node-added hook.
    ///
    /// Returns `Ok(false)` if nothing was attached. Registered forces are kept
    /// for a later attachment. If the graph is borrowed elsewhere the hook
    /// cannot be removed: the simulation is stopped but stays attached, and
    /// [`SimulationError::GraphBusy`] is returned so the caller can retry.
    pub fn detach(&mut self) -> Result<bool, SimulationError> {
        self.stop();
        self.scheduled = false;

        let Some(attachment) = &self.attachment else {
            return Ok(false);
        };
        {
            let Ok(mut g) = attachment.graph.try_borrow_mut() else {
                return Err(SimulationError::GraphBusy);
            };
            g.unsubscribe_node_added(attachment.hook);
        }
        self.attachment = None;
        debug!("Simulation detached");
        Ok(true)
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// The attached graph, if any.
    pub fn graph(&self) -> Option<&Rc<RefCell<G>>> {
        self.attachment.as_ref().map(|a| &a.graph)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Set the energy to `alpha` and ask the scheduler to drive ticks.
    ///
    /// On an already scheduled simulation this only reheats.
    pub fn start(&mut self, alpha: f32) -> Result<(), SimulationError> {
        if self.attachment.is_none() {
            return Err(SimulationError::NotAttached);
        }

        self.params.alpha = alpha;
        if self.scheduled {
            debug!(alpha, "Simulation reheated");
            return Ok(());
        }

        self.scheduled = true;
        match self.frame_loop {
            FrameLoop::Always => self.scheduler.request_continuous(),
            FrameLoop::Demand => self.scheduler.request_on_demand(),
        }
        debug!(alpha, "Simulation started");
        Ok(())
    }

    /// Drop the energy to zero; the next tick reports settled.
    pub fn stop(&mut self) {
        self.params.alpha = 0.0;
    }

    /// Pulse the scheduler for one frame (demand mode).
    pub fn frame(&mut self) {
        self.scheduler.advance_once();
    }

    /// Frame callback for the scheduler.
    ///
    /// Returns whether the simulation wants another frame. A settled tick or
    /// an error ends the scheduling request until the next [`Simulation::start`].
    pub fn run_frame(&mut self) -> Result<bool, SimulationError> {
        if !self.scheduled {
            return Ok(false);
        }
        match self.tick(1) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.scheduled = false;
                debug!(alpha = self.params.alpha, "Simulation settled");
                Ok(false)
            }
            Err(err) => {
                self.scheduled = false;
                Err(err)
            }
        }
    }

    /// Advance the simulation by `iterations` steps.
    ///
    /// Returns `Ok(false)` without touching the graph when already settled.
    /// Each step cools alpha, applies every force, then integrates velocities
    /// into positions. The threshold is only checked on entry.
    pub fn tick(&mut self, iterations: usize) -> Result<bool, SimulationError> {
        if self.params.is_settled() {
            return Ok(false);
        }
        let shared = match &self.attachment {
            Some(attachment) => Rc::clone(&attachment.graph),
            None => return Err(SimulationError::NotAttached),
        };
        let mut graph = shared.borrow_mut();

        for _ in 0..iterations {
            self.params.cool();
            self.forces.apply_all(&mut *graph, &self.params)?;
            integrate(&mut *graph, &self.params)?;
        }

        trace!(alpha = self.params.alpha, iterations, "Simulation ticked");
        Ok(true)
    }

    // =========================================================================
    // Forces
    // =========================================================================

    /// Register `force` under `key`, replacing any force with the same key.
    pub fn subscribe_force<F>(
        &mut self,
        key: impl Into<ForceKey>,
        force: F,
    ) -> Result<ForceSubscription, SimulationError>
    where
        F: Force<G> + 'static,
    {
        if self.attachment.is_none() {
            return Err(SimulationError::NotAttached);
        }
        let key = key.into();
        debug!(key = %key, "Force subscribed");
        Ok(self.forces.register(key, Box::new(force)))
    }

    /// Register `force` under a fresh engine-generated key.
    pub fn add_force<F>(&mut self, force: F) -> Result<ForceSubscription, SimulationError>
    where
        F: Force<G> + 'static,
    {
        if self.attachment.is_none() {
            return Err(SimulationError::NotAttached);
        }
        let key = ForceKey::Generated(self.next_force_id);
        self.next_force_id += 1;
        self.subscribe_force(key, force)
    }

    /// Remove the force under `key` immediately.
    pub fn unsubscribe_force(&mut self, key: &ForceKey) -> bool {
        self.forces.unregister(key)
    }

    /// Registered force keys in application order.
    pub fn force_keys(&self) -> Vec<ForceKey> {
        self.forces.keys()
    }

    pub fn force_count(&self) -> usize {
        self.forces.len()
    }

    /// Drop every registered force.
    pub fn clear_forces(&mut self) {
        self.forces.clear();
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn alpha(&self) -> f32 {
        self.params.alpha
    }

    /// Set the value alpha cools toward. A nonzero target keeps the layout
    /// warm, e.g. while the user drags a node.
    pub fn set_alpha_target(&mut self, alpha_target: f32) {
        self.params.alpha_target = alpha_target;
    }

    /// Whether a scheduling request is outstanding.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn state(&self) -> SimulationState {
        match (&self.attachment, self.was_attached) {
            (None, false) => SimulationState::Idle,
            (None, true) => SimulationState::Detached,
            (Some(_), _) if self.params.is_settled() => SimulationState::Settled,
            (Some(_), _) if self.scheduled => SimulationState::Running,
            (Some(_), _) => SimulationState::Attached,
        }
    }
}

impl<G: SimulationGraph + 'static> Drop for Simulation<G> {
    fn drop(&mut self) {
        if let Err(err) = self.detach() {
            warn!(error = %err, "Simulation dropped while its graph was borrowed");
        }
    }
}

/// Friction then integration for every node, written back without
/// incoming-link propagation.
fn integrate<G: SimulationGraph + ?Sized>(
    graph: &mut G,
    params: &SimulationParams,
) -> Result<(), SimulationError> {
    let decay = params.velocity_decay;
    let has_z = params.dim.has_z();

    for id in graph.node_ids() {
        let pinned = graph.is_pinned(id);
        let body = graph.body_mut(id).ok_or(SimulationError::MissingNode(id))?;
        if pinned {
            body.clear_velocity();
            continue;
        }

        body.vx *= decay;
        body.vy *= decay;
        let mut patch = NodePatch {
            x: Some(body.x + body.vx),
            y: Some(body.y + body.vy),
            z: None,
        };
        if has_z {
            body.vz *= decay;
            patch.z = Some(body.z + body.vz);
        }

        if !graph.update_node(id, patch, false) {
            return Err(SimulationError::MissingNode(id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Dimensions, GraphEngine, NodeId};
    use crate::scheduler::ManualScheduler;
    use crate::simulation::ForceError;
    use float_cmp::assert_approx_eq;

    fn shared(graph: GraphEngine) -> Rc<RefCell<GraphEngine>> {
        Rc::new(RefCell::new(graph))
    }

    fn idle_config() -> SimulationConfig {
        SimulationConfig {
            start_on_ready: false,
            ..SimulationConfig::default()
        }
    }

    fn attached(graph: &Rc<RefCell<GraphEngine>>) -> (Simulation<GraphEngine>, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let mut simulation = Simulation::new(scheduler.clone());
        simulation
            .attach(Rc::clone(graph), SimulationConfig::default())
            .unwrap();
        (simulation, scheduler)
    }

    fn velocity(graph: &Rc<RefCell<GraphEngine>>, id: NodeId) -> (f32, f32, f32) {
        let g = graph.borrow();
        let b = g.body(id).unwrap();
        (b.vx, b.vy, b.vz)
    }

    #[test]
    fn test_new_is_idle() {
        let simulation: Simulation<GraphEngine> = Simulation::new(ManualScheduler::new());
        assert_eq!(simulation.state(), SimulationState::Idle);
        assert!(!simulation.is_attached());
        assert_eq!(simulation.alpha(), 1.0);
    }

    #[test]
    fn test_attach_zeroes_velocities_and_starts() {
        let mut g = GraphEngine::new();
        let a = g.add_body(Body::at(0.0, 0.0).with_velocity(4.0, 5.0, 6.0));
        let graph = shared(g);

        let (simulation, scheduler) = attached(&graph);
        assert_eq!(velocity(&graph, a), (0.0, 0.0, 0.0));
        assert_eq!(simulation.state(), SimulationState::Running);
        assert_eq!(scheduler.requests(), 1);
        assert_eq!(scheduler.frame_loop(), Some(FrameLoop::Always));
    }

    #[test]
    fn test_attach_takes_dim_from_graph() {
        let graph = shared(GraphEngine::with_dimensions(Dimensions::Three));
        let (simulation, _) = attached(&graph);
        assert_eq!(simulation.params().dim, Dimensions::Three);
    }

    #[test]
    fn test_attach_rejects_bad_config() {
        let graph = shared(GraphEngine::new());
        let mut simulation = Simulation::new(ManualScheduler::new());
        let config = SimulationConfig {
            velocity_decay: Some(-0.1),
            ..SimulationConfig::default()
        };
        let err = simulation.attach(graph, config).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
        assert_eq!(simulation.state(), SimulationState::Idle);
    }

    #[test]
    fn test_on_ready_runs_once_with_engine() {
        let graph = shared(GraphEngine::new());
        let mut simulation = Simulation::new(ManualScheduler::new());
        let mut calls = 0;
        simulation
            .attach_with(graph, idle_config(), |sim| {
                calls += 1;
                assert!(sim.is_attached());
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(simulation.state(), SimulationState::Attached);
    }

    #[test]
    fn test_unstarted_attachment_ticks_on_demand() {
        let mut g = GraphEngine::new();
        let a = g.add_node(0.0, 0.0);
        let graph = shared(g);
        let scheduler = ManualScheduler::new();
        let mut simulation = Simulation::new(scheduler.clone());
        simulation
            .attach(Rc::clone(&graph), idle_config())
            .unwrap();
        assert_eq!(simulation.state(), SimulationState::Attached);
        assert_eq!(scheduler.requests(), 0);

        graph.borrow_mut().body_mut(a).unwrap().vx = 10.0;
        assert!(simulation.tick(1).unwrap());
        assert_approx_eq!(f32, graph.borrow().body(a).unwrap().x, 6.0);
        assert!(simulation.alpha() < 1.0);
        assert_eq!(simulation.state(), SimulationState::Attached);

        simulation.stop();
        assert_eq!(simulation.state(), SimulationState::Settled);
        assert!(!simulation.tick(1).unwrap());
    }

    #[test]
    fn test_nodes_added_later_start_at_rest() {
        let graph = shared(GraphEngine::new());
        let (_simulation, _) = attached(&graph);

        let late = graph
            .borrow_mut()
            .add_body(Body::at(1.0, 1.0).with_velocity(9.0, 9.0, 9.0));
        assert_eq!(velocity(&graph, late), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_detach_leaves_no_hook() {
        let mut g = GraphEngine::new();
        let a = g.add_node(0.0, 0.0);
        let graph = shared(g);

        let (mut simulation, _) = attached(&graph);
        assert_eq!(graph.borrow().hook_count(), 1);
        assert!(simulation.detach().unwrap());
        assert!(!simulation.detach().unwrap());

        assert_eq!(velocity(&graph, a), (0.0, 0.0, 0.0));
        assert_eq!(graph.borrow().hook_count(), 0);
        let late = graph
            .borrow_mut()
            .add_body(Body::at(1.0, 1.0).with_velocity(2.0, 3.0, 0.0));
        assert_eq!(velocity(&graph, late), (2.0, 3.0, 0.0));
        assert_eq!(simulation.state(), SimulationState::Detached);
        assert_eq!(simulation.tick(1).unwrap(), false);
    }

    #[test]
    fn test_drop_detaches() {
        let graph = shared(GraphEngine::new());
        let (simulation, _) = attached(&graph);
        drop(simulation);
        assert_eq!(graph.borrow().hook_count(), 0);
    }

    #[test]
    fn test_detach_while_graph_borrowed_reports_busy() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&graph);

        {
            let _reader = graph.borrow();
            assert!(matches!(simulation.detach(), Err(SimulationError::GraphBusy)));
        }
        assert!(simulation.is_attached());
        assert!(!simulation.is_scheduled());
        assert_eq!(simulation.state(), SimulationState::Settled);
        assert_eq!(graph.borrow().hook_count(), 1);

        assert!(simulation.detach().unwrap());
        assert_eq!(graph.borrow().hook_count(), 0);
        assert_eq!(simulation.state(), SimulationState::Detached);
    }

    #[test]
    fn test_reattach_while_old_graph_borrowed_fails() {
        let first = shared(GraphEngine::new());
        let second = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&first);

        let _reader = first.borrow();
        let err = simulation
            .attach(Rc::clone(&second), SimulationConfig::default())
            .unwrap_err();
        assert!(matches!(err, SimulationError::GraphBusy));
        assert!(Rc::ptr_eq(simulation.graph().unwrap(), &first));
        assert_eq!(second.borrow().hook_count(), 0);
    }

    #[test]
    fn test_reattach_releases_previous_graph() {
        let first = shared(GraphEngine::new());
        let second = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&first);

        simulation
            .attach(Rc::clone(&second), SimulationConfig::default())
            .unwrap();
        assert_eq!(first.borrow().hook_count(), 0);
        assert_eq!(second.borrow().hook_count(), 1);
        assert!(Rc::ptr_eq(simulation.graph().unwrap(), &second));
    }

    #[test]
    fn test_misuse_without_attachment() {
        let mut simulation: Simulation<GraphEngine> = Simulation::new(ManualScheduler::new());
        let noop = |_: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> { Ok(()) };

        assert!(matches!(
            simulation.subscribe_force("noop", noop),
            Err(SimulationError::NotAttached)
        ));
        assert!(matches!(simulation.add_force(noop), Err(SimulationError::NotAttached)));
        assert!(matches!(simulation.start(1.0), Err(SimulationError::NotAttached)));
        assert!(matches!(simulation.tick(1), Err(SimulationError::NotAttached)));

        // Always safe.
        simulation.stop();
        assert!(!simulation.detach().unwrap());
    }

    #[test]
    fn test_alpha_decreases_until_settled() {
        let mut g = GraphEngine::new();
        g.add_node(0.0, 0.0);
        let graph = shared(g);
        let (mut simulation, _) = attached(&graph);

        let mut previous = simulation.alpha();
        let mut ticks = 0;
        while simulation.tick(1).unwrap() {
            assert!(simulation.alpha() < previous);
            previous = simulation.alpha();
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert!(simulation.alpha() < simulation.params().alpha_min);
        assert!((295..=305).contains(&ticks));

        let before = *graph.borrow().body(NodeId(0)).unwrap();
        assert_eq!(simulation.tick(1).unwrap(), false);
        assert_eq!(*graph.borrow().body(NodeId(0)).unwrap(), before);
    }

    #[test]
    fn test_alpha_converges_to_target() {
        let graph = shared(GraphEngine::new());
        let scheduler = ManualScheduler::new();
        let mut simulation = Simulation::new(scheduler);
        let config = SimulationConfig {
            alpha_target: Some(0.3),
            start_on_ready: false,
            ..SimulationConfig::default()
        };
        simulation.attach(graph, config).unwrap();
        simulation.start(0.1).unwrap();

        simulation.tick(1).unwrap();
        assert!(simulation.alpha() > 0.1);
        simulation.tick(600).unwrap();
        assert_approx_eq!(f32, simulation.alpha(), 0.3, epsilon = 1e-3);
        assert!(simulation.tick(1).unwrap());
    }

    #[test]
    fn test_friction_only_without_forces() {
        let mut g = GraphEngine::new();
        let a = g.add_node(10.0, 20.0);
        let graph = shared(g);
        let (mut simulation, _) = attached(&graph);

        graph.borrow_mut().body_mut(a).unwrap().vx = 5.0;
        graph.borrow_mut().body_mut(a).unwrap().vy = -10.0;
        assert!(simulation.tick(1).unwrap());

        let g = graph.borrow();
        let body = g.body(a).unwrap();
        assert_approx_eq!(f32, body.vx, 3.0);
        assert_approx_eq!(f32, body.vy, -6.0);
        assert_approx_eq!(f32, body.x, 13.0);
        assert_approx_eq!(f32, body.y, 14.0);
    }

    #[test]
    fn test_2d_leaves_z_alone() {
        let mut g = GraphEngine::new();
        let a = g.add_node(0.0, 0.0);
        let graph = shared(g);
        let (mut simulation, _) = attached(&graph);

        graph.borrow_mut().body_mut(a).unwrap().vz = 5.0;
        simulation.tick(1).unwrap();
        let g = graph.borrow();
        assert_eq!(g.body(a).unwrap().z, 0.0);
        assert_eq!(g.body(a).unwrap().vz, 5.0);
    }

    #[test]
    fn test_3d_integrates_z() {
        let mut g = GraphEngine::with_dimensions(Dimensions::Three);
        let a = g.add_node_3d(0.0, 0.0, 1.0);
        let graph = shared(g);
        let (mut simulation, _) = attached(&graph);

        graph.borrow_mut().body_mut(a).unwrap().vz = 5.0;
        simulation.tick(1).unwrap();
        assert_approx_eq!(f32, graph.borrow().body(a).unwrap().z, 4.0);
    }

    #[test]
    fn test_pinned_nodes_hold_position() {
        let mut g = GraphEngine::new();
        let a = g.add_node(1.0, 1.0);
        g.pin_node(a);
        let graph = shared(g);
        let (mut simulation, _) = attached(&graph);

        simulation
            .subscribe_force("push", |g: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> {
                for id in g.node_ids() {
                    if let Some(body) = g.body_mut(id) {
                        body.vx += 1.0;
                    }
                }
                Ok(())
            })
            .unwrap();
        simulation.tick(3).unwrap();
        assert_eq!(graph.borrow().get_node_position(a), Some((1.0, 1.0, 0.0)));
        assert_eq!(velocity(&graph, a), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_forces_see_cooled_alpha() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&graph);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        simulation
            .add_force(move |_: &mut GraphEngine, params: &SimulationParams| -> Result<(), ForceError> {
                log.borrow_mut().push(params.alpha);
                Ok(())
            })
            .unwrap();
        simulation.tick(2).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_approx_eq!(f32, seen[0], 1.0 - 0.0227);
        assert!(seen[1] < seen[0]);
    }

    #[test]
    fn test_stop_then_tick_is_noop() {
        let mut g = GraphEngine::new();
        let a = g.add_node(0.0, 0.0);
        let graph = shared(g);
        let (mut simulation, _) = attached(&graph);

        graph.borrow_mut().body_mut(a).unwrap().vx = 7.0;
        simulation.stop();
        assert_eq!(simulation.tick(1).unwrap(), false);
        assert_eq!(velocity(&graph, a), (7.0, 0.0, 0.0));
        assert_eq!(graph.borrow().get_node_position(a), Some((0.0, 0.0, 0.0)));
        assert_eq!(simulation.state(), SimulationState::Settled);
    }

    #[test]
    fn test_restart_reheats_without_second_request() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, scheduler) = attached(&graph);

        simulation.tick(10).unwrap();
        simulation.start(0.5).unwrap();
        assert_eq!(simulation.alpha(), 0.5);
        assert_eq!(scheduler.requests(), 1);
    }

    #[test]
    fn test_scheduler_drives_to_settlement_and_restart_resumes() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, scheduler) = attached(&graph);

        let ticked = scheduler.run_until_settled(&mut simulation, 10_000).unwrap();
        assert!((295..=305).contains(&ticked));
        assert!(!scheduler.is_driving());
        assert!(!simulation.is_scheduled());
        assert_eq!(simulation.state(), SimulationState::Settled);

        simulation.start(1.0).unwrap();
        assert_eq!(scheduler.requests(), 2);
        assert!(scheduler.run_frame(&mut simulation).unwrap());
    }

    #[test]
    fn test_stop_ends_scheduling_on_next_frame() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, scheduler) = attached(&graph);

        assert!(scheduler.run_frame(&mut simulation).unwrap());
        simulation.stop();
        assert!(!scheduler.run_frame(&mut simulation).unwrap());
        assert!(!scheduler.is_driving());
    }

    #[test]
    fn test_demand_mode_waits_for_pulses() {
        let graph = shared(GraphEngine::new());
        let scheduler = ManualScheduler::new();
        let mut simulation = Simulation::new(scheduler.clone());
        let config = SimulationConfig {
            demand_frame: true,
            ..SimulationConfig::default()
        };
        simulation.attach(graph, config).unwrap();
        assert_eq!(scheduler.frame_loop(), Some(FrameLoop::Demand));

        assert!(!scheduler.run_frame(&mut simulation).unwrap());
        assert_eq!(simulation.alpha(), 1.0);

        simulation.frame();
        assert!(scheduler.run_frame(&mut simulation).unwrap());
        assert!(simulation.alpha() < 1.0);
        assert!(!scheduler.run_frame(&mut simulation).unwrap());
        assert_eq!(scheduler.frames_run(), 1);
    }

    #[test]
    fn test_force_failure_propagates_and_keeps_partial_writes() {
        let mut g = GraphEngine::new();
        let a = g.add_node(0.0, 0.0);
        let graph = shared(g);
        let (mut simulation, scheduler) = attached(&graph);

        simulation
            .subscribe_force("kick", move |g: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> {
                g.body_mut(a).ok_or(ForceError::MissingNode(a))?.vx += 10.0;
                Ok(())
            })
            .unwrap();
        simulation
            .subscribe_force("broken", |_: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> {
                Err(ForceError::Other("diverged".into()))
            })
            .unwrap();

        let err = scheduler.run_frame(&mut simulation).unwrap_err();
        assert!(matches!(err, SimulationError::Force { ref key, .. } if key.to_string() == "broken"));
        assert_eq!(velocity(&graph, a), (10.0, 0.0, 0.0));
        assert_eq!(graph.borrow().get_node_position(a), Some((0.0, 0.0, 0.0)));
        assert!(!scheduler.is_driving());
        assert!(!simulation.is_scheduled());
    }

    #[test]
    fn test_unsubscribe_handle_takes_effect_next_tick() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&graph);
        let runs = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&runs);
        let late = simulation
            .subscribe_force("late", move |_: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> {
                log.borrow_mut().push("late");
                Ok(())
            })
            .unwrap();

        // Registered after "late", so it releases a force already iterated.
        let handle = late.clone();
        let log = Rc::clone(&runs);
        simulation
            .subscribe_force("releaser", move |_: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> {
                handle.unsubscribe();
                log.borrow_mut().push("releaser");
                Ok(())
            })
            .unwrap();

        simulation.tick(1).unwrap();
        assert_eq!(*runs.borrow(), vec!["late", "releaser"]);
        simulation.tick(1).unwrap();
        assert_eq!(*runs.borrow(), vec!["late", "releaser", "releaser"]);
        assert_eq!(simulation.force_keys(), vec![ForceKey::from("releaser")]);
    }

    #[test]
    fn test_self_release_applies_within_multi_iteration_tick() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&graph);
        let runs = Rc::new(RefCell::new(0));

        let count = Rc::clone(&runs);
        let slot: Rc<RefCell<Option<ForceSubscription>>> = Rc::new(RefCell::new(None));
        let own = Rc::clone(&slot);
        let subscription = simulation
            .subscribe_force("once", move |_: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> {
                *count.borrow_mut() += 1;
                if let Some(me) = own.borrow().as_ref() {
                    me.unsubscribe();
                }
                Ok(())
            })
            .unwrap();
        *slot.borrow_mut() = Some(subscription);

        simulation.tick(3).unwrap();
        assert_eq!(*runs.borrow(), 1);
        assert_eq!(simulation.force_count(), 0);
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&graph);
        let noop = |_: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> { Ok(()) };

        let a = simulation.add_force(noop).unwrap();
        let b = simulation.add_force(noop).unwrap();
        assert_ne!(a.key(), b.key());
        assert_eq!(simulation.force_count(), 2);

        assert!(simulation.unsubscribe_force(a.key()));
        assert!(!simulation.unsubscribe_force(a.key()));
        assert_eq!(simulation.force_keys(), vec![b.key().clone()]);
    }

    #[test]
    fn test_forces_survive_reattach() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&graph);
        let noop = |_: &mut GraphEngine, _: &SimulationParams| -> Result<(), ForceError> { Ok(()) };
        simulation.subscribe_force("noop", noop).unwrap();

        simulation.detach().unwrap();
        simulation
            .attach(Rc::clone(&graph), SimulationConfig::default())
            .unwrap();
        assert_eq!(simulation.force_count(), 1);

        simulation.clear_forces();
        assert_eq!(simulation.force_count(), 0);
    }

    #[test]
    fn test_alpha_target_reheats() {
        let graph = shared(GraphEngine::new());
        let (mut simulation, _) = attached(&graph);
        simulation.tick(100).unwrap();
        let cooled = simulation.alpha();

        simulation.set_alpha_target(0.5);
        simulation.tick(10).unwrap();
        assert!(simulation.alpha() > cooled);
    }
}
