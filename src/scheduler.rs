//! Frame scheduling seam.
//!
//! The simulation never loops on its own. It asks a [`Scheduler`] to start
//! driving it, and whoever owns the frame source calls
//! [`Simulation::run_frame`] once per frame until that returns `false`.
//!
//! - In the browser the host's `requestAnimationFrame` loop plays this role.
//! - In tests [`ManualScheduler`] replays frames deterministically.

use std::cell::RefCell;
use std::rc::Rc;

use crate::simulation::{Simulation, SimulationError, SimulationGraph};

/// How the frame source paces a driven simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameLoop {
    /// Run a frame every available frame.
    #[default]
    Always,
    /// Run a frame only when pulsed through [`Scheduler::advance_once`].
    Demand,
}

/// The frame source a simulation registers itself with.
pub trait Scheduler {
    /// Drive the simulation every frame until it settles.
    fn request_continuous(&mut self);

    /// Drive the simulation, but only on explicit pulses.
    fn request_on_demand(&mut self);

    /// Pulse one frame in demand mode.
    fn advance_once(&mut self);
}

#[derive(Debug, Default)]
struct ManualState {
    frame_loop: Option<FrameLoop>,
    driving: bool,
    pending_pulses: usize,
    requests: usize,
    frames: usize,
}

/// Deterministic scheduler for tests and headless layout runs.
///
/// Clones share state, so one clone can live inside the simulation while
/// another pumps frames.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode selected by the last request, if any.
    pub fn frame_loop(&self) -> Option<FrameLoop> {
        self.state.borrow().frame_loop
    }

    /// Whether a simulation is currently asking to be driven.
    pub fn is_driving(&self) -> bool {
        self.state.borrow().driving
    }

    /// Number of drive requests received.
    pub fn requests(&self) -> usize {
        self.state.borrow().requests
    }

    /// Demand pulses not yet consumed.
    pub fn pending_pulses(&self) -> usize {
        self.state.borrow().pending_pulses
    }

    /// Frames handed to the simulation so far.
    pub fn frames_run(&self) -> usize {
        self.state.borrow().frames
    }

    /// Run one frame if one is due.
    ///
    /// Returns `Ok(true)` if the simulation ticked and wants more frames.
    /// A settled simulation or an error ends the drive request.
    pub fn run_frame<G: SimulationGraph + 'static>(
        &self,
        simulation: &mut Simulation<G>,
    ) -> Result<bool, SimulationError> {
        {
            let mut state = self.state.borrow_mut();
            if !state.driving {
                return Ok(false);
            }
            if state.frame_loop == Some(FrameLoop::Demand) {
                if state.pending_pulses == 0 {
                    return Ok(false);
                }
                state.pending_pulses -= 1;
            }
            state.frames += 1;
        }

        let result = simulation.run_frame();
        if !matches!(result, Ok(true)) {
            self.state.borrow_mut().driving = false;
        }
        result
    }

    /// Run frames until the simulation stops asking or `max_frames` ran.
    ///
    /// Returns the number of frames that ticked.
    pub fn run_until_settled<G: SimulationGraph + 'static>(
        &self,
        simulation: &mut Simulation<G>,
        max_frames: usize,
    ) -> Result<usize, SimulationError> {
        let mut ticked = 0;
        while ticked < max_frames && self.run_frame(simulation)? {
            ticked += 1;
        }
        Ok(ticked)
    }

    fn request(&self, frame_loop: FrameLoop) {
        let mut state = self.state.borrow_mut();
        state.frame_loop = Some(frame_loop);
        state.driving = true;
        state.requests += 1;
    }
}

impl Scheduler for ManualScheduler {
    fn request_continuous(&mut self) {
        self.request(FrameLoop::Always);
    }

    fn request_on_demand(&mut self) {
        self.request(FrameLoop::Demand);
    }

    fn advance_once(&mut self) {
        self.state.borrow_mut().pending_pulses += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_modes() {
        let mut scheduler = ManualScheduler::new();
        assert!(!scheduler.is_driving());
        assert_eq!(scheduler.frame_loop(), None);

        scheduler.request_on_demand();
        assert!(scheduler.is_driving());
        assert_eq!(scheduler.frame_loop(), Some(FrameLoop::Demand));

        scheduler.request_continuous();
        assert_eq!(scheduler.frame_loop(), Some(FrameLoop::Always));
        assert_eq!(scheduler.requests(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let scheduler = ManualScheduler::new();
        let mut inner = scheduler.clone();
        inner.advance_once();
        inner.advance_once();
        assert_eq!(scheduler.pending_pulses(), 2);
    }
}
