//! Reference force units.
//!
//! Each force adds to node velocities and leaves positions to the engine.
//! All of them scale their effect by `alpha`, so they fade out as the
//! simulation cools.

mod center;
mod link;
mod many_body;

pub use center::CenterForce;
pub use link::LinkForce;
pub use many_body::ManyBodyForce;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used when a force is built without an explicit one.
pub const DEFAULT_JIGGLE_SEED: u64 = 0x5eed;

/// Tiny deterministic offsets for separating coincident nodes.
#[derive(Debug, Clone)]
pub struct Jiggle {
    rng: StdRng,
}

impl Jiggle {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A nonzero-in-practice value in `[-5e-7, 5e-7)`.
    pub fn sample(&mut self) -> f32 {
        (self.rng.random::<f32>() - 0.5) * 1e-6
    }

    /// `value`, or a jiggle if it is exactly zero.
    #[inline]
    pub fn or_jiggle(&mut self, value: f32) -> f32 {
        if value == 0.0 { self.sample() } else { value }
    }
}

impl Default for Jiggle {
    fn default() -> Self {
        Self::new(DEFAULT_JIGGLE_SEED)
    }
}
