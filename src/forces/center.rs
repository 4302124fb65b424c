use crate::simulation::{Force, ForceError, SimulationGraph, SimulationParams};

/// Steers the mean node position toward a center point.
///
/// Every node gets the same velocity correction, so relative layout is
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterForce {
    x: f32,
    y: f32,
    z: f32,
    strength: f32,
}

impl Default for CenterForce {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl CenterForce {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            strength: 1.0,
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn center(&self) -> (f32, f32, f32) {
        (self.x, self.y, self.z)
    }
}

impl<G: SimulationGraph + ?Sized> Force<G> for CenterForce {
    fn apply(&mut self, graph: &mut G, params: &SimulationParams) -> Result<(), ForceError> {
        let ids = graph.node_ids();
        if ids.is_empty() {
            return Ok(());
        }

        let (mut sx, mut sy, mut sz) = (0.0f32, 0.0f32, 0.0f32);
        for &id in &ids {
            let body = graph.body(id).ok_or(ForceError::MissingNode(id))?;
            sx += body.x;
            sy += body.y;
            sz += body.z;
        }
        let n = ids.len() as f32;
        let dx = (sx / n - self.x) * self.strength;
        let dy = (sy / n - self.y) * self.strength;
        let dz = (sz / n - self.z) * self.strength;

        let has_z = params.dim.has_z();
        for id in ids {
            let body = graph.body_mut(id).ok_or(ForceError::MissingNode(id))?;
            body.vx -= dx;
            body.vy -= dy;
            if has_z {
                body.vz -= dz;
            }
        }
        Ok(())
    }
}
