//! Pairwise charge between every two nodes.

use super::Jiggle;
use crate::graph::{Body, NodeId};
use crate::simulation::{Force, ForceError, SimulationGraph, SimulationParams};

/// Inverse-distance charge: negative strength repels, positive attracts.
///
/// Exact O(n²) summation. Pairs closer than `distance_min` use a softened
/// distance so the force stays bounded. Pairs beyond `distance_max` are
/// ignored.
#[derive(Debug, Clone)]
pub struct ManyBodyForce {
    strength: f32,
    distance_min: f32,
    distance_max: Option<f32>,
    jiggle: Jiggle,
}

impl Default for ManyBodyForce {
    fn default() -> Self {
        Self {
            strength: -30.0,
            distance_min: 1.0,
            distance_max: None,
            jiggle: Jiggle::default(),
        }
    }
}

impl ManyBodyForce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_distance_min(mut self, distance_min: f32) -> Self {
        self.distance_min = distance_min;
        self
    }

    pub fn with_distance_max(mut self, distance_max: f32) -> Self {
        self.distance_max = Some(distance_max);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.jiggle = Jiggle::new(seed);
        self
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }
}

impl<G: SimulationGraph + ?Sized> Force<G> for ManyBodyForce {
    fn apply(&mut self, graph: &mut G, params: &SimulationParams) -> Result<(), ForceError> {
        let bodies: Vec<(NodeId, Body)> = graph
            .node_ids()
            .into_iter()
            .map(|id| {
                graph
                    .body(id)
                    .map(|body| (id, *body))
                    .ok_or(ForceError::MissingNode(id))
            })
            .collect::<Result<_, _>>()?;

        let has_z = params.dim.has_z();
        let min2 = self.distance_min * self.distance_min;
        let max2 = self.distance_max.map_or(f32::INFINITY, |d| d * d);
        let scale = self.strength * params.alpha;

        for (i, &(id, node)) in bodies.iter().enumerate() {
            let (mut ax, mut ay, mut az) = (0.0, 0.0, 0.0);
            for (j, &(_, other)) in bodies.iter().enumerate() {
                if i == j {
                    continue;
                }
                let mut dx = other.x - node.x;
                let mut dy = other.y - node.y;
                let mut dz = if has_z { other.z - node.z } else { 0.0 };
                let mut l = dx * dx + dy * dy + dz * dz;
                if l >= max2 {
                    continue;
                }

                if dx == 0.0 {
                    dx = self.jiggle.sample();
                    l += dx * dx;
                }
                if dy == 0.0 {
                    dy = self.jiggle.sample();
                    l += dy * dy;
                }
                if has_z && dz == 0.0 {
                    dz = self.jiggle.sample();
                    l += dz * dz;
                }
                if l < min2 {
                    l = (min2 * l).sqrt();
                }

                ax += dx * scale / l;
                ay += dy * scale / l;
                az += dz * scale / l;
            }

            let body = graph.body_mut(id).ok_or(ForceError::MissingNode(id))?;
            body.vx += ax;
            body.vy += ay;
            if has_z {
                body.vz += az;
            }
        }
        Ok(())
    }
}
