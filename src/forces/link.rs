//! Spring force along links.

use std::collections::HashMap;

use super::Jiggle;
use crate::graph::{Body, NodeId};
use crate::simulation::{Force, ForceError, LinkedGraph, SimulationParams};

/// Pulls or pushes linked nodes toward a rest `distance`.
///
/// Each link's correction is split between its ends by degree: the
/// better-connected end moves less. Without an explicit strength a link uses
/// `1 / min(degree(source), degree(target))`, which keeps hubs stable. The
/// link weight multiplies the strength.
#[derive(Debug, Clone)]
pub struct LinkForce {
    distance: f32,
    strength: Option<f32>,
    iterations: usize,
    jiggle: Jiggle,
}

impl Default for LinkForce {
    fn default() -> Self {
        Self {
            distance: 30.0,
            strength: None,
            iterations: 1,
            jiggle: Jiggle::default(),
        }
    }
}

impl LinkForce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }

    /// Fixed strength for every link, instead of the degree-based default.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }

    /// Relaxation passes per tick. More passes make stiffer links.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.jiggle = Jiggle::new(seed);
        self
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }
}

struct Spring {
    source: NodeId,
    target: NodeId,
    strength: f32,
    bias: f32,
}

fn springs(links: &[(NodeId, NodeId, f32)], strength: Option<f32>) -> Vec<Spring> {
    let mut degree: HashMap<NodeId, u32> = HashMap::new();
    for &(source, target, _) in links {
        if source != target {
            *degree.entry(source).or_default() += 1;
            *degree.entry(target).or_default() += 1;
        }
    }

    links
        .iter()
        .filter(|(source, target, _)| source != target)
        .map(|&(source, target, weight)| {
            let ds = degree[&source] as f32;
            let dt = degree[&target] as f32;
            Spring {
                source,
                target,
                strength: strength.unwrap_or(1.0 / ds.min(dt)) * weight,
                bias: ds / (ds + dt),
            }
        })
        .collect()
}

fn body_of<G: LinkedGraph + ?Sized>(graph: &G, id: NodeId) -> Result<Body, ForceError> {
    graph.body(id).copied().ok_or(ForceError::MissingNode(id))
}

impl<G: LinkedGraph + ?Sized> Force<G> for LinkForce {
    fn apply(&mut self, graph: &mut G, params: &SimulationParams) -> Result<(), ForceError> {
        let springs = springs(&graph.links(), self.strength);
        let has_z = params.dim.has_z();

        for _ in 0..self.iterations {
            for spring in &springs {
                let s = body_of(graph, spring.source)?;
                let t = body_of(graph, spring.target)?;

                let mut dx = self.jiggle.or_jiggle(t.x + t.vx - s.x - s.vx);
                let mut dy = self.jiggle.or_jiggle(t.y + t.vy - s.y - s.vy);
                let mut dz = if has_z {
                    self.jiggle.or_jiggle(t.z + t.vz - s.z - s.vz)
                } else {
                    0.0
                };

                let l = (dx * dx + dy * dy + dz * dz).sqrt();
                let k = (l - self.distance) / l * params.alpha * spring.strength;
                dx *= k;
                dy *= k;
                dz *= k;

                let target = graph
                    .body_mut(spring.target)
                    .ok_or(ForceError::MissingNode(spring.target))?;
                target.vx -= dx * spring.bias;
                target.vy -= dy * spring.bias;
                if has_z {
                    target.vz -= dz * spring.bias;
                }

                let source = graph
                    .body_mut(spring.source)
                    .ok_or(ForceError::MissingNode(spring.source))?;
                let b = 1.0 - spring.bias;
                source.vx += dx * b;
                source.vy += dy * b;
                if has_z {
                    source.vz += dz * b;
                }
            }
        }
        Ok(())
    }
}
