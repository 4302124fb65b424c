//! Kinematic state of a node.
//!
//! A body is the part of a node the simulation reads and writes:
//! - Position (x, y, z) in graph space
//! - Velocity (vx, vy, vz) accumulated by forces during a tick
//!
//! `z` and `vz` are carried for every node but only integrated when the
//! graph is three-dimensional.

use serde::{Deserialize, Serialize};

/// Dimensionality of a graph's layout space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dimensions {
    /// Planar layout, `z` is ignored.
    #[default]
    Two,
    /// Spatial layout.
    Three,
}

impl Dimensions {
    /// Number of axes as a count.
    #[inline]
    pub fn count(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    /// Whether the `z` axis takes part in the layout.
    #[inline]
    pub fn has_z(self) -> bool {
        matches!(self, Self::Three)
    }
}

/// Position and velocity of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
}

impl Body {
    /// Create a body at rest at a planar position.
    #[inline]
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// Create a body at rest at a spatial position.
    #[inline]
    pub fn at_3d(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    /// Builder-style velocity override.
    #[inline]
    pub fn with_velocity(mut self, vx: f32, vy: f32, vz: f32) -> Self {
        self.vx = vx;
        self.vy = vy;
        self.vz = vz;
        self
    }

    /// Reset the velocity to zero.
    #[inline]
    pub fn clear_velocity(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
        self.vz = 0.0;
    }

    /// Euclidean distance to another body, honoring dimensionality.
    pub fn distance_to(&self, other: &Body, dim: Dimensions) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = if dim.has_z() { other.z - self.z } else { 0.0 };
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A partial update of a node's position.
///
/// `None` fields are left unchanged. An empty patch is a plain
/// "node changed" notification that still refreshes derived state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodePatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

impl NodePatch {
    /// Patch that moves a node to a new position.
    #[inline]
    pub fn position(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Write the patched fields into a body.
    pub fn apply_to(&self, body: &mut Body) {
        if let Some(x) = self.x {
            body.x = x;
        }
        if let Some(y) = self.y {
            body.y = y;
        }
        if let Some(z) = self.z {
            body.z = z;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_body_at_rest() {
        let body = Body::at(3.0, 4.0);
        assert_eq!((body.vx, body.vy, body.vz), (0.0, 0.0, 0.0));
        assert_eq!(body.z, 0.0);
    }

    #[test]
    fn test_distance_ignores_z_in_2d() {
        let a = Body::at_3d(0.0, 0.0, 0.0);
        let b = Body::at_3d(3.0, 4.0, 12.0);
        assert_approx_eq!(f32, a.distance_to(&b, Dimensions::Two), 5.0);
        assert_approx_eq!(f32, a.distance_to(&b, Dimensions::Three), 13.0);
    }

    #[test]
    fn test_patch_partial() {
        let mut body = Body::at(1.0, 2.0).with_velocity(5.0, 5.0, 0.0);
        let patch = NodePatch {
            y: Some(9.0),
            ..NodePatch::default()
        };
        patch.apply_to(&mut body);
        assert_eq!((body.x, body.y), (1.0, 9.0));
        assert_eq!(body.vx, 5.0);
    }
}
