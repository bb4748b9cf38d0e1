//! Axis-aligned bounding box over flat xyz position buffers.

use std::fmt;

use crate::Vec3;

/// Axis-aligned bounding box. The empty box has `min = +inf`, `max = -inf`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Single left-to-right pass over `[x0, y0, z0, x1, y1, z1, ...]`.
    /// A trailing partial triple is ignored.
    pub fn from_positions(positions: &[f32]) -> Self {
        positions
            .chunks_exact(3)
            .fold(Self::EMPTY, |mut bb, p| {
                bb.merge_point(Vec3::new(p[0], p[1], p[2]));
                bb
            })
    }

    #[inline]
    pub fn merge_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// True until at least one point has been merged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Box center, `(max + min) / 2`.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.max + self.min) * 0.5
    }

    /// Per-axis size, `max - min`.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty>");
        }
        write!(
            f,
            "min=({}, {}, {}) max=({}, {}, {})",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;

    fn cube_corners() -> Vec<f32> {
        let mut out = Vec::new();
        for &x in &[-1.0, 1.0] {
            for &y in &[-1.0, 1.0] {
                for &z in &[-1.0, 1.0] {
                    out.extend_from_slice(&[x, y, z]);
                }
            }
        }
        out
    }

    #[test]
    fn cube_bounds() {
        let bb = BoundingBox::from_positions(&cube_corners());
        assert_eq!(bb.min, vec3(-1.0, -1.0, -1.0));
        assert_eq!(bb.max, vec3(1.0, 1.0, 1.0));
        assert_eq!(bb.center(), Vec3::ZERO);
        assert_eq!(bb.extent(), vec3(2.0, 2.0, 2.0));
    }

    #[test]
    fn single_vertex_collapses_box() {
        let bb = BoundingBox::from_positions(&[3.0, -2.0, 0.5]);
        assert!(!bb.is_empty());
        assert_eq!(bb.min, bb.max);
        assert_eq!(bb.center(), vec3(3.0, -2.0, 0.5));
    }

    #[test]
    fn no_vertices_is_empty() {
        let bb = BoundingBox::from_positions(&[]);
        assert!(bb.is_empty());
        assert_eq!(bb, BoundingBox::EMPTY);
        assert_eq!(bb.to_string(), "<empty>");
    }

    #[test]
    fn negative_only_coordinates() {
        // max must start at -inf, not at the smallest positive float.
        let bb = BoundingBox::from_positions(&[-5.0, -6.0, -7.0, -1.0, -2.0, -3.0]);
        assert_eq!(bb.max, vec3(-1.0, -2.0, -3.0));
        assert_eq!(bb.min, vec3(-5.0, -6.0, -7.0));
    }

    #[test]
    fn same_input_same_result() {
        let pts: Vec<f32> = (0..300).map(|i| (i as f32 * 0.37).sin() * 10.0).collect();
        let a = BoundingBox::from_positions(&pts);
        let b = BoundingBox::from_positions(&pts);
        assert_eq!(a, b);
    }
}
