use std::fmt;

use crate::{Mat4, Vec3, bounds::BoundingBox};

/// How the normalization scale is derived from the box extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleMode {
    /// `1 / extent` independently per axis (stretches to a cube).
    #[default]
    PerAxis,
    /// `1 / largest extent` on every axis (keeps proportions).
    Uniform,
}

/// Center translation + scale mapping a mesh into a unit-span volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizationTransform {
    /// Box center; translate by `-translation` to re-center at the origin.
    pub translation: Vec3,
    pub scale: Vec3,
}

impl NormalizationTransform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    /// Derive center and scale from `bounds`.
    ///
    /// Axes with zero (or non-finite) extent keep a scale of 1.0, and an empty
    /// box yields the identity.
    pub fn from_bounds(bounds: &BoundingBox, mode: ScaleMode) -> Self {
        if bounds.is_empty() {
            log::warn!("Empty bounding box; using the identity normalization");
            return Self::identity();
        }

        let extent = bounds.extent();
        let scale = match mode {
            ScaleMode::PerAxis => Vec3::new(
                guarded_recip(extent.x, "x"),
                guarded_recip(extent.y, "y"),
                guarded_recip(extent.z, "z"),
            ),
            ScaleMode::Uniform => Vec3::splat(guarded_recip(extent.max_element(), "largest")),
        };

        Self {
            translation: bounds.center(),
            scale,
        }
    }

    /// `S(scale * span) * T(-translation)`. With `span = 2.0` the box lands in [-1, 1].
    #[inline]
    pub fn matrix(&self, span: f32) -> Mat4 {
        Mat4::from_scale(self.scale * span) * Mat4::from_translation(-self.translation)
    }
}

impl Default for NormalizationTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for NormalizationTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (t, s) = (self.translation, self.scale);
        write!(
            f,
            "center=({}, {}, {}) scale=({}, {}, {})",
            t.x, t.y, t.z, s.x, s.y, s.z
        )
    }
}

fn guarded_recip(extent: f32, axis: &str) -> f32 {
    if extent > 0.0 && extent.is_finite() {
        1.0 / extent
    } else {
        log::warn!("Degenerate {axis} extent ({extent}); keeping scale 1.0 on that axis");
        1.0
    }
}

/// Constant-rate rotation about a fixed axis.
#[derive(Clone, Copy, Debug)]
pub struct Spin {
    /// Normalized on construction.
    axis: Vec3,
    pub radians_per_sec: f32,
}

impl Spin {
    pub fn new(axis: Vec3, radians_per_sec: f32) -> Self {
        Self {
            axis: axis.try_normalize().unwrap_or(Vec3::Y),
            radians_per_sec,
        }
    }

    #[inline]
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    #[inline]
    pub fn matrix_at(&self, seconds: f32) -> Mat4 {
        Mat4::from_axis_angle(self.axis, self.radians_per_sec * seconds)
    }
}

impl Default for Spin {
    /// Tumble around the (1, 1, 1) diagonal, a quarter turn per second.
    fn default() -> Self {
        Self::new(Vec3::ONE, std::f32::consts::FRAC_PI_2)
    }
}

/// Orthographic projection that keeps a sphere of `radius` around the origin
/// fully visible for the given aspect ratio (width / height).
pub fn fit_projection(aspect: f32, radius: f32) -> Mat4 {
    let aspect = aspect.max(1e-6);
    let (half_w, half_h) = if aspect >= 1.0 {
        (radius * aspect, radius)
    } else {
        (radius, radius / aspect)
    };
    Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, -radius, radius)
}
