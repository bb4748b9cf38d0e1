//! Core types (renderer-agnostic): math re-exports, errors, mesh bounds and
//! the normalization transform.

pub use glam::{Mat3, Mat4, Vec3, Vec4, vec3};

pub mod bounds;
pub mod error;
pub mod transform;

pub use bounds::BoundingBox;
pub use error::{CoreError, CoreResult};
pub use transform::{NormalizationTransform, ScaleMode, Spin};
