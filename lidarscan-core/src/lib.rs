//! Core data structures for lidarscan
//!
//! This crate provides the fundamental types shared by the capture, export and
//! session layers: scan points, the capacity-bounded point cloud, mesh anchors,
//! triangle meshes, camera intrinsics and rigid transforms.

pub mod point;
pub mod point_cloud;
pub mod mesh;
pub mod anchor;
pub mod camera;
pub mod traits;
pub mod transform;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use mesh::*;
pub use anchor::*;
pub use camera::*;
pub use traits::*;
pub use transform::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4, Isometry3, UnitQuaternion};
