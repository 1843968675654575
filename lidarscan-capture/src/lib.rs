//! # lidarscan Capture
//!
//! Turns host depth frames into scan points.
//!
//! This crate provides sparse grid sampling of depth buffers, pinhole
//! back-projection, depth-gradient normal estimation, scan quality estimation
//! and a simulated depth source for running the pipeline without a sensor.

pub mod depth;
pub mod normals;
pub mod quality;
pub mod simulate;

// Re-export commonly used items
pub use depth::*;
pub use normals::*;
pub use quality::*;
pub use simulate::*;
