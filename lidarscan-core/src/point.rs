//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// One captured sample of the scanned surface.
///
/// Points are immutable once appended to a [`crate::PointCloud`]; the builder
/// style setters are meant to be used before that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Position in camera-local or world space, depending on whether the
    /// source frame carried a camera pose
    pub position: Point3f,
    /// Linear RGB in `[0, 1]`
    pub color: Option<[f32; 3]>,
    /// Unit surface normal
    pub normal: Option<Vector3f>,
    /// Sensor confidence in `[0, 1]`
    pub confidence: f32,
    pub is_scanned: bool,
}

impl ScanPoint {
    /// Create a fully confident point with no color or normal
    pub fn new(position: Point3f) -> Self {
        Self {
            position,
            color: None,
            normal: None,
            confidence: 1.0,
            is_scanned: true,
        }
    }

    /// Set the color, clamping each channel to `[0, 1]`
    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = Some(color.map(|c| c.clamp(0.0, 1.0)));
        self
    }

    /// Set the normal; zero-length normals are dropped
    pub fn with_normal(mut self, normal: Vector3f) -> Self {
        self.normal = normal.try_normalize(f32::EPSILON);
        self
    }

    /// Set the confidence, clamped to `[0, 1]`. NaN maps to 0.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        self
    }
}

impl Default for ScanPoint {
    fn default() -> Self {
        Self::new(Point3f::origin())
    }
}

impl From<Point3f> for ScanPoint {
    fn from(position: Point3f) -> Self {
        Self::new(position)
    }
}

impl From<ScanPoint> for Point3f {
    fn from(point: ScanPoint) -> Self {
        point.position
    }
}
