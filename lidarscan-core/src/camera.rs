//! Pinhole camera intrinsics

use crate::point::Point3f;
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics in pixels of the image they describe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Build from a column-major 3x3 matrix as AR frameworks report it
    pub fn from_columns(columns: [[f32; 3]; 3]) -> Self {
        Self {
            fx: columns[0][0],
            fy: columns[1][1],
            cx: columns[2][0],
            cy: columns[2][1],
        }
    }

    /// Rescale intrinsics given for one resolution to another.
    ///
    /// Color-camera intrinsics must be scaled before being used on the
    /// (smaller) depth map.
    pub fn scaled(&self, from: (u32, u32), to: (u32, u32)) -> Self {
        let sx = to.0 as f32 / from.0.max(1) as f32;
        let sy = to.1 as f32 / from.1.max(1) as f32;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
        }
    }

    /// Both focal lengths are finite and positive
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite() && self.fy.is_finite() && self.fx > 0.0 && self.fy > 0.0
    }

    /// Back-project pixel `(u, v)` at `depth` into camera space.
    ///
    /// Camera space is x right, y down, z forward along the optical axis.
    pub fn back_project(&self, u: f32, v: f32, depth: f32) -> Point3f {
        Point3f::new(
            (u - self.cx) * depth / self.fx,
            (v - self.cy) * depth / self.fy,
            depth,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_principal_point_projects_on_axis() {
        let k = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
        let p = k.back_project(320.0, 240.0, 2.0);
        assert_relative_eq!(p, Point3f::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_back_project_offset_pixel() {
        let k = CameraIntrinsics::new(100.0, 200.0, 50.0, 50.0);
        let p = k.back_project(150.0, 250.0, 1.0);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 1.0);
    }

    #[test]
    fn test_scaled_to_depth_resolution() {
        let color = CameraIntrinsics::new(1600.0, 1600.0, 960.0, 720.0);
        let depth = color.scaled((1920, 1440), (256, 192));
        assert_relative_eq!(depth.fx, 1600.0 * 256.0 / 1920.0);
        assert_relative_eq!(depth.cy, 720.0 * 192.0 / 1440.0);
    }

    #[test]
    fn test_from_columns() {
        let k = CameraIntrinsics::from_columns([[500.0, 0.0, 0.0], [0.0, 510.0, 0.0], [320.0, 240.0, 1.0]]);
        assert_eq!(k, CameraIntrinsics::new(500.0, 510.0, 320.0, 240.0));
        assert!(k.is_valid());
    }
}
