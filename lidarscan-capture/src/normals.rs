//! Surface normals from depth gradients

use crate::depth::DepthFrame;
use lidarscan_core::Vector3f;

/// Estimate the surface normal at a pixel from central depth differences.
///
/// Returns `None` on the frame border or when the pixel or any of its four
/// neighbours has invalid depth. The normal is in camera space and points
/// towards the camera (negative z). With intrinsics the gradient is taken per
/// metre of lateral displacement; without them it is per pixel.
pub fn estimate_normal(frame: &DepthFrame<'_>, x: usize, y: usize) -> Option<Vector3f> {
    if x == 0 || y == 0 {
        return None;
    }
    let center = frame.valid_depth_at(x, y)?;
    let left = frame.valid_depth_at(x - 1, y)?;
    let right = frame.valid_depth_at(x + 1, y)?;
    let top = frame.valid_depth_at(x, y - 1)?;
    let bottom = frame.valid_depth_at(x, y + 1)?;

    let mut dzdx = (right - left) / 2.0;
    let mut dzdy = (bottom - top) / 2.0;

    if let Some(k) = frame.intrinsics.filter(|k| k.is_valid()) {
        // one pixel spans depth / f metres at this distance
        dzdx *= k.fx / center;
        dzdy *= k.fy / center;
    }

    Vector3f::new(dzdx, dzdy, -1.0).try_normalize(f32::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lidarscan_core::CameraIntrinsics;

    #[test]
    fn test_flat_wall_faces_camera() {
        let data = vec![2.0; 9];
        let frame = DepthFrame::new(3, 3, &data);
        let n = estimate_normal(&frame, 1, 1).unwrap();
        assert_relative_eq!(n, Vector3f::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_border_and_holes_have_no_normal() {
        let mut data = vec![2.0; 9];
        let frame = DepthFrame::new(3, 3, &data);
        assert!(estimate_normal(&frame, 0, 1).is_none());
        assert!(estimate_normal(&frame, 2, 1).is_none());

        data[3] = 0.0;
        let frame = DepthFrame::new(3, 3, &data);
        assert!(estimate_normal(&frame, 1, 1).is_none());
    }

    #[test]
    fn test_slope_tilts_normal() {
        // depth grows to the right by 1 per pixel
        let data = vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let frame = DepthFrame::new(3, 3, &data);
        let n = estimate_normal(&frame, 1, 1).unwrap();
        let expected = Vector3f::new(1.0, 0.0, -1.0).normalize();
        assert_relative_eq!(n, expected, epsilon = 1e-6);

        // metric gradient: one pixel is 2 / 2 = 1 m wide, same slope
        let frame = frame.with_intrinsics(CameraIntrinsics::new(2.0, 2.0, 1.0, 1.0));
        let n = estimate_normal(&frame, 1, 1).unwrap();
        assert_relative_eq!(n, expected, epsilon = 1e-6);
    }
}
