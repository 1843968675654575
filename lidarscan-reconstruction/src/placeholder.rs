//! Placeholder geometry used when no real mesh can be exported

use lidarscan_core::{CloudSnapshot, Point3f, TriangleMesh};
use nalgebra::Vector3;

/// Edge length of the placeholder box in meters
pub const DEFAULT_PLACEHOLDER_EDGE: f32 = 0.1;

/// Mean position of the captured points, if any
pub fn centroid(points: &CloudSnapshot) -> Option<Point3f> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.position.coords);
    Some(Point3f::from(sum / points.len() as f32))
}

/// A small box at the centroid of the captured points, or at the origin
pub fn placeholder_mesh(points: &CloudSnapshot, edge: f32) -> TriangleMesh {
    let edge = if edge.is_finite() && edge > 0.0 {
        edge
    } else {
        DEFAULT_PLACEHOLDER_EDGE
    };
    let center = centroid(points).unwrap_or_else(Point3f::origin);
    let mut mesh = TriangleMesh::cuboid(center, edge);
    let normals = mesh.calculate_vertex_normals();
    mesh.set_normals(normals);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lidarscan_core::{Bounded, ScanPoint};

    #[test]
    fn test_placeholder_at_origin() {
        let mesh = placeholder_mesh(&CloudSnapshot::default(), 0.1);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        let (min, max) = mesh.bounding_box().unwrap();
        assert_relative_eq!(min.x, -0.05);
        assert_relative_eq!(max.z, 0.05);
    }

    #[test]
    fn test_placeholder_follows_points() {
        let points: CloudSnapshot = vec![
            ScanPoint::new(Point3f::new(1.0, 0.0, 0.0)),
            ScanPoint::new(Point3f::new(3.0, 2.0, 0.0)),
        ]
        .into();
        assert_relative_eq!(centroid(&points).unwrap(), Point3f::new(2.0, 1.0, 0.0));

        let center = placeholder_mesh(&points, 0.2).center().unwrap();
        assert_relative_eq!(center, Point3f::new(2.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_edge_uses_default() {
        let mesh = placeholder_mesh(&CloudSnapshot::default(), -1.0);
        let (min, max) = mesh.bounding_box().unwrap();
        assert_relative_eq!(max.x - min.x, DEFAULT_PLACEHOLDER_EDGE, epsilon = 1e-6);
    }
}
