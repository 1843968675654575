//! Core traits for lidarscan

use crate::{mesh::*, point::*, point_cloud::*};

/// Trait for geometry with an axis-aligned extent
pub trait Bounded {
    /// Get the bounding box of the object, `None` when it has no points
    fn bounding_box(&self) -> Option<(Point3f, Point3f)>;

    /// Get the center point of the object
    fn center(&self) -> Option<Point3f> {
        self.bounding_box().map(|(min, max)| nalgebra::center(&min, &max))
    }
}

fn bounds_of<'a, I: IntoIterator<Item = &'a Point3f>>(points: I) -> Option<(Point3f, Point3f)> {
    let mut iter = points.into_iter();
    let first = *iter.next()?;
    let mut min = first;
    let mut max = first;

    for p in iter {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        min.z = min.z.min(p.z);

        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        max.z = max.z.max(p.z);
    }

    Some((min, max))
}

impl Bounded for [ScanPoint] {
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        bounds_of(self.iter().map(|p| &p.position))
    }
}

impl Bounded for PointCloud {
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        self.as_slice().bounding_box()
    }
}

impl Bounded for CloudSnapshot {
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        self.as_slice().bounding_box()
    }
}

impl Bounded for TriangleMesh {
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        bounds_of(&self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_bounds() {
        assert!(PointCloud::new().bounding_box().is_none());
        assert!(TriangleMesh::new().center().is_none());
    }

    #[test]
    fn test_cloud_center() {
        let mut cloud = PointCloud::new();
        cloud.append(ScanPoint::new(Point3f::new(-1.0, 0.0, 2.0)));
        cloud.append(ScanPoint::new(Point3f::new(1.0, 2.0, 4.0)));
        assert_eq!(cloud.center(), Some(Point3f::new(0.0, 1.0, 3.0)));
    }
}
