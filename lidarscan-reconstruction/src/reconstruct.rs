//! Mesh reconstruction from captured scan data

use lidarscan_core::{CloudSnapshot, Error, MeshAnchor, Result, TriangleMesh};
use rayon::prelude::*;

/// Builds a single mesh from a scan's points and anchors
pub trait Reconstructor: Send + Sync {
    fn name(&self) -> &'static str;

    fn reconstruct(&self, points: &CloudSnapshot, anchors: &[MeshAnchor]) -> Result<TriangleMesh>;
}

/// Merges every anchor's mesh fragment into one world-space mesh
///
/// Fragments are transformed in parallel and concatenated in anchor order.
#[derive(Debug, Clone, Copy)]
pub struct AnchorMeshReconstructor {
    /// Recompute smooth vertex normals on the merged mesh
    pub compute_normals: bool,
}

impl Default for AnchorMeshReconstructor {
    fn default() -> Self {
        Self { compute_normals: true }
    }
}

impl Reconstructor for AnchorMeshReconstructor {
    fn name(&self) -> &'static str {
        "anchor-merge"
    }

    fn reconstruct(&self, _points: &CloudSnapshot, anchors: &[MeshAnchor]) -> Result<TriangleMesh> {
        if anchors.is_empty() {
            return Err(Error::Algorithm("no mesh anchors to reconstruct".to_string()));
        }

        let fragments: Vec<TriangleMesh> = anchors
            .par_iter()
            .filter(|anchor| !anchor.geometry.is_empty())
            .map(MeshAnchor::world_geometry)
            .collect();

        if let Some(bad) = fragments.iter().position(|f| !f.has_valid_indices()) {
            return Err(Error::InvalidData(format!(
                "anchor fragment {bad} references a missing vertex"
            )));
        }

        let mut merged = TriangleMesh::new();
        for fragment in &fragments {
            merged.append(fragment);
        }

        if merged.is_empty() {
            return Err(Error::Algorithm("mesh anchors carry no geometry".to_string()));
        }

        if self.compute_normals {
            let normals = merged.calculate_vertex_normals();
            merged.set_normals(normals);
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lidarscan_core::{AnchorId, Point3f, Transform3D, Vector3f};

    fn anchor_at(x: f32) -> MeshAnchor {
        MeshAnchor::new(
            AnchorId::new_v4(),
            Transform3D::translation(Vector3f::new(x, 0.0, 0.0)),
            TriangleMesh::cuboid(Point3f::origin(), 1.0),
        )
    }

    #[test]
    fn test_merge_anchors() {
        let anchors = vec![anchor_at(0.0), anchor_at(5.0)];
        let mesh = AnchorMeshReconstructor::default()
            .reconstruct(&CloudSnapshot::default(), &anchors)
            .unwrap();

        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.face_count(), 24);
        assert!(mesh.has_valid_indices());
        assert_eq!(mesh.normals.as_ref().map(|n| n.len()), Some(16));

        let max_x = mesh.vertices.iter().map(|v| v.x).fold(f32::MIN, f32::max);
        assert_relative_eq!(max_x, 5.5);
    }

    #[test]
    fn test_no_anchors_is_an_error() {
        let result = AnchorMeshReconstructor::default().reconstruct(&CloudSnapshot::default(), &[]);
        assert!(matches!(result, Err(Error::Algorithm(_))));
    }

    #[test]
    fn test_empty_fragments_are_skipped() {
        let empty = MeshAnchor::new(AnchorId::new_v4(), Transform3D::identity(), TriangleMesh::new());
        let result = AnchorMeshReconstructor::default()
            .reconstruct(&CloudSnapshot::default(), &[empty.clone()]);
        assert!(result.is_err());

        let mesh = AnchorMeshReconstructor { compute_normals: false }
            .reconstruct(&CloudSnapshot::default(), &[empty, anchor_at(1.0)])
            .unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert!(mesh.normals.is_none());
    }
}
