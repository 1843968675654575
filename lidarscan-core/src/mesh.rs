//! Mesh data structures and functionality

use crate::point::*;
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices and faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
    pub colors: Option<Vec<[u8; 3]>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
            colors: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
            colors: None,
        }
    }

    /// Axis-aligned box centred on `center` with the given edge length.
    ///
    /// Eight shared vertices, twelve outward-facing triangles.
    pub fn cuboid(center: Point3f, edge: f32) -> Self {
        let h = edge * 0.5;
        let vertices = [
            (-h, -h, -h),
            (h, -h, -h),
            (h, h, -h),
            (-h, h, -h),
            (-h, -h, h),
            (h, -h, h),
            (h, h, h),
            (-h, h, h),
        ]
        .iter()
        .map(|&(x, y, z)| Point3f::new(center.x + x, center.y + y, center.z + z))
        .collect();

        let faces = vec![
            // -z
            [0, 2, 1],
            [0, 3, 2],
            // +z
            [4, 5, 6],
            [4, 6, 7],
            // -y
            [0, 1, 5],
            [0, 5, 4],
            // +y
            [3, 7, 6],
            [3, 6, 2],
            // -x
            [0, 4, 7],
            [0, 7, 3],
            // +x
            [1, 2, 6],
            [1, 6, 5],
        ];

        Self::from_vertices_and_faces(vertices, faces)
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Check that every face references an existing vertex
    pub fn has_valid_indices(&self) -> bool {
        let n = self.vertices.len();
        self.faces.iter().all(|f| f.iter().all(|&i| i < n))
    }

    /// Calculate face normals
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let edge1 = v1 - v0;
                let edge2 = v2 - v0;

                edge1.cross(&edge2).try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Area-weighted vertex normals accumulated from adjacent faces
    pub fn calculate_vertex_normals(&self) -> Vec<Vector3f> {
        let mut normals = vec![Vector3f::zeros(); self.vertices.len()];
        for face in &self.faces {
            let v0 = self.vertices[face[0]];
            let weighted = (self.vertices[face[1]] - v0).cross(&(self.vertices[face[2]] - v0));
            for &i in face {
                normals[i] += weighted;
            }
        }
        normals
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(|| Vector3f::new(0.0, 0.0, 1.0)))
            .collect()
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Set vertex colors
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) {
        if colors.len() == self.vertices.len() {
            self.colors = Some(colors);
        }
    }

    /// Apply a transformation to vertices and normals in place
    pub fn transform(&mut self, transform: &Transform3D) {
        for vertex in &mut self.vertices {
            *vertex = transform.transform_point(vertex);
        }
        if let Some(normals) = &mut self.normals {
            for normal in normals.iter_mut() {
                *normal = transform
                    .transform_vector(normal)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or(*normal);
            }
        }
    }

    /// Append another mesh, re-indexing its faces.
    ///
    /// Per-vertex attributes survive only if both meshes carry them.
    pub fn append(&mut self, other: &TriangleMesh) {
        let had_vertices = !self.vertices.is_empty();
        let offset = self.vertices.len();

        self.normals = match (self.normals.take(), &other.normals) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                Some(mine)
            }
            (None, Some(theirs)) if !had_vertices => Some(theirs.clone()),
            _ => None,
        };
        self.colors = match (self.colors.take(), &other.colors) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                Some(mine)
            }
            (None, Some(theirs)) if !had_vertices => Some(theirs.clone()),
            _ => None,
        };

        self.vertices.extend_from_slice(&other.vertices);
        self.faces
            .extend(other.faces.iter().map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]));
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
        self.normals = None;
        self.colors = None;
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_cuboid_is_closed_and_outward() {
        let mesh = TriangleMesh::cuboid(Point3f::new(1.0, 1.0, 1.0), 2.0);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        assert!(mesh.has_valid_indices());

        let center = Point3f::new(1.0, 1.0, 1.0);
        for (face, normal) in mesh.faces.iter().zip(mesh.calculate_face_normals()) {
            let face_center = (mesh.vertices[face[0]].coords
                + mesh.vertices[face[1]].coords
                + mesh.vertices[face[2]].coords)
                / 3.0;
            assert!(normal.dot(&(face_center - center.coords)) > 0.0);
        }
    }

    #[test]
    fn test_append_reindexes_faces() {
        let mut mesh = triangle();
        mesh.append(&triangle());

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.faces[1], [3, 4, 5]);
        assert!(mesh.has_valid_indices());
    }

    #[test]
    fn test_append_drops_partial_attributes() {
        let mut mesh = triangle();
        let mut with_colors = triangle();
        with_colors.set_colors(vec![[255, 0, 0]; 3]);

        mesh.append(&with_colors);
        assert!(mesh.colors.is_none());

        let mut empty = TriangleMesh::new();
        empty.append(&with_colors);
        assert_eq!(empty.colors.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_transform_translates_vertices() {
        let mut mesh = triangle();
        mesh.transform(&Transform3D::translation(Vector3::new(0.0, 0.0, 2.0)));
        assert_relative_eq!(mesh.vertices[1].z, 2.0);
        assert_relative_eq!(mesh.vertices[1].x, 1.0);
    }

    #[test]
    fn test_vertex_normals_of_flat_triangle() {
        let normals = triangle().calculate_vertex_normals();
        for n in normals {
            assert_relative_eq!(n.z, 1.0, epsilon = 1e-6);
        }
    }
}
