//! Mesh anchors delivered by the host AR layer
//!
//! An anchor is a fragment of reconstructed surface with a stable identity.
//! The [`AnchorSet`] keeps at most one live anchor per identity.

use crate::mesh::TriangleMesh;
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Stable identity of a mesh anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub Uuid);

impl AnchorId {
    /// Generate a random identity
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for AnchorId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A mesh fragment in anchor-local space plus its anchor-to-world pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshAnchor {
    pub id: AnchorId,
    pub transform: Transform3D,
    pub geometry: TriangleMesh,
}

impl MeshAnchor {
    pub fn new(id: AnchorId, transform: Transform3D, geometry: TriangleMesh) -> Self {
        Self { id, transform, geometry }
    }

    /// Geometry transformed into world space
    pub fn world_geometry(&self) -> TriangleMesh {
        let mut mesh = self.geometry.clone();
        mesh.transform(&self.transform);
        mesh
    }
}

/// What an [`AnchorSet`] mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorChange {
    Inserted,
    Replaced,
    Removed,
    Unchanged,
}

/// The live set of mesh anchors, keyed by identity.
///
/// Iteration order is by identity, so exports are reproducible regardless of
/// the order in which the host delivered updates.
#[derive(Debug, Clone, Default)]
pub struct AnchorSet {
    anchors: BTreeMap<AnchorId, MeshAnchor>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn contains(&self, id: &AnchorId) -> bool {
        self.anchors.contains_key(id)
    }

    pub fn get(&self, id: &AnchorId) -> Option<&MeshAnchor> {
        self.anchors.get(id)
    }

    /// Insert or replace an anchor by identity
    pub fn upsert(&mut self, anchor: MeshAnchor) -> AnchorChange {
        match self.anchors.insert(anchor.id, anchor) {
            Some(_) => AnchorChange::Replaced,
            None => AnchorChange::Inserted,
        }
    }

    /// Remove an anchor; unknown identities are ignored
    pub fn remove(&mut self, id: &AnchorId) -> AnchorChange {
        match self.anchors.remove(id) {
            Some(_) => AnchorChange::Removed,
            None => AnchorChange::Unchanged,
        }
    }

    pub fn clear(&mut self) {
        self.anchors.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeshAnchor> {
        self.anchors.values()
    }

    /// Owned copies of all anchors, in identity order
    pub fn snapshot(&self) -> Vec<MeshAnchor> {
        self.anchors.values().cloned().collect()
    }

    /// Total number of triangles across all anchors
    pub fn face_count(&self) -> usize {
        self.anchors.values().map(|a| a.geometry.face_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point3f;

    fn anchor(id: AnchorId, edge: f32) -> MeshAnchor {
        MeshAnchor::new(id, Transform3D::identity(), TriangleMesh::cuboid(Point3f::origin(), edge))
    }

    #[test]
    fn test_upsert_keeps_identity_unique() {
        let mut set = AnchorSet::new();
        let id = AnchorId::new_v4();

        assert_eq!(set.upsert(anchor(id, 1.0)), AnchorChange::Inserted);
        assert_eq!(set.upsert(anchor(id, 2.0)), AnchorChange::Replaced);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&id).unwrap().geometry.vertices[6].x, 1.0);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut set = AnchorSet::new();
        set.upsert(anchor(AnchorId::new_v4(), 1.0));

        assert_eq!(set.remove(&AnchorId::new_v4()), AnchorChange::Unchanged);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_snapshot_in_identity_order() {
        let mut set = AnchorSet::new();
        let a = AnchorId(Uuid::from_u128(2));
        let b = AnchorId(Uuid::from_u128(1));
        set.upsert(anchor(a, 1.0));
        set.upsert(anchor(b, 1.0));

        let ids: Vec<_> = set.snapshot().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(set.face_count(), 24);
    }
}
