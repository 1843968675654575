//! Model file I/O for lidarscan
//!
//! This crate writes exported scans to disk (binary glTF, Wavefront OBJ, and
//! PLY point clouds) and manages the directory of stored model files.

pub mod format;
pub mod glb;
pub mod obj;
pub mod ply;
pub mod registry;
pub mod store;

pub use format::*;
pub use glb::GlbWriter;
pub use obj::ObjWriter;
pub use ply::PlyWriter;
pub use registry::{ModelWriter, WriterRegistry};
pub use store::ModelStore;

use lidarscan_core::{Error, Result, TriangleMesh};
use std::path::Path;

/// Auto-detect format from the extension and write a mesh
pub fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match ModelFormat::from_path(path) {
        Some(ModelFormat::Glb) => GlbWriter.write_model(mesh, path),
        Some(ModelFormat::Obj) => ObjWriter.write_model(mesh, path),
        Some(ModelFormat::Usdz) => Err(Error::Unsupported(
            "usdz export requires a host-provided writer".to_string(),
        )),
        None => Err(Error::UnsupportedFormat(format!(
            "Unsupported mesh format: {:?}",
            path.extension()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidarscan_core::Point3f;

    #[test]
    fn test_write_mesh_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = TriangleMesh::cuboid(Point3f::origin(), 1.0);

        write_mesh(&mesh, dir.path().join("box.obj")).unwrap();
        write_mesh(&mesh, dir.path().join("box.glb")).unwrap();
        assert!(dir.path().join("box.obj").exists());
        assert!(dir.path().join("box.glb").exists());

        assert!(matches!(
            write_mesh(&mesh, dir.path().join("box.usdz")),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            write_mesh(&mesh, dir.path().join("box.stl")),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
