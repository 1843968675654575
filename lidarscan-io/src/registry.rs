//! Writer registry for format-agnostic model export
//!
//! The session layer hands a mesh and a target format to the registry and
//! does not care which writer produces the bytes. Hosts can register extra
//! writers (for example a platform USDZ encoder) at runtime.

use crate::format::ModelFormat;
use crate::glb::GlbWriter;
use crate::obj::ObjWriter;
use lidarscan_core::{Error, Result, TriangleMesh};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Trait for writing meshes to model files
pub trait ModelWriter: Send + Sync {
    /// Write a mesh to the given path
    fn write_model(&self, mesh: &TriangleMesh, path: &Path) -> Result<()>;

    /// The format this writer produces
    fn format(&self) -> ModelFormat;
}

/// Registry mapping each model format to a writer
pub struct WriterRegistry {
    writers: HashMap<ModelFormat, Box<dyn ModelWriter>>,
}

impl WriterRegistry {
    /// Create a registry without any writers
    pub fn new() -> Self {
        Self {
            writers: HashMap::new(),
        }
    }

    /// Create a registry with the built-in GLB and OBJ writers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GlbWriter));
        registry.register(Box::new(ObjWriter));
        registry
    }

    /// Register a writer, replacing any previous writer for its format
    pub fn register(&mut self, writer: Box<dyn ModelWriter>) -> Option<Box<dyn ModelWriter>> {
        self.writers.insert(writer.format(), writer)
    }

    pub fn get(&self, format: ModelFormat) -> Option<&dyn ModelWriter> {
        self.writers.get(&format).map(|w| w.as_ref())
    }

    pub fn supports(&self, format: ModelFormat) -> bool {
        self.writers.contains_key(&format)
    }

    /// Formats with a registered writer, in a stable order
    pub fn supported_formats(&self) -> Vec<ModelFormat> {
        let mut formats: Vec<_> = self.writers.keys().copied().collect();
        formats.sort_by_key(|f| f.extension());
        formats
    }

    /// Write a mesh using the writer registered for `format`
    pub fn write(&self, mesh: &TriangleMesh, path: &Path, format: ModelFormat) -> Result<()> {
        match self.writers.get(&format) {
            Some(writer) => writer.write_model(mesh, path),
            None => Err(Error::UnsupportedFormat(format!(
                "No model writer registered for format: {}",
                format
            ))),
        }
    }
}

impl Default for WriterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for WriterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterRegistry")
            .field("formats", &self.supported_formats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidarscan_core::Point3f;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingWriter {
        calls: Arc<AtomicUsize>,
    }

    impl ModelWriter for CountingWriter {
        fn write_model(&self, _mesh: &TriangleMesh, path: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(path, b"usdz")?;
            Ok(())
        }

        fn format(&self) -> ModelFormat {
            ModelFormat::Usdz
        }
    }

    #[test]
    fn test_defaults() {
        let registry = WriterRegistry::with_defaults();
        assert!(registry.supports(ModelFormat::Glb));
        assert!(registry.supports(ModelFormat::Obj));
        assert!(!registry.supports(ModelFormat::Usdz));
        assert_eq!(registry.supported_formats(), vec![ModelFormat::Glb, ModelFormat::Obj]);
    }

    #[test]
    fn test_missing_writer() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = TriangleMesh::cuboid(Point3f::origin(), 1.0);
        let result = WriterRegistry::with_defaults().write(&mesh, &dir.path().join("a.usdz"), ModelFormat::Usdz);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_register_custom_writer() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = WriterRegistry::new();
        assert!(registry.register(Box::new(CountingWriter { calls: calls.clone() })).is_none());

        let path = dir.path().join("a.usdz");
        registry
            .write(&TriangleMesh::cuboid(Point3f::origin(), 1.0), &path, ModelFormat::Usdz)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(path.exists());
        assert_eq!(registry.get(ModelFormat::Usdz).map(|w| w.format()), Some(ModelFormat::Usdz));
    }
}
