//! Directory of exported model files

use crate::format::{is_model_file, ModelFormat};
use lidarscan_core::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Model files stored under a single root directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// List model files in the root, sorted by path
    ///
    /// A missing root is an empty store.
    pub fn try_list_models(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut models = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_model_file(&path) {
                models.push(path);
            }
        }
        models.sort();
        Ok(models)
    }

    /// Like [`try_list_models`](Self::try_list_models), but failures yield an empty list
    pub fn list_models(&self) -> Vec<PathBuf> {
        self.try_list_models().unwrap_or_else(|e| {
            warn!(root = %self.root.display(), error = %e, "failed to list models");
            Vec::new()
        })
    }

    /// Delete a model file inside the root
    ///
    /// Returns `Ok(false)` for paths outside the root, non-model files, and
    /// files that do not exist.
    pub fn try_delete_model<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let path = path.as_ref();
        if !is_model_file(path) || !path.is_file() {
            return Ok(false);
        }

        let root = match self.root.canonicalize() {
            Ok(root) => root,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let target = path.canonicalize()?;
        if target.parent() != Some(root.as_path()) {
            debug!(path = %path.display(), "refusing to delete file outside the model store");
            return Ok(false);
        }

        fs::remove_file(&target)?;
        debug!(path = %target.display(), "deleted model");
        Ok(true)
    }

    pub fn delete_model<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        self.try_delete_model(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "failed to delete model");
            false
        })
    }

    /// First free path `<root>/<stem>.<ext>`, then `<stem>_1.<ext>`, `<stem>_2.<ext>`, ...
    pub fn unique_path(&self, stem: &str, format: ModelFormat) -> PathBuf {
        self.unique_path_with_extension(stem, format.extension())
    }

    pub fn unique_path_with_extension(&self, stem: &str, extension: &str) -> PathBuf {
        let candidate = self.root.join(format!("{stem}.{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        (1usize..)
            .map(|n| self.root.join(format!("{stem}_{n}.{extension}")))
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"model").unwrap();
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        touch(&dir.path().join("b.glb"));
        touch(&dir.path().join("a.usdz"));
        touch(&dir.path().join("c.OBJ"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("cloud.ply"));
        fs::create_dir(dir.path().join("folder.glb")).unwrap();

        let names: Vec<_> = store
            .list_models()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.usdz", "b.glb", "c.OBJ"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("missing"));
        assert!(store.try_list_models().unwrap().is_empty());
        assert!(!store.delete_model(dir.path().join("missing/a.glb")));
    }

    #[test]
    fn test_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        touch(&dir.path().join("scan.glb"));
        touch(&dir.path().join("keep.obj"));

        let listed = store.list_models();
        let target = listed.iter().find(|p| p.ends_with("scan.glb")).unwrap();
        assert!(store.delete_model(target));
        assert_eq!(store.list_models().len(), 1);
        assert!(!store.delete_model(target));
    }

    #[test]
    fn test_delete_outside_root_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let outside = other.path().join("x.glb");
        touch(&outside);
        let notes = root.path().join("notes.txt");
        touch(&notes);

        let store = ModelStore::new(root.path());
        assert!(!store.delete_model(&outside));
        assert!(!store.delete_model(&notes));
        assert!(outside.exists());
        assert!(notes.exists());
    }

    #[test]
    fn test_unique_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let first = store.unique_path("scan_20240101_120000", ModelFormat::Glb);
        assert!(first.ends_with("scan_20240101_120000.glb"));
        touch(&first);
        let second = store.unique_path("scan_20240101_120000", ModelFormat::Glb);
        assert!(second.ends_with("scan_20240101_120000_1.glb"));
        touch(&second);
        assert!(store
            .unique_path("scan_20240101_120000", ModelFormat::Glb)
            .ends_with("scan_20240101_120000_2.glb"));
    }
}
