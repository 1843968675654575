//! Model container formats

use lidarscan_core::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// File extensions recognised as stored models
pub const MODEL_EXTENSIONS: [&str; 4] = ["glb", "gltf", "obj", "usdz"];

/// Container format of an exported model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Glb,
    Usdz,
    Obj,
}

impl ModelFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ModelFormat::Glb => "glb",
            ModelFormat::Usdz => "usdz",
            ModelFormat::Obj => "obj",
        }
    }

    /// Format implied by a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl Default for ModelFormat {
    fn default() -> Self {
        ModelFormat::Glb
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ModelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "glb" => Ok(ModelFormat::Glb),
            "usdz" => Ok(ModelFormat::Usdz),
            "obj" => Ok(ModelFormat::Obj),
            other => Err(Error::UnsupportedFormat(format!("Unknown model format: {other}"))),
        }
    }
}

/// Whether a path has one of [`MODEL_EXTENSIONS`]
pub fn is_model_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MODEL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
