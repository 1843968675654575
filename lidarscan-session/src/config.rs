//! Scanner configuration loaded from YAML

use crate::error::ConfigLoadError;
use crate::host::HostUnavailablePolicy;
use lidarscan_capture::{QualityWeights, SamplerConfig};
use lidarscan_core::CloudLimits;
use lidarscan_reconstruction::ExportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location searched by [`ScannerConfig::load_default`]
pub const DEFAULT_CONFIG_PATH: &str = "configs/scanner.yaml";

/// Full scanner configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ScannerConfig {
    /// Depth sampling
    #[serde(default)]
    pub capture: SamplerConfig,

    /// Point cloud capacity and progress target
    #[serde(default)]
    pub cloud: CloudLimits,

    /// Scan quality blend
    #[serde(default)]
    pub quality: QualityWeights,

    /// Model export
    #[serde(default)]
    pub export: ExportConfig,

    /// Behaviour when the AR session cannot start
    #[serde(default)]
    pub host_unavailable: HostUnavailablePolicy,
}

impl ScannerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Load from [`DEFAULT_CONFIG_PATH`], or defaults when it does not exist
    pub fn load_default() -> Result<Self, ConfigLoadError> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigLoadError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        serde_yaml::to_string(self).map_err(|e| ConfigLoadError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.cloud
            .validate()
            .map_err(|e| ConfigLoadError::Invalid(e.to_string()))?;
        self.export
            .validate()
            .map_err(|e| ConfigLoadError::Invalid(e.to_string()))?;

        if self.capture.grid_stride == 0 {
            return Err(ConfigLoadError::Invalid("capture.grid_stride must be at least 1".into()));
        }
        if !(self.capture.max_range.is_finite() && self.capture.max_range > 0.0) {
            return Err(ConfigLoadError::Invalid(format!(
                "capture.max_range must be positive, got {}",
                self.capture.max_range
            )));
        }
        if !(0.0..=1.0).contains(&self.capture.min_confidence) {
            return Err(ConfigLoadError::Invalid(format!(
                "capture.min_confidence must be in [0, 1], got {}",
                self.capture.min_confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidarscan_io::ModelFormat;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.capture.grid_stride, 10);
        assert_eq!(config.capture.max_range, 5.0);
        assert_eq!(config.cloud.capacity, 10_000);
        assert_eq!(config.cloud.target_count, 5_000);
        assert_eq!(config.export.default_format, ModelFormat::Glb);
        assert_eq!(config.host_unavailable, HostUnavailablePolicy::Fail);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
capture:
  grid_stride: 4
cloud:
  capacity: 2000
  target_count: 500
export:
  output_dir: /tmp/scans
  default_format: obj
  write_point_cloud_sidecar: true
host_unavailable: simulate
"#;
        let config = ScannerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.capture.grid_stride, 4);
        assert_eq!(config.capture.max_range, 5.0);
        assert_eq!(config.cloud.capacity, 2000);
        assert_eq!(config.export.output_dir, PathBuf::from("/tmp/scans"));
        assert_eq!(config.export.default_format, ModelFormat::Obj);
        assert!(config.export.write_point_cloud_sidecar);
        assert_eq!(config.export.placeholder_edge, 0.1);
        assert_eq!(config.host_unavailable, HostUnavailablePolicy::Simulate);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ScannerConfig::from_yaml("{}").unwrap(), ScannerConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        let too_small = "cloud:\n  capacity: 100\n  target_count: 500\n";
        assert!(matches!(ScannerConfig::from_yaml(too_small), Err(ConfigLoadError::Invalid(_))));

        assert!(matches!(
            ScannerConfig::from_yaml("capture:\n  grid_stride: 0\n"),
            Err(ConfigLoadError::Invalid(_))
        ));
        assert!(matches!(
            ScannerConfig::from_yaml("capture: [1, 2"),
            Err(ConfigLoadError::Parse(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.yaml");
        let mut config = ScannerConfig::default();
        config.capture.max_samples_per_frame = Some(64);
        std::fs::write(&path, config.to_yaml().unwrap()).unwrap();

        assert_eq!(ScannerConfig::load(&path).unwrap(), config);
        assert!(matches!(
            ScannerConfig::load(&dir.path().join("missing.yaml")),
            Err(ConfigLoadError::Io(_))
        ));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(DEFAULT_CONFIG_PATH);
        assert_eq!(ScannerConfig::load(&path).unwrap(), ScannerConfig::default());
    }
}
