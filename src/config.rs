//! YAML configuration file support.
//!
//! One file configures every layer of an [`crate::EngineContext`]. Every
//! section and field is optional and falls back to its default.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "front door"
//!
//! device:
//!   capture_timeout_secs: 10
//!
//! template:
//!   max_payload_bytes: 1024
//!
//! matcher:
//!   version: 1
//!   distance_tolerance: 8
//!   angle_tolerance: 16
//!   verify_level: 40
//!   min_minutiae: 8
//!
//! index:
//!   quality:
//!     enroll: 50
//!     verify: 30
//!     identify: 30
//!   compression:
//!     codec: zstd
//!     level: 3
//!   use_parallel: false
//!   identify_level: 40
//! ```

use std::fs;
use std::path::Path;

use index::IndexConfig;
use matcher::MatcherConfig;
use serde::{Deserialize, Serialize};
use template::DEFAULT_MAX_PAYLOAD_BYTES;
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration of an engine context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct BspConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub device: DeviceYamlConfig,

    #[serde(default)]
    pub template: TemplateYamlConfig,

    #[serde(default)]
    pub matcher: MatcherConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

impl BspConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: BspConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.device.validate()?;
        self.matcher
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        self.index
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        Ok(())
    }
}

impl Default for BspConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            device: DeviceYamlConfig::default(),
            template: TemplateYamlConfig::default(),
            matcher: MatcherConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

/// Capture settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceYamlConfig {
    /// Seconds a capture waits for a finger.
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,
}

impl DeviceYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.capture_timeout_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "device.capture_timeout_secs must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for DeviceYamlConfig {
    fn default() -> Self {
        Self {
            capture_timeout_secs: default_capture_timeout(),
        }
    }
}

/// Template store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateYamlConfig {
    /// Largest payload accepted by template creation.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for TemplateYamlConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_capture_timeout() -> u64 {
    10
}
fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::CompressionCodec;
    use matcher::SecurityLevel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_yaml() {
        let config = BspConfig::from_yaml("version: \"1.0\"\n").unwrap();
        assert_eq!(config, BspConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1.0"
name: "lab bench"
device:
  capture_timeout_secs: 3
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = BspConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.name.as_deref(), Some("lab bench"));
        assert_eq!(config.device.capture_timeout_secs, 3);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
version: "1"
template:
  max_payload_bytes: 64
matcher:
  distance_tolerance: 6
  verify_level: 60
index:
  quality:
    enroll: 70
  compression:
    codec: none
  use_parallel: true
  identify_level: 25
"#;

        let config = BspConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.template.max_payload_bytes, 64);
        assert_eq!(config.matcher.distance_tolerance, 6);
        assert_eq!(config.matcher.angle_tolerance, 16);
        assert_eq!(config.matcher.verify_level, SecurityLevel::HIGH);
        assert_eq!(config.index.quality.enroll, 70);
        assert_eq!(config.index.quality.verify, 30);
        assert_eq!(config.index.compression.codec, CompressionCodec::None);
        assert_eq!(config.index.compression.level, 3);
        assert!(config.index.use_parallel);
        assert_eq!(config.index.identify_level.value(), 25);
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = BspConfig::default();
        config.name = Some("round trip".into());
        config.index.use_parallel = true;
        let yaml = config.to_yaml().unwrap();
        assert_eq!(BspConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_unsupported_version() {
        let err = BspConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_out_of_range_security_level() {
        let yaml = r#"
version: "1.0"
matcher:
  verify_level: 120
"#;
        assert!(matches!(
            BspConfig::from_yaml(yaml),
            Err(ConfigLoadError::YamlParse(_))
        ));
    }

    #[test]
    fn test_validation_errors() {
        let yaml = r#"
version: "1.0"
device:
  capture_timeout_secs: 0
"#;
        let err = BspConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("capture_timeout_secs"));

        let yaml = r#"
version: "1.0"
matcher:
  min_minutiae: 0
"#;
        let err = BspConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("min_minutiae"));
    }
}
