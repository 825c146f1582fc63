use matcher::SecurityLevel;
use serde::{Deserialize, Serialize};
use template::Purpose;
use zstd::{decode_all, encode_all};

use crate::error::IndexError;

/// Compression codec for the database file body.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// Store the body as is (handy when inspecting files).
    None,
    /// Zstd compression (default).
    #[default]
    Zstd,
}

/// Compression behavior of [`crate::SearchEngine::save`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressionConfig {
    #[serde(default)]
    pub codec: CompressionCodec,
    /// Zstd level, 1 to 22.
    #[serde(default = "CompressionConfig::default_level")]
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: Self::default_level(),
        }
    }
}

impl CompressionConfig {
    fn default_level() -> i32 {
        3
    }

    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub(crate) fn compress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => encode_all(data, self.level).map_err(IndexError::io),
        }
    }

    pub(crate) fn decompress(codec: CompressionCodec, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => decode_all(data).map_err(IndexError::corrupted),
        }
    }
}

/// Minimum capture quality accepted on insert, per capture purpose.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityPolicy {
    #[serde(default = "QualityPolicy::default_enroll")]
    pub enroll: u8,
    #[serde(default = "QualityPolicy::default_verify")]
    pub verify: u8,
    #[serde(default = "QualityPolicy::default_identify")]
    pub identify: u8,
}

impl QualityPolicy {
    fn default_enroll() -> u8 {
        50
    }

    fn default_verify() -> u8 {
        30
    }

    fn default_identify() -> u8 {
        30
    }

    /// Accept everything, whatever the purpose.
    pub fn permissive() -> Self {
        Self {
            enroll: 0,
            verify: 0,
            identify: 0,
        }
    }

    pub fn required_for(&self, purpose: Purpose) -> u8 {
        match purpose {
            Purpose::Enroll => self.enroll,
            Purpose::Verify => self.verify,
            Purpose::Identify => self.identify,
        }
    }
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            enroll: Self::default_enroll(),
            verify: Self::default_verify(),
            identify: Self::default_identify(),
        }
    }
}

/// Config for a [`crate::SearchEngine`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    /// Insert quality gate.
    #[serde(default)]
    pub quality: QualityPolicy,
    /// Compression of saved database files.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Score users on the rayon pool during identify.
    #[serde(default)]
    pub use_parallel: bool,
    /// Level used by callers that do not pick one, such as
    /// capture-and-identify helpers.
    #[serde(default)]
    pub identify_level: SecurityLevel,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: QualityPolicy) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    pub fn with_identify_level(mut self, level: SecurityLevel) -> Self {
        self.identify_level = level;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        let q = &self.quality;
        if q.enroll > 100 || q.verify > 100 || q.identify > 100 {
            return Err(IndexError::InvalidConfig(
                "quality thresholds must be within 0..=100".into(),
            ));
        }
        if self.compression.codec == CompressionCodec::Zstd
            && !(1..=22).contains(&self.compression.level)
        {
            return Err(IndexError::InvalidConfig(format!(
                "zstd level {} outside 1..=22",
                self.compression.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_gate_follows_purpose() {
        let policy = QualityPolicy::default();
        assert_eq!(policy.required_for(Purpose::Enroll), 50);
        assert_eq!(policy.required_for(Purpose::Verify), 30);
        assert_eq!(QualityPolicy::permissive().required_for(Purpose::Enroll), 0);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(IndexConfig::new().validate().is_ok());

        let cfg = IndexConfig::new().with_quality(QualityPolicy {
            enroll: 101,
            ..QualityPolicy::default()
        });
        assert!(matches!(cfg.validate(), Err(IndexError::InvalidConfig(_))));

        let cfg = IndexConfig::new().with_compression(CompressionConfig::default().with_level(40));
        assert!(matches!(cfg.validate(), Err(IndexError::InvalidConfig(_))));

        let cfg = IndexConfig::new().with_compression(
            CompressionConfig::default()
                .with_codec(CompressionCodec::None)
                .with_level(40),
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zstd_round_trip() {
        let cfg = CompressionConfig::default();
        let data = vec![7u8; 4096];
        let packed = cfg.compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(
            CompressionConfig::decompress(CompressionCodec::Zstd, &packed).unwrap(),
            data
        );
    }
}
