use serde::{Deserialize, Serialize};
use template::{DecodeError, Minutia, Purpose, TemplateError, TemplateForm};
use thiserror::Error;

use std::fmt;

/// Match strictness on the `0..=100` score scale; higher is stricter.
///
/// A score *clears* a level when it is non-zero and at least the level, so
/// even [`SecurityLevel::MIN`] never accepts a score of zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    pub const MIN: SecurityLevel = SecurityLevel(0);
    pub const LOWEST: SecurityLevel = SecurityLevel(1);
    pub const NORMAL: SecurityLevel = SecurityLevel(40);
    pub const HIGH: SecurityLevel = SecurityLevel(60);
    pub const HIGHEST: SecurityLevel = SecurityLevel(100);

    pub fn new(level: u8) -> Result<Self, MatchError> {
        if level > 100 {
            return Err(MatchError::InvalidSecurityLevel(level));
        }
        Ok(Self(level))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether `score` is accepted at this level.
    #[inline]
    pub fn clears(self, score: u8) -> bool {
        score > 0 && score >= self.0
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::NORMAL
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = MatchError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SecurityLevel::new(value)
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Feature representation stored in the search index.
///
/// Produced by [`crate::Matcher::extract`] and only ever consumed by the same
/// matcher, so its contents are meaningful to that matcher alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleInfo {
    /// Feature points in canonical (sorted) order.
    pub minutiae: Vec<Minutia>,
    pub quality: u8,
    pub purpose: Purpose,
}

impl SampleInfo {
    pub fn len(&self) -> usize {
        self.minutiae.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minutiae.is_empty()
    }
}

/// Outcome of a 1:1 comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    pub matched: bool,
    /// Similarity on the `0..=100` scale.
    pub score: u8,
    /// Payload bound into the stored template; empty unless `matched`.
    pub payload: Vec<u8>,
}

/// Tuning knobs for [`crate::MinutiaeMatcher`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Configuration schema version.
    #[serde(default = "MatcherConfig::default_version")]
    pub version: u32,
    /// Maximum pixel distance between two paired feature points.
    #[serde(default = "MatcherConfig::default_distance_tolerance")]
    pub distance_tolerance: u16,
    /// Maximum direction difference between two paired feature points,
    /// 256 units per full turn.
    #[serde(default = "MatcherConfig::default_angle_tolerance")]
    pub angle_tolerance: u8,
    /// Level a 1:1 verify must clear.
    #[serde(default)]
    pub verify_level: SecurityLevel,
    /// Fewest feature points a sample needs to enter the search index.
    #[serde(default = "MatcherConfig::default_min_minutiae")]
    pub min_minutiae: usize,
}

impl MatcherConfig {
    pub(crate) fn default_version() -> u32 {
        1
    }

    pub(crate) fn default_distance_tolerance() -> u16 {
        8
    }

    pub(crate) fn default_angle_tolerance() -> u8 {
        16
    }

    pub(crate) fn default_min_minutiae() -> usize {
        8
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_distance_tolerance(mut self, pixels: u16) -> Self {
        self.distance_tolerance = pixels;
        self
    }

    pub fn with_angle_tolerance(mut self, angle: u8) -> Self {
        self.angle_tolerance = angle;
        self
    }

    pub fn with_verify_level(mut self, level: SecurityLevel) -> Self {
        self.verify_level = level;
        self
    }

    pub fn with_min_minutiae(mut self, min: usize) -> Self {
        self.min_minutiae = min;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.version == 0 {
            return Err(MatchError::InvalidConfig(
                "matcher version must be >= 1".into(),
            ));
        }
        if self.distance_tolerance == 0 {
            return Err(MatchError::InvalidConfig(
                "distance_tolerance must be greater than zero".into(),
            ));
        }
        if self.angle_tolerance > 128 {
            return Err(MatchError::InvalidConfig(
                "angle_tolerance cannot exceed half a turn (128)".into(),
            ));
        }
        if self.min_minutiae == 0 {
            return Err(MatchError::InvalidConfig(
                "min_minutiae must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            version: Self::default_version(),
            distance_tolerance: Self::default_distance_tolerance(),
            angle_tolerance: Self::default_angle_tolerance(),
            verify_level: SecurityLevel::default(),
            min_minutiae: Self::default_min_minutiae(),
        }
    }
}

/// Errors that can occur while comparing templates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MatchError {
    #[error("invalid template handle: {0}")]
    InvalidHandle(String),
    #[error("invalid template data: {0}")]
    InvalidData(String),
    #[error("template data is encrypted")]
    EncryptedData,
    #[error("template checksum failure: {0}")]
    ChecksumFailure(String),
    #[error("template holds raw data and must be processed before matching")]
    RequiresProcessedData,
    #[error("cannot compare a {left} template with a {right} template")]
    UnsupportedFormMismatch {
        left: TemplateForm,
        right: TemplateForm,
    },
    #[error("security level {0} is outside 0..=100")]
    InvalidSecurityLevel(u8),
    #[error("invalid matcher configuration: {0}")]
    InvalidConfig(String),
    #[error("matcher failure: {0}")]
    Unknown(String),
}

impl From<DecodeError> for MatchError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::ChecksumMismatch { .. } => MatchError::ChecksumFailure(err.to_string()),
            DecodeError::Encrypted => MatchError::EncryptedData,
            other => MatchError::InvalidData(other.to_string()),
        }
    }
}

impl From<TemplateError> for MatchError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::StaleHandle(handle) => MatchError::InvalidHandle(handle.to_string()),
            TemplateError::Decode(decode) => decode.into(),
            other => MatchError::Unknown(other.to_string()),
        }
    }
}
