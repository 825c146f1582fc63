//! Biometric record types shared by every layer of the engine.
//!
//! A [`FirRecord`] is the decoded content of one fingerprint identification
//! record: the minutiae the sensor extracted, the capture purpose and
//! quality, and an optional caller payload that travels with the template.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::codec::TextTemplate;

/// Why a sample was captured.
///
/// The purpose is stored inside the record and selects the quality gate the
/// search engine applies on insert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Purpose {
    /// One-off capture compared against a stored template.
    #[default]
    Verify = 0x01,
    /// Capture used as a 1:N search probe.
    Identify = 0x02,
    /// Capture destined for enrollment into the search index.
    Enroll = 0x03,
}

impl Purpose {
    /// Numeric code as used by capture drivers.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a driver purpose code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Purpose::Verify),
            0x02 => Some(Purpose::Identify),
            0x03 => Some(Purpose::Enroll),
            _ => None,
        }
    }
}

/// Processing stage of a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FirDataType {
    /// Unfiltered feature points straight from the sensor.
    Raw,
    /// Feature points ready for matching.
    #[default]
    Processed,
}

/// Ridge feature class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MinutiaKind {
    Ending,
    Bifurcation,
}

/// One ridge feature point. Ordered by position, then direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Minutia {
    /// Column in image pixels.
    pub x: u16,
    /// Row in image pixels.
    pub y: u16,
    /// Ridge direction, 256 units per full turn.
    pub angle: u8,
    pub kind: MinutiaKind,
}

impl Minutia {
    pub fn new(x: u16, y: u16, angle: u8, kind: MinutiaKind) -> Self {
        Self { x, y, angle, kind }
    }

    /// Squared euclidean distance to `other` in pixels.
    #[inline]
    pub fn distance_sq(&self, other: &Minutia) -> u32 {
        let dx = u32::from(self.x.abs_diff(other.x));
        let dy = u32::from(self.y.abs_diff(other.y));
        dx * dx + dy * dy
    }

    /// Smallest angular difference to `other`, wrapping at a full turn.
    #[inline]
    pub fn angle_diff(&self, other: &Minutia) -> u8 {
        let d = self.angle.wrapping_sub(other.angle);
        d.min(d.wrapping_neg())
    }
}

/// Decoded fingerprint identification record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirRecord {
    pub data_type: FirDataType,
    pub purpose: Purpose,
    /// Capture quality in `0..=100`.
    pub quality: u8,
    /// Width of the source image in pixels.
    pub width: u16,
    /// Height of the source image in pixels.
    pub height: u16,
    pub minutiae: Vec<Minutia>,
    /// Caller payload bound into the template, returned by a successful verify.
    pub payload: Option<Vec<u8>>,
}

impl FirRecord {
    /// Build a processed record without payload.
    pub fn processed(
        purpose: Purpose,
        quality: u8,
        width: u16,
        height: u16,
        minutiae: Vec<Minutia>,
    ) -> Self {
        Self {
            data_type: FirDataType::Processed,
            purpose,
            quality: quality.min(100),
            width,
            height,
            minutiae,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = if payload.is_empty() {
            None
        } else {
            Some(payload)
        };
        self
    }

    pub fn is_processed(&self) -> bool {
        self.data_type == FirDataType::Processed
    }
}

/// Identifier of one opened device session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque in-process template reference, valid only inside the session that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateHandle {
    pub(crate) session: SessionId,
    pub(crate) id: u64,
}

impl TemplateHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for TemplateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.id, self.session)
    }
}

/// Representational form of a [`Template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateForm {
    Handle,
    Text,
}

impl fmt::Display for TemplateForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateForm::Handle => f.write_str("handle"),
            TemplateForm::Text => f.write_str("text"),
        }
    }
}

/// A biometric template in one of its two interchangeable forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// Session-scoped handle; cheap, not persistable.
    Handle(TemplateHandle),
    /// Portable printable encoding.
    Text(TextTemplate),
}

impl Template {
    pub fn form(&self) -> TemplateForm {
        match self {
            Template::Handle(_) => TemplateForm::Handle,
            Template::Text(_) => TemplateForm::Text,
        }
    }
}

impl From<TemplateHandle> for Template {
    fn from(handle: TemplateHandle) -> Self {
        Template::Handle(handle)
    }
}

impl From<TextTemplate> for Template {
    fn from(text: TextTemplate) -> Self {
        Template::Text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_codes_round_trip() {
        for purpose in [Purpose::Verify, Purpose::Identify, Purpose::Enroll] {
            assert_eq!(Purpose::from_code(purpose.code()), Some(purpose));
        }
        assert_eq!(Purpose::from_code(0x09), None);
    }

    #[test]
    fn angle_diff_wraps_around_full_turn() {
        let a = Minutia::new(0, 0, 250, MinutiaKind::Ending);
        let b = Minutia::new(0, 0, 4, MinutiaKind::Ending);
        assert_eq!(a.angle_diff(&b), 10);
        assert_eq!(b.angle_diff(&a), 10);
    }

    #[test]
    fn empty_payload_binds_nothing() {
        let record =
            FirRecord::processed(Purpose::Enroll, 80, 10, 10, Vec::new()).with_payload(vec![]);
        assert!(record.payload.is_none());
    }

    #[test]
    fn quality_is_clamped() {
        let record = FirRecord::processed(Purpose::Verify, 250, 10, 10, Vec::new());
        assert_eq!(record.quality, 100);
    }
}
