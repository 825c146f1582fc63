//! Error types produced by the template crate.

use thiserror::Error;

use crate::TemplateHandle;

/// Failure to decode a text-form template.
///
/// Each variant maps onto a distinct matcher error so callers can tell a
/// corrupted string apart from one produced by an incompatible engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The string is not a well-formed text template.
    #[error("malformed text template: {0}")]
    Malformed(String),
    /// The string carries a format version this engine does not understand.
    #[error("unsupported text template version: {0}")]
    UnsupportedVersion(String),
    /// The frame checksum does not match its contents.
    #[error("text template checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },
    /// The body is vendor-encrypted and cannot be read here.
    #[error("text template body is encrypted")]
    Encrypted,
}

/// Errors raised by the session-scoped template store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateError {
    /// A template could not be created from the given handle or payload.
    #[error("template creation failed: {0}")]
    CreationFailed(String),
    /// The handle was released or belongs to another session.
    #[error("stale template handle {0}")]
    StaleHandle(TemplateHandle),
    /// A text template could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A record could not be serialized into text form.
    #[error("template encoding failed: {0}")]
    Encode(String),
}
