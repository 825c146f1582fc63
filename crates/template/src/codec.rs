//! Portable text encoding for templates.
//!
//! Layout: `FIR1.` followed by the unpadded base64url form of a frame
//!
//! ```text
//! flags:u8 | body_len:u32le | body | crc32le(flags | body_len | body)
//! ```
//!
//! where `body` is the bincode (standard config) encoding of a
//! [`FirRecord`]. Decoding is strict: any string accepted by [`TextTemplate::decode`]
//! re-encodes to exactly the same bytes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DecodeError, TemplateError};
use crate::record::FirRecord;

/// Current text format version, embedded in the prefix.
pub const TEXT_FORMAT_VERSION: u8 = 1;

const PREFIX_TAG: &str = "FIR";
const FLAG_ENCRYPTED: u8 = 0b0000_0001;
const HEADER_LEN: usize = 1 + 4;
const CRC_LEN: usize = 4;

/// Text-form template: printable, persistable, process independent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextTemplate(String);

impl TextTemplate {
    /// Wrap a previously stored encoding. The contents are checked lazily,
    /// when the template is decoded.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encode a record into text form.
    pub fn encode(record: &FirRecord) -> Result<Self, TemplateError> {
        let body = encode_to_vec(record, standard())
            .map_err(|e| TemplateError::Encode(e.to_string()))?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| TemplateError::Encode("record body exceeds u32 length".into()))?;

        let mut frame = Vec::with_capacity(HEADER_LEN + body.len() + CRC_LEN);
        frame.push(0);
        frame.extend_from_slice(&body_len.to_le_bytes());
        frame.extend_from_slice(&body);
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let mut out = format!("{PREFIX_TAG}{TEXT_FORMAT_VERSION}.");
        URL_SAFE_NO_PAD.encode_string(&frame, &mut out);
        Ok(Self(out))
    }

    /// Decode the record carried by this template.
    pub fn decode(&self) -> Result<FirRecord, DecodeError> {
        let encoded = strip_prefix(&self.0)?;
        let frame = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| DecodeError::Malformed(format!("invalid base64: {e}")))?;

        if frame.len() < HEADER_LEN + CRC_LEN {
            return Err(DecodeError::Malformed(format!(
                "frame too short ({} bytes)",
                frame.len()
            )));
        }
        let (content, crc_bytes) = frame.split_at(frame.len() - CRC_LEN);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(content);
        if expected != actual {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }

        let flags = content[0];
        if flags & FLAG_ENCRYPTED != 0 {
            return Err(DecodeError::Encrypted);
        }
        if flags != 0 {
            return Err(DecodeError::Malformed(format!("unknown flags {flags:#04x}")));
        }

        let body_len = u32::from_le_bytes([content[1], content[2], content[3], content[4]]) as usize;
        let body = &content[HEADER_LEN..];
        if body.len() != body_len {
            return Err(DecodeError::Malformed(format!(
                "body length {} does not match header {body_len}",
                body.len()
            )));
        }

        let (record, read): (FirRecord, usize) = decode_from_slice(body, standard())
            .map_err(|e| DecodeError::Malformed(format!("undecodable body: {e}")))?;
        if read != body.len() {
            return Err(DecodeError::Malformed(format!(
                "{} trailing bytes after record",
                body.len() - read
            )));
        }

        // Reject alternative encodings of the same record so that
        // decode-then-encode is byte identical.
        let canonical = encode_to_vec(&record, standard())
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if canonical != body {
            return Err(DecodeError::Malformed("non-canonical record body".into()));
        }

        Ok(record)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TextTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TextTemplate {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TextTemplate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn strip_prefix(text: &str) -> Result<&str, DecodeError> {
    let (head, rest) = text
        .split_once('.')
        .ok_or_else(|| DecodeError::Malformed("missing format prefix".into()))?;
    let version = head
        .strip_prefix(PREFIX_TAG)
        .ok_or_else(|| DecodeError::Malformed(format!("unknown prefix {head:?}")))?;
    if version != TEXT_FORMAT_VERSION.to_string() {
        return Err(DecodeError::UnsupportedVersion(version.to_string()));
    }
    Ok(rest)
}
