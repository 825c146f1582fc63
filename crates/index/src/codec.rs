//! Binary database file format.
//!
//! ```text
//! magic "FBSPIDX\0" | version:u16le | flags:u16le | users:u32le | samples:u32le
//!     | body_len:u64le | body | crc32le(everything before it)
//! ```
//!
//! `body` is the bincode (standard config) encoding of the user records
//! ordered by id, zstd-compressed when flag bit 0 is set. Saving the same
//! database twice produces identical files.

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};

use crate::config::{CompressionCodec, CompressionConfig};
use crate::db::{IndexSearchDb, UserRecord};
use crate::error::IndexError;

/// File magic.
pub const DB_MAGIC: [u8; 8] = *b"FBSPIDX\0";

/// Bump whenever the file layout or the record encoding changes.
pub const DB_FORMAT_VERSION: u16 = 1;

const FLAG_ZSTD: u16 = 0b0000_0001;
const HEADER_LEN: usize = 8 + 2 + 2 + 4 + 4 + 8;
const CRC_LEN: usize = 4;

/// Serialize `db` into a complete database file image.
pub fn encode_db(
    db: &IndexSearchDb,
    compression: &CompressionConfig,
) -> Result<Vec<u8>, IndexError> {
    let records = db.to_records();
    let stats = db.stats();
    let users = u32::try_from(stats.users).map_err(|_| IndexError::io("too many users"))?;
    let samples = u32::try_from(stats.samples).map_err(|_| IndexError::io("too many samples"))?;

    let raw = encode_to_vec(&records, standard()).map_err(IndexError::io)?;
    let body = compression.compress(&raw)?;
    let flags = match compression.codec {
        CompressionCodec::None => 0,
        CompressionCodec::Zstd => FLAG_ZSTD,
    };

    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + CRC_LEN);
    out.extend_from_slice(&DB_MAGIC);
    out.extend_from_slice(&DB_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&users.to_le_bytes());
    out.extend_from_slice(&samples.to_le_bytes());
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(&body);
    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Parse and fully validate a database file image.
pub fn decode_db(bytes: &[u8]) -> Result<IndexSearchDb, IndexError> {
    if bytes.len() < HEADER_LEN + CRC_LEN {
        return Err(IndexError::corrupted(format!(
            "file too short ({} bytes)",
            bytes.len()
        )));
    }
    if bytes[..8] != DB_MAGIC {
        return Err(IndexError::corrupted("bad magic"));
    }
    let version = u16::from_le_bytes([bytes[8], bytes[9]]);
    if version != DB_FORMAT_VERSION {
        return Err(IndexError::corrupted(format!(
            "unsupported format version {version}"
        )));
    }

    let (content, crc_bytes) = bytes.split_at(bytes.len() - CRC_LEN);
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let actual = crc32fast::hash(content);
    if expected != actual {
        return Err(IndexError::corrupted(format!(
            "checksum mismatch: stored {expected:#010x}, computed {actual:#010x}"
        )));
    }

    let flags = u16::from_le_bytes([bytes[10], bytes[11]]);
    let codec = match flags {
        0 => CompressionCodec::None,
        FLAG_ZSTD => CompressionCodec::Zstd,
        other => return Err(IndexError::corrupted(format!("unknown flags {other:#06x}"))),
    };
    let users = read_u32(&bytes[12..16]) as usize;
    let samples = read_u32(&bytes[16..20]) as usize;
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[20..28]);
    let body_len = u64::from_le_bytes(len_bytes);

    let body = &content[HEADER_LEN..];
    if body.len() as u64 != body_len {
        return Err(IndexError::corrupted(format!(
            "body length {} does not match header {body_len}",
            body.len()
        )));
    }

    let raw = CompressionConfig::decompress(codec, body)?;
    let (records, read): (Vec<UserRecord>, usize) =
        decode_from_slice(&raw, standard()).map_err(IndexError::corrupted)?;
    if read != raw.len() {
        return Err(IndexError::corrupted("trailing bytes after records"));
    }

    let db = IndexSearchDb::from_records(records).map_err(IndexError::corrupted)?;
    let stats = db.stats();
    if stats.users != users || stats.samples != samples {
        return Err(IndexError::corrupted(format!(
            "header announces {users} users / {samples} samples, body holds {} / {}",
            stats.users, stats.samples
        )));
    }
    Ok(db)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
