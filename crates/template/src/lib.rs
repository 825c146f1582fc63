//! # FBSP Template
//!
//! Fingerprint identification records (FIRs) and the two forms a template
//! can take:
//!
//! - **Handle form**: a [`TemplateHandle`] into the session-scoped
//!   [`TemplateStore`]. Cheap, never persisted, invalid once released or once
//!   its session closes.
//! - **Text form**: a [`TextTemplate`], a printable self-contained encoding
//!   that can be stored anywhere and decoded by any later session.
//!
//! Conversion between the forms is lossless. A text template decodes to the
//! same [`FirRecord`] it was encoded from, and re-encoding a decoded template
//! yields the identical string.
//!
//! ## Example
//!
//! ```
//! use template::{FirRecord, Minutia, MinutiaKind, Purpose, TemplateStore};
//!
//! let store = TemplateStore::default();
//! let record = FirRecord::processed(
//!     Purpose::Enroll,
//!     90,
//!     260,
//!     300,
//!     vec![Minutia::new(10, 20, 30, MinutiaKind::Ending)],
//! );
//! let handle = store.register(record.clone());
//!
//! let text = store.create_from_handle(handle, b"employee-42").unwrap();
//! let decoded = text.decode().unwrap();
//! assert_eq!(decoded.minutiae, record.minutiae);
//! assert_eq!(decoded.payload.as_deref(), Some(&b"employee-42"[..]));
//!
//! // the source handle was consumed
//! assert!(store.resolve(handle).is_err());
//! ```

pub mod codec;
pub mod error;
pub mod record;
mod store;

pub use crate::codec::{TextTemplate, TEXT_FORMAT_VERSION};
pub use crate::error::{DecodeError, TemplateError};
pub use crate::record::{
    FirDataType, FirRecord, Minutia, MinutiaKind, Purpose, SessionId, Template, TemplateForm,
    TemplateHandle,
};
pub use crate::store::{TemplateStore, DEFAULT_MAX_PAYLOAD_BYTES};
