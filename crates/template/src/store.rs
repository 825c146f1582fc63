//! Session-scoped template store.
//!
//! Handles are plain ids into a table owned by one device session. Ids are
//! never reused within a session, so a released handle stays stale forever
//! and a handle from another session is never mistaken for a live one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::codec::TextTemplate;
use crate::error::TemplateError;
use crate::record::{FirRecord, SessionId, TemplateHandle};

/// Default upper bound on caller payload size.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024;

/// Owner of every live template handle of one session.
///
/// The store is internally synchronized so that a search engine can resolve
/// handles while the session keeps issuing new ones.
pub struct TemplateStore {
    session: SessionId,
    next_id: AtomicU64,
    records: RwLock<HashMap<u64, FirRecord>>,
    max_payload_bytes: usize,
}

impl TemplateStore {
    /// Create an empty store for a fresh session.
    pub fn new(max_payload_bytes: usize) -> Self {
        Self {
            session: SessionId::new(),
            next_id: AtomicU64::new(1),
            records: RwLock::new(HashMap::new()),
            max_payload_bytes,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Take ownership of a record and hand out a new handle for it.
    pub fn register(&self, record: FirRecord) -> TemplateHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.write().insert(id, record);
        trace!(id, session = %self.session, "registered template handle");
        TemplateHandle {
            session: self.session,
            id,
        }
    }

    /// Copy out the record behind a live handle.
    pub fn resolve(&self, handle: TemplateHandle) -> Result<FirRecord, TemplateError> {
        if handle.session != self.session {
            return Err(TemplateError::StaleHandle(handle));
        }
        self.read()
            .get(&handle.id)
            .cloned()
            .ok_or(TemplateError::StaleHandle(handle))
    }

    /// Bind `payload` into the record behind `handle` and return its text
    /// form.
    ///
    /// The source handle is released on success and must not be used again.
    /// On failure it is left untouched.
    pub fn create_from_handle(
        &self,
        handle: TemplateHandle,
        payload: &[u8],
    ) -> Result<TextTemplate, TemplateError> {
        if payload.len() > self.max_payload_bytes {
            return Err(TemplateError::CreationFailed(format!(
                "payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.max_payload_bytes
            )));
        }
        let record = self.resolve(handle).map_err(|err| match err {
            TemplateError::StaleHandle(h) => {
                TemplateError::CreationFailed(format!("stale template handle {h}"))
            }
            other => other,
        })?;

        let text = TextTemplate::encode(&record.with_payload(payload.to_vec()))?;
        self.release(handle);
        debug!(handle = %handle, payload_len = payload.len(), "created text template with payload");
        Ok(text)
    }

    /// Lossless handle to text conversion; the handle stays live.
    pub fn to_text(&self, handle: TemplateHandle) -> Result<TextTemplate, TemplateError> {
        let record = self.resolve(handle)?;
        TextTemplate::encode(&record)
    }

    /// Ingest a stored text template and hand out a handle for it.
    pub fn import_text(&self, text: &TextTemplate) -> Result<TemplateHandle, TemplateError> {
        let record = text.decode()?;
        Ok(self.register(record))
    }

    /// Release a handle. Returns whether it was live; releasing twice is a
    /// no-op.
    pub fn release(&self, handle: TemplateHandle) -> bool {
        if handle.session != self.session {
            return false;
        }
        let released = self.write().remove(&handle.id).is_some();
        if released {
            trace!(handle = %handle, "released template handle");
        }
        released
    }

    /// Number of handles currently live.
    pub fn live_count(&self) -> usize {
        self.read().len()
    }

    /// Release every handle of the session.
    pub fn clear(&self) -> usize {
        let mut guard = self.write();
        let count = guard.len();
        guard.clear();
        count
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<u64, FirRecord>> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<u64, FirRecord>> {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Minutia, MinutiaKind, Purpose};

    fn record() -> FirRecord {
        FirRecord::processed(
            Purpose::Verify,
            70,
            64,
            64,
            vec![Minutia::new(1, 2, 3, MinutiaKind::Ending)],
        )
    }

    #[test]
    fn handles_are_unique_and_resolvable() {
        let store = TemplateStore::default();
        let a = store.register(record());
        let b = store.register(record());
        assert_ne!(a, b);
        assert_eq!(store.resolve(a).unwrap(), record());
        assert_eq!(store.live_count(), 2);
    }

    #[test]
    fn release_is_idempotent() {
        let store = TemplateStore::default();
        let handle = store.register(record());
        assert!(store.release(handle));
        assert!(!store.release(handle));
        assert_eq!(
            store.resolve(handle),
            Err(TemplateError::StaleHandle(handle))
        );
    }

    #[test]
    fn foreign_handles_are_stale() {
        let ours = TemplateStore::default();
        let theirs = TemplateStore::default();
        let handle = theirs.register(record());
        assert!(matches!(
            ours.resolve(handle),
            Err(TemplateError::StaleHandle(_))
        ));
        assert!(!ours.release(handle));
        assert_eq!(theirs.live_count(), 1);
    }

    #[test]
    fn create_from_handle_binds_payload_and_consumes_handle() {
        let store = TemplateStore::default();
        let handle = store.register(record());
        let text = store.create_from_handle(handle, b"badge-17").unwrap();

        let decoded = text.decode().unwrap();
        assert_eq!(decoded.payload.as_deref(), Some(&b"badge-17"[..]));
        assert_eq!(decoded.minutiae, record().minutiae);
        assert!(store.resolve(handle).is_err());
    }

    #[test]
    fn oversized_payload_keeps_handle_live() {
        let store = TemplateStore::new(4);
        let handle = store.register(record());
        let err = store.create_from_handle(handle, b"too long").unwrap_err();
        assert!(matches!(err, TemplateError::CreationFailed(_)));
        assert!(store.resolve(handle).is_ok());
    }

    #[test]
    fn stale_handle_cannot_create_template() {
        let store = TemplateStore::default();
        let handle = store.register(record());
        store.release(handle);
        let err = store.create_from_handle(handle, b"x").unwrap_err();
        assert!(matches!(err, TemplateError::CreationFailed(_)));
    }

    #[test]
    fn text_import_round_trips() {
        let store = TemplateStore::default();
        let handle = store.register(record());
        let text = store.to_text(handle).unwrap();
        let imported = store.import_text(&text).unwrap();
        assert_ne!(imported, handle);
        assert_eq!(store.resolve(imported).unwrap(), record());
        assert_eq!(store.to_text(imported).unwrap(), text);
    }

    #[test]
    fn clear_drops_everything() {
        let store = TemplateStore::default();
        let handle = store.register(record());
        store.register(record());
        assert_eq!(store.clear(), 2);
        assert!(store.resolve(handle).is_err());
    }
}
