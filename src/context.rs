//! Engine context: one device session plus its template store and optional
//! search index.

use std::path::Path;
use std::sync::Arc;

use device::{CaptureRequest, DeviceInfo, SensorDriver};
use index::{Identification, IndexStats, SearchEngine, UserId};
use matcher::{verify_templates, MatchResult, Matcher, MinutiaeMatcher, SecurityLevel};
use template::{
    FirDataType, Purpose, SessionId, Template, TemplateHandle, TemplateStore, TextTemplate,
};
use tracing::{debug, info, warn};

use crate::config::BspConfig;
use crate::error::{EngineError, EngineState};

/// A completed capture registered in the session's template store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Handle to the captured record; release it when done.
    pub handle: TemplateHandle,
    /// Row-major 8-bit grayscale pixels.
    pub image: Vec<u8>,
    pub width: u16,
    pub height: u16,
    pub purpose: Purpose,
    pub quality: u8,
    pub data_type: FirDataType,
}

struct Session {
    info: DeviceInfo,
    store: Arc<TemplateStore>,
    search: Option<SearchEngine>,
}

/// Caller-owned engine bound to one sensor.
///
/// ```text
/// Closed --open()--> Open --initialize()--> SearchReady
/// SearchReady --terminate()--> Open --close()--> Closed
/// ```
///
/// Template operations need an open session; search operations need
/// `SearchReady`. Closing while search-ready discards the unsaved index.
/// A context is not meant for concurrent use; wrap it in a mutex to share
/// it. The [`SearchEngine`] reachable through [`EngineContext::search`] is
/// itself `Sync` and supports concurrent identification.
pub struct EngineContext<D: SensorDriver> {
    driver: D,
    config: BspConfig,
    matcher: Arc<dyn Matcher>,
    session: Option<Session>,
}

impl<D: SensorDriver> EngineContext<D> {
    /// Context with default configuration and the reference matcher.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            config: BspConfig::default(),
            matcher: Arc::new(MinutiaeMatcher::default()),
            session: None,
        }
    }

    /// Context configured from `config`, using the reference matcher.
    pub fn with_config(driver: D, config: BspConfig) -> Result<Self, EngineError> {
        let matcher = MinutiaeMatcher::new(config.matcher.clone())?;
        Self::with_matcher(driver, config, Arc::new(matcher))
    }

    /// Context with a custom matcher implementation.
    pub fn with_matcher(
        driver: D,
        config: BspConfig,
        matcher: Arc<dyn Matcher>,
    ) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|e| EngineError::EngineInitFailed(e.to_string()))?;
        Ok(Self {
            driver,
            config,
            matcher,
            session: None,
        })
    }

    pub fn config(&self) -> &BspConfig {
        &self.config
    }

    pub fn matcher(&self) -> &Arc<dyn Matcher> {
        &self.matcher
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Direct driver access, e.g. to present fingers to a simulated sensor.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn state(&self) -> EngineState {
        match &self.session {
            None => EngineState::Closed,
            Some(Session { search: None, .. }) => EngineState::Open,
            Some(Session {
                search: Some(_), ..
            }) => EngineState::SearchReady,
        }
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.store.session())
    }

    /// Level `identify` callers use when they have no preference.
    pub fn default_identify_level(&self) -> SecurityLevel {
        self.config.index.identify_level
    }

    /// Open the device and start a fresh template session.
    pub fn open(&mut self) -> Result<DeviceInfo, EngineError> {
        if self.session.is_some() {
            return Err(self.invalid("open"));
        }
        let info = self.driver.open()?;
        let store = Arc::new(TemplateStore::new(self.config.template.max_payload_bytes));
        info!(
            device = %info.name,
            width = info.image_width,
            height = info.image_height,
            session = %store.session(),
            "device session opened"
        );
        self.session = Some(Session {
            info: info.clone(),
            store,
            search: None,
        });
        Ok(info)
    }

    /// Close the device, releasing every template handle of the session.
    ///
    /// Idempotent. An initialized search index is discarded without being
    /// saved.
    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(search) = &session.search {
            let stats = search.stats();
            if stats.users > 0 {
                warn!(
                    users = stats.users,
                    samples = stats.samples,
                    "closing with an initialized index; unsaved enrollments are discarded"
                );
            }
        }
        let released = session.store.clear();
        self.driver.close();
        info!(session = %session.store.session(), released, "device session closed");
    }

    /// Allocate an empty search index bound to the open session.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        let state = self.state();
        let matcher = self.matcher.clone();
        let cfg = self.config.index.clone();
        let session = match (&mut self.session, state) {
            (Some(session), EngineState::Open) => session,
            (_, EngineState::SearchReady) => {
                return Err(EngineError::EngineInitFailed(
                    "search engine already initialized; terminate it first".into(),
                ));
            }
            _ => {
                return Err(EngineError::InvalidState {
                    operation: "initialize",
                    state,
                });
            }
        };
        let search = SearchEngine::new(session.store.clone(), matcher, cfg)
            .map_err(|e| EngineError::EngineInitFailed(e.to_string()))?;
        session.search = Some(search);
        info!("search engine initialized");
        Ok(())
    }

    /// Discard the search index and return to `Open`. A no-op when no index
    /// is allocated.
    pub fn terminate(&mut self) -> Result<(), EngineError> {
        let state = self.state();
        let session = self.session.as_mut().ok_or(EngineError::InvalidState {
            operation: "terminate",
            state,
        })?;
        if let Some(search) = session.search.take() {
            let stats = search.stats();
            info!(
                users = stats.users,
                samples = stats.samples,
                "search engine terminated"
            );
        }
        Ok(())
    }

    /// Capture a sample at the device's native geometry.
    pub fn capture(
        &mut self,
        purpose: Purpose,
        timeout_secs: u64,
    ) -> Result<Capture, EngineError> {
        let info = &self.session("capture")?.info;
        let request = CaptureRequest::for_device(info, purpose, timeout_secs);
        self.capture_with(&request)
    }

    /// Capture with explicit parameters; the dimensions must match the
    /// opened device.
    pub fn capture_with(&mut self, request: &CaptureRequest) -> Result<Capture, EngineError> {
        // field access keeps the driver borrowable below
        let session = self.session.as_ref().ok_or(EngineError::InvalidState {
            operation: "capture",
            state: EngineState::Closed,
        })?;
        request.validate(&session.info)?;
        let raw = self.driver.capture(request)?;

        let quality = raw.record.quality;
        let data_type = raw.record.data_type;
        let purpose = raw.record.purpose;
        let handle = session.store.register(raw.record);
        debug!(%handle, quality, ?purpose, "captured sample");
        Ok(Capture {
            handle,
            image: raw.image,
            width: request.width,
            height: request.height,
            purpose,
            quality,
            data_type,
        })
    }

    /// Capture and immediately bind `payload`, returning the text form.
    ///
    /// The captured handle never escapes; it is consumed on success and
    /// released on failure.
    pub fn capture_with_payload(
        &mut self,
        purpose: Purpose,
        timeout_secs: u64,
        payload: &[u8],
    ) -> Result<TextTemplate, EngineError> {
        let capture = self.capture(purpose, timeout_secs)?;
        let store = self.store("capture_with_payload")?;
        store.create_from_handle(capture.handle, payload).map_err(|e| {
            store.release(capture.handle);
            e.into()
        })
    }

    /// Bind `payload` into the template behind `handle` and return its text
    /// form. The handle is released on success.
    pub fn create_template(
        &self,
        handle: TemplateHandle,
        payload: &[u8],
    ) -> Result<TextTemplate, EngineError> {
        Ok(self
            .store("create_template")?
            .create_from_handle(handle, payload)?)
    }

    /// Text form of a live handle; the handle stays live.
    pub fn to_text(&self, handle: TemplateHandle) -> Result<TextTemplate, EngineError> {
        Ok(self.store("to_text")?.to_text(handle)?)
    }

    /// Ingest a stored text template as a new handle.
    pub fn import_text(&self, text: &TextTemplate) -> Result<TemplateHandle, EngineError> {
        Ok(self.store("import_text")?.import_text(text)?)
    }

    /// Release a handle. Double release, or release after close, is a
    /// no-op that returns `false`.
    pub fn release(&self, handle: TemplateHandle) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.store.release(handle))
    }

    /// Matchable copy of the record behind `handle`, as a new handle. The
    /// source handle stays live.
    pub fn process(&self, handle: TemplateHandle) -> Result<TemplateHandle, EngineError> {
        let store = self.store("process")?;
        let record = store.resolve(handle)?;
        let processed = self.matcher.process(&record)?;
        Ok(store.register(processed))
    }

    /// 1:1 comparison. Both templates must share one form; on a match the
    /// result carries the payload bound into `stored`.
    pub fn verify(&self, probe: &Template, stored: &Template) -> Result<MatchResult, EngineError> {
        let store = self.store("verify")?;
        Ok(verify_templates(store, self.matcher.as_ref(), probe, stored)?)
    }

    /// Capture a fresh sample and verify it against `stored`.
    ///
    /// The fresh sample is converted to the stored template's form first, so
    /// either form can be passed. The fresh handle is always released.
    pub fn capture_and_verify(
        &mut self,
        stored: &Template,
        timeout_secs: u64,
    ) -> Result<MatchResult, EngineError> {
        let capture = self.capture(Purpose::Verify, timeout_secs)?;
        let result = self.verify_fresh(capture.handle, stored);
        self.release(capture.handle);
        result
    }

    fn verify_fresh(
        &self,
        fresh: TemplateHandle,
        stored: &Template,
    ) -> Result<MatchResult, EngineError> {
        let probe = match stored {
            Template::Handle(_) => Template::Handle(fresh),
            Template::Text(_) => Template::Text(self.to_text(fresh)?),
        };
        self.verify(&probe, stored)
    }

    /// The search index; requires `SearchReady`.
    pub fn search(&self) -> Result<&SearchEngine, EngineError> {
        self.search_for("search")
    }

    pub fn insert(&self, user_id: UserId, template: &Template) -> Result<(), EngineError> {
        Ok(self.search_for("insert")?.insert(user_id, template)?)
    }

    pub fn remove(&self, user_id: UserId) -> Result<bool, EngineError> {
        Ok(self.search_for("remove")?.remove(user_id))
    }

    pub fn identify(
        &self,
        template: &Template,
        level: SecurityLevel,
    ) -> Result<Identification, EngineError> {
        Ok(self.search_for("identify")?.identify(template, level)?)
    }

    /// Capture a fresh sample and identify it. The fresh handle is always
    /// released.
    pub fn capture_and_identify(
        &mut self,
        level: SecurityLevel,
        timeout_secs: u64,
    ) -> Result<Identification, EngineError> {
        self.search_for("capture_and_identify")?;
        let capture = self.capture(Purpose::Identify, timeout_secs)?;
        let result = self.identify(&Template::Handle(capture.handle), level);
        self.release(capture.handle);
        result
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        Ok(self.search_for("save")?.save(path)?)
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        Ok(self.search_for("load")?.load(path)?)
    }

    pub fn stats(&self) -> Result<IndexStats, EngineError> {
        Ok(self.search_for("stats")?.stats())
    }

    fn session(&self, operation: &'static str) -> Result<&Session, EngineError> {
        self.session.as_ref().ok_or(EngineError::InvalidState {
            operation,
            state: EngineState::Closed,
        })
    }

    fn store(&self, operation: &'static str) -> Result<&TemplateStore, EngineError> {
        Ok(&self.session(operation)?.store)
    }

    fn search_for(&self, operation: &'static str) -> Result<&SearchEngine, EngineError> {
        self.session(operation)?
            .search
            .as_ref()
            .ok_or_else(|| self.invalid(operation))
    }

    fn invalid(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidState {
            operation,
            state: self.state(),
        }
    }
}

impl<D: SensorDriver> Drop for EngineContext<D> {
    fn drop(&mut self) {
        self.close();
    }
}
