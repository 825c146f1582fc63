//! Workspace umbrella crate for the FBSP fingerprint engine.
//!
//! This crate ties a sensor driver, the session-scoped template store, the
//! matcher and the 1:N search index together behind one caller-owned
//! [`EngineContext`]. The layers stay usable on their own through the
//! re-exported crates.
//!
//! ## Example
//!
//! ```
//! use fbsp::{EngineContext, Identification, SecurityLevel, Template, UserId};
//! use fbsp::device::{SimulatedSensor, SimulatedSensorConfig, SyntheticFinger};
//! use fbsp::template::Purpose;
//!
//! let mut ctx = EngineContext::new(SimulatedSensor::new(SimulatedSensorConfig::default()));
//! ctx.open().unwrap();
//! ctx.initialize().unwrap();
//!
//! ctx.driver_mut().present(SyntheticFinger::new(7));
//! let enrolled = ctx.capture_with_payload(Purpose::Enroll, 5, b"badge-7").unwrap();
//! ctx.insert(UserId(7), &Template::Text(enrolled.clone())).unwrap();
//!
//! // a second touch of the same finger is recognised
//! ctx.driver_mut().present(SyntheticFinger::new(7));
//! let found = ctx.capture_and_identify(SecurityLevel::NORMAL, 5).unwrap();
//! assert_eq!(found.user_id(), Some(UserId(7)));
//!
//! // and verifies against the stored template, unlocking its payload
//! ctx.driver_mut().present(SyntheticFinger::new(7));
//! let result = ctx.capture_and_verify(&Template::Text(enrolled), 5).unwrap();
//! assert!(result.matched);
//! assert_eq!(result.payload, b"badge-7");
//! ```

pub mod config;
mod context;
mod error;

pub use device;
pub use index;
pub use matcher;
pub use template;

pub use crate::config::{BspConfig, ConfigLoadError};
pub use crate::context::{Capture, EngineContext};
pub use crate::error::{EngineError, EngineState};
pub use device::{CaptureRequest, DeviceInfo, SensorDriver};
pub use index::{Identification, IndexConfig, IndexStats, SearchEngine, UserId};
pub use matcher::{MatchResult, Matcher, MatcherConfig, MinutiaeMatcher, SecurityLevel};
pub use template::{Template, TemplateHandle, TextTemplate};
