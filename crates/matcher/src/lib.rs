//! # FBSP Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` owns the pairwise comparison of fingerprint templates. The same
//! [`Matcher`] implementation serves 1:1 verification through
//! [`verify_templates`] and 1:N identification inside the `index` crate, so
//! both paths agree on what "the same finger" means.
//!
//! ## Core Types
//!
//! - [`SecurityLevel`]: strictness on the `0..=100` score scale. A score
//!   clears a level when it is non-zero and at least the level.
//! - [`SampleInfo`]: feature representation stored in the search index.
//! - [`Matcher`]: extraction, scoring, processing and verification contract.
//! - [`MinutiaeMatcher`]: reference implementation pairing feature points by
//!   position and direction, tuned by [`MatcherConfig`].
//! - [`MatchResult`]: match decision, score and the stored template's payload.
//!
//! Comparing a handle-form template with a text-form template is rejected
//! with [`MatchError::UnsupportedFormMismatch`]; convert one side first.
//!
//! ## Example Usage
//!
//! ```
//! use matcher::{verify_templates, MinutiaeMatcher};
//! use template::{FirRecord, Minutia, MinutiaKind, Purpose, Template, TemplateStore};
//!
//! let store = TemplateStore::default();
//! let matcher = MinutiaeMatcher::default();
//!
//! let minutiae: Vec<Minutia> = (0..10u16)
//!     .map(|i| Minutia::new(20 + i * 20, 40 + i * 20, (i * 25) as u8, MinutiaKind::Ending))
//!     .collect();
//! let record = FirRecord::processed(Purpose::Verify, 90, 260, 300, minutiae);
//!
//! let a = Template::Handle(store.register(record.clone()));
//! let b = Template::Handle(store.register(record));
//! let result = verify_templates(&store, &matcher, &a, &b).unwrap();
//! assert!(result.matched);
//! assert_eq!(result.score, 100);
//! ```

mod adapter;
mod engine;
mod types;

pub use adapter::{resolve_template, verify_templates};
pub use engine::{Matcher, MinutiaeMatcher};
pub use types::{MatchError, MatchResult, MatcherConfig, SampleInfo, SecurityLevel};
