//! # FBSP Index
//!
//! 1:N identification over the users enrolled during one device session,
//! with durable persistence of that population.
//!
//! ## Core Features
//!
//! - **Enrollment**: [`SearchEngine::insert`] derives a [`matcher::SampleInfo`]
//!   from a template through the configured [`matcher::Matcher`] and appends it
//!   to the user's record. Repeated inserts for one user accumulate samples.
//!   Inserts below the per-purpose quality gate ([`QualityPolicy`]) fail with
//!   [`IndexError::InsertRejected`].
//! - **Identification**: [`SearchEngine::identify`] scans every enrolled
//!   sample and returns the best user whose score clears the requested
//!   [`matcher::SecurityLevel`], or [`Identification::NotFound`]. Equal
//!   scores resolve to the lowest [`UserId`]. Candidates whose cheap score
//!   bound cannot clear the level are skipped, and the scan can run on the
//!   rayon pool (`IndexConfig::use_parallel`) with identical results.
//! - **Persistence**: [`SearchEngine::save`] writes a checksummed, versioned
//!   file (see [`codec`]) through a temp file and an atomic rename;
//!   [`SearchEngine::load`] validates the whole file before replacing the
//!   in-memory database.
//!
//! ## Concurrency
//!
//! The database sits behind a readers-writer lock: identify, stats and
//! contains share it, every mutation (including save and load) holds it
//! exclusively.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use index::{Identification, IndexConfig, SearchEngine, UserId};
//! use matcher::{MinutiaeMatcher, SecurityLevel};
//! use template::{FirRecord, Minutia, MinutiaKind, Purpose, Template, TemplateStore};
//!
//! let store = Arc::new(TemplateStore::default());
//! let engine = SearchEngine::new(
//!     store.clone(),
//!     Arc::new(MinutiaeMatcher::default()),
//!     IndexConfig::default(),
//! )
//! .unwrap();
//!
//! let minutiae: Vec<Minutia> = (0..12u16)
//!     .map(|i| Minutia::new(15 + i * 18, 20 + i * 22, (i * 19) as u8, MinutiaKind::Ending))
//!     .collect();
//! let record = FirRecord::processed(Purpose::Enroll, 85, 260, 300, minutiae);
//! let template = Template::Handle(store.register(record));
//!
//! engine.insert(UserId(42), &template).unwrap();
//! match engine.identify(&template, SecurityLevel::NORMAL).unwrap() {
//!     Identification::Found { user_id, score } => {
//!         assert_eq!(user_id, UserId(42));
//!         assert_eq!(score, 100);
//!     }
//!     Identification::NotFound => unreachable!(),
//! }
//! ```

pub mod codec;
mod config;
mod db;
mod engine;
mod error;

pub use codec::{DB_FORMAT_VERSION, DB_MAGIC};
pub use config::{CompressionCodec, CompressionConfig, IndexConfig, QualityPolicy};
pub use db::{IndexSearchDb, IndexStats, UserId, UserRecord};
pub use engine::{Identification, SearchEngine};
pub use error::IndexError;
