use std::io::Write;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use matcher::{resolve_template, Matcher, SampleInfo, SecurityLevel};
use rayon::prelude::*;
use tempfile::NamedTempFile;
use template::{FirRecord, Template, TemplateStore};
use tracing::{debug, info, warn};

use crate::codec::{decode_db, encode_db};
use crate::config::IndexConfig;
use crate::db::{IndexSearchDb, IndexStats, UserId, UserRecord};
use crate::error::IndexError;

/// Outcome of a 1:N search. Not finding anyone is a normal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identification {
    Found { user_id: UserId, score: u8 },
    NotFound,
}

impl Identification {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identification::Found { user_id, .. } => Some(*user_id),
            Identification::NotFound => None,
        }
    }
}

/// 1:N search engine over one session's enrolled users.
///
/// Identification, stats and membership checks run under a shared lock and
/// may proceed concurrently. Insert, remove, clear, save and load take the
/// exclusive lock, so a scan never observes a half-applied mutation and a
/// failed mutation leaves the database untouched.
pub struct SearchEngine {
    store: Arc<TemplateStore>,
    matcher: Arc<dyn Matcher>,
    cfg: IndexConfig,
    db: RwLock<IndexSearchDb>,
}

impl SearchEngine {
    pub fn new(
        store: Arc<TemplateStore>,
        matcher: Arc<dyn Matcher>,
        cfg: IndexConfig,
    ) -> Result<Self, IndexError> {
        cfg.validate()?;
        Ok(Self {
            store,
            matcher,
            cfg,
            db: RwLock::new(IndexSearchDb::new()),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }

    /// Enroll `template` as one more sample of `user_id`.
    ///
    /// Repeated inserts for a user accumulate samples.
    pub fn insert(&self, user_id: UserId, template: &Template) -> Result<(), IndexError> {
        let record = resolve_template(&self.store, template)?;
        self.insert_record(user_id, &record)
    }

    /// Enroll an already decoded record.
    pub fn insert_record(&self, user_id: UserId, record: &FirRecord) -> Result<(), IndexError> {
        let sample = self.matcher.extract(record)?;
        let required = self.cfg.quality.required_for(record.purpose);
        if sample.quality < required {
            return Err(IndexError::InsertRejected {
                user_id,
                quality: sample.quality,
                required,
            });
        }
        let min_features = self.matcher.min_enroll_minutiae();
        if sample.len() < min_features {
            return Err(IndexError::TooFewFeatures {
                user_id,
                found: sample.len(),
                required: min_features,
            });
        }
        let count = self.write().push_sample(user_id, sample);
        debug!(%user_id, samples = count, "inserted sample");
        Ok(())
    }

    /// Drop every sample of `user_id`. Returns whether the user existed.
    pub fn remove(&self, user_id: UserId) -> bool {
        let removed = self.write().remove(user_id);
        debug!(%user_id, removed, "remove");
        removed
    }

    /// Best enrolled user whose score clears `level`.
    ///
    /// Ties on score go to the lowest user id.
    pub fn identify(
        &self,
        template: &Template,
        level: SecurityLevel,
    ) -> Result<Identification, IndexError> {
        let record = resolve_template(&self.store, template)?;
        self.identify_record(&record, level)
    }

    pub fn identify_record(
        &self,
        record: &FirRecord,
        level: SecurityLevel,
    ) -> Result<Identification, IndexError> {
        let probe = self.matcher.extract(record)?;
        let db = self.read();
        let best = if self.cfg.use_parallel {
            let records: Vec<&UserRecord> = db.records().collect();
            records
                .par_iter()
                .filter_map(|user| self.best_for_user(&probe, user, level))
                .max_by(rank)
        } else {
            db.records()
                .filter_map(|user| self.best_for_user(&probe, user, level))
                .max_by(rank)
        };
        drop(db);

        let result = match best {
            Some((score, user_id)) => Identification::Found { user_id, score },
            None => Identification::NotFound,
        };
        debug!(level = %level, ?result, "identify");
        Ok(result)
    }

    /// Highest clearing score among one user's samples.
    fn best_for_user(
        &self,
        probe: &SampleInfo,
        user: &UserRecord,
        level: SecurityLevel,
    ) -> Option<(u8, UserId)> {
        user.samples
            .iter()
            .filter(|sample| level.clears(self.matcher.score_upper_bound(probe, sample)))
            .map(|sample| self.matcher.score(probe, sample))
            .filter(|score| level.clears(*score))
            .max()
            .map(|score| (score, user.user_id))
    }

    /// Write the database to `path`, atomically replacing any existing file.
    ///
    /// An error means the previous file is untouched. Once the rename has
    /// happened the save succeeds; a failing directory sync afterwards is
    /// logged, not returned.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let path = path.as_ref();
        let db = self.write();
        let bytes = encode_db(&db, &self.cfg.compression)?;
        let stats = db.stats();

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent).map_err(IndexError::io)?;
        tmp.write_all(&bytes).map_err(IndexError::io)?;
        tmp.as_file().sync_all().map_err(IndexError::io)?;
        tmp.persist(path).map_err(|e| IndexError::io(e.error))?;
        drop(db);
        sync_parent(parent);

        info!(
            path = %path.display(),
            users = stats.users,
            samples = stats.samples,
            bytes = bytes.len(),
            "saved index database"
        );
        Ok(())
    }

    /// Replace the in-memory database with the contents of `path`.
    ///
    /// The file is decoded and validated completely before anything is
    /// swapped in.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let path = path.as_ref();
        let mut db = self.write();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IndexError::FileNotFound(path.to_path_buf()),
            _ => IndexError::io(e),
        })?;
        let loaded = decode_db(&bytes)?;
        let stats = loaded.stats();
        *db = loaded;
        drop(db);

        info!(
            path = %path.display(),
            users = stats.users,
            samples = stats.samples,
            "loaded index database"
        );
        Ok(())
    }

    pub fn stats(&self) -> IndexStats {
        self.read().stats()
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.read().contains(user_id)
    }

    /// Drop every enrolled user. Returns how many there were.
    pub fn clear(&self) -> usize {
        let mut db = self.write();
        let users = db.stats().users;
        db.clear();
        users
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexSearchDb> {
        self.db.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexSearchDb> {
        self.db.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Higher score wins, then the lower user id.
fn rank(a: &(u8, UserId), b: &(u8, UserId)) -> std::cmp::Ordering {
    a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1))
}

/// Best-effort directory sync once the rename is done. Returns whether it
/// succeeded.
fn sync_parent(dir: &Path) -> bool {
    match sync_dir(dir) {
        Ok(()) => true,
        Err(err) => {
            warn!(dir = %dir.display(), %err, "directory sync after save failed");
            false
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), IndexError> {
    std::fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(IndexError::io)
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), IndexError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressionCodec, CompressionConfig, QualityPolicy};
    use matcher::{MatchError, MinutiaeMatcher};
    use template::{FirDataType, Minutia, MinutiaKind, Purpose, TextTemplate};

    /// A finger is a grid pattern keyed by `seed`; distinct seeds share no
    /// points within matching tolerance.
    fn finger(seed: u16, count: u16) -> FirRecord {
        let minutiae = (0..count)
            .map(|i| {
                Minutia::new(
                    10 + (i % 8) * 30 + (seed % 3) * 10,
                    10 + (i / 8) * 40 + (seed / 3) * 9,
                    (i * 41 + seed * 7) as u8,
                    MinutiaKind::Ending,
                )
            })
            .collect();
        FirRecord::processed(Purpose::Enroll, 80, 260, 300, minutiae)
    }

    fn engine_with(cfg: IndexConfig) -> SearchEngine {
        SearchEngine::new(
            Arc::new(TemplateStore::default()),
            Arc::new(MinutiaeMatcher::default()),
            cfg,
        )
        .unwrap()
    }

    fn engine() -> SearchEngine {
        engine_with(IndexConfig::default())
    }

    #[test]
    fn insert_then_identify() {
        let engine = engine();
        engine.insert_record(UserId(42), &finger(1, 20)).unwrap();
        let found = engine
            .identify_record(&finger(1, 20), SecurityLevel::LOWEST)
            .unwrap();
        assert_eq!(
            found,
            Identification::Found {
                user_id: UserId(42),
                score: 100
            }
        );
    }

    #[test]
    fn empty_index_finds_nobody() {
        let engine = engine();
        for level in [SecurityLevel::MIN, SecurityLevel::NORMAL, SecurityLevel::HIGHEST] {
            assert_eq!(
                engine.identify_record(&finger(1, 20), level).unwrap(),
                Identification::NotFound
            );
        }
    }

    #[test]
    fn unrelated_finger_is_not_found() {
        let engine = engine();
        engine.insert_record(UserId(1), &finger(1, 20)).unwrap();
        let result = engine
            .identify_record(&finger(4, 20), SecurityLevel::LOWEST)
            .unwrap();
        assert_eq!(result, Identification::NotFound);
    }

    #[test]
    fn equal_scores_pick_lowest_user_id() {
        let engine = engine();
        for id in [17, 3, 9] {
            engine.insert_record(UserId(id), &finger(2, 16)).unwrap();
        }
        let result = engine
            .identify_record(&finger(2, 16), SecurityLevel::NORMAL)
            .unwrap();
        assert_eq!(result.user_id(), Some(UserId(3)));
    }

    #[test]
    fn higher_score_beats_lower_user_id() {
        let engine = engine();
        engine.insert_record(UserId(1), &finger(2, 12)).unwrap();
        engine.insert_record(UserId(2), &finger(2, 16)).unwrap();
        let result = engine
            .identify_record(&finger(2, 16), SecurityLevel::NORMAL)
            .unwrap();
        assert_eq!(
            result,
            Identification::Found {
                user_id: UserId(2),
                score: 100
            }
        );
    }

    #[test]
    fn level_filters_partial_matches() {
        let engine = engine();
        engine.insert_record(UserId(5), &finger(0, 8)).unwrap();
        // 8 of 24 points pair: 200 * 8 / 32 = 50
        let probe = finger(0, 24);
        assert_eq!(
            engine
                .identify_record(&probe, SecurityLevel::new(50).unwrap())
                .unwrap()
                .user_id(),
            Some(UserId(5))
        );
        assert_eq!(
            engine
                .identify_record(&probe, SecurityLevel::new(51).unwrap())
                .unwrap(),
            Identification::NotFound
        );
    }

    #[test]
    fn duplicate_inserts_accumulate() {
        let engine = engine();
        engine.insert_record(UserId(9), &finger(1, 20)).unwrap();
        engine.insert_record(UserId(9), &finger(5, 20)).unwrap();
        assert_eq!(engine.stats(), IndexStats { users: 1, samples: 2 });
        for seed in [1, 5] {
            let result = engine
                .identify_record(&finger(seed, 20), SecurityLevel::NORMAL)
                .unwrap();
            assert_eq!(result.user_id(), Some(UserId(9)));
        }
    }

    #[test]
    fn remove_reports_presence() {
        let engine = engine();
        engine.insert_record(UserId(7), &finger(1, 20)).unwrap();
        assert!(engine.contains(UserId(7)));
        assert!(engine.remove(UserId(7)));
        assert!(!engine.contains(UserId(7)));
        assert_eq!(
            engine
                .identify_record(&finger(1, 20), SecurityLevel::MIN)
                .unwrap(),
            Identification::NotFound
        );
        assert!(!engine.remove(UserId(7)));
    }

    #[test]
    fn low_quality_insert_is_rejected_without_side_effects() {
        let engine = engine();
        let mut record = finger(1, 20);
        record.quality = 20;
        let err = engine.insert_record(UserId(1), &record).unwrap_err();
        assert_eq!(
            err,
            IndexError::InsertRejected {
                user_id: UserId(1),
                quality: 20,
                required: 50
            }
        );
        assert_eq!(engine.stats(), IndexStats::default());

        let permissive = engine_with(IndexConfig::new().with_quality(QualityPolicy::permissive()));
        permissive.insert_record(UserId(1), &record).unwrap();
    }

    #[test]
    fn sparse_samples_are_not_enrolled() {
        let engine = engine();
        let err = engine.insert_record(UserId(2), &finger(2, 5)).unwrap_err();
        assert_eq!(
            err,
            IndexError::TooFewFeatures {
                user_id: UserId(2),
                found: 5,
                required: 8
            }
        );
        assert!(!engine.contains(UserId(2)));

        // a sparse probe can still search
        engine.insert_record(UserId(2), &finger(2, 20)).unwrap();
        let found = engine
            .identify_record(&finger(2, 5), SecurityLevel::LOWEST)
            .unwrap();
        assert_eq!(found.user_id(), Some(UserId(2)));
    }

    #[test]
    fn raw_records_cannot_be_enrolled() {
        let engine = engine();
        let mut record = finger(1, 20);
        record.data_type = FirDataType::Raw;
        assert_eq!(
            engine.insert_record(UserId(1), &record),
            Err(IndexError::Match(MatchError::RequiresProcessedData))
        );
    }

    #[test]
    fn templates_of_both_forms_are_accepted() {
        let engine = engine();
        let handle = engine.store.register(finger(1, 20));
        engine.insert(UserId(1), &Template::Handle(handle)).unwrap();
        let text = TextTemplate::encode(&finger(5, 20)).unwrap();
        engine.insert(UserId(2), &Template::Text(text.clone())).unwrap();

        let result = engine
            .identify(&Template::Text(text), SecurityLevel::NORMAL)
            .unwrap();
        assert_eq!(result.user_id(), Some(UserId(2)));
        let result = engine
            .identify(&Template::Handle(handle), SecurityLevel::NORMAL)
            .unwrap();
        assert_eq!(result.user_id(), Some(UserId(1)));
    }

    #[test]
    fn parallel_scan_agrees_with_sequential() {
        let sequential = engine();
        let parallel = engine_with(IndexConfig::new().with_parallel(true));
        for seed in 0..12u16 {
            for e in [&sequential, &parallel] {
                e.insert_record(UserId(100 - u32::from(seed)), &finger(seed, 18))
                    .unwrap();
                e.insert_record(UserId(200 + u32::from(seed)), &finger(seed, 18))
                    .unwrap();
            }
        }
        for seed in 0..12u16 {
            let probe = finger(seed, 18);
            let a = sequential.identify_record(&probe, SecurityLevel::NORMAL).unwrap();
            let b = parallel.identify_record(&probe, SecurityLevel::NORMAL).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.user_id(), Some(UserId(100 - u32::from(seed))));
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.fbdb");
        for codec in [CompressionCodec::None, CompressionCodec::Zstd] {
            let cfg = IndexConfig::new()
                .with_compression(CompressionConfig::default().with_codec(codec));
            let engine = engine_with(cfg.clone());
            engine.insert_record(UserId(1), &finger(1, 20)).unwrap();
            engine.insert_record(UserId(2), &finger(5, 20)).unwrap();
            engine.insert_record(UserId(2), &finger(7, 20)).unwrap();
            engine.save(&path).unwrap();

            let restored = engine_with(cfg);
            restored.insert_record(UserId(99), &finger(9, 20)).unwrap();
            restored.load(&path).unwrap();
            // load replaces, it does not merge
            assert!(!restored.contains(UserId(99)));
            assert_eq!(restored.stats(), IndexStats { users: 2, samples: 3 });
            for (seed, id) in [(1, 1), (5, 2), (7, 2)] {
                let result = restored
                    .identify_record(&finger(seed, 20), SecurityLevel::NORMAL)
                    .unwrap();
                assert_eq!(result.user_id(), Some(UserId(id)));
            }
        }
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.fbdb");
        std::fs::write(&path, b"stale contents").unwrap();

        let engine = engine();
        engine.insert_record(UserId(3), &finger(3, 20)).unwrap();
        engine.save(&path).unwrap();

        let restored = self::engine();
        restored.load(&path).unwrap();
        assert!(restored.contains(UserId(3)));
        // nothing but the target is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn directory_sync_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sync_parent(dir.path()));
        assert!(!sync_parent(&dir.path().join("gone")));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.fbdb");
        assert_eq!(engine().load(&path), Err(IndexError::FileNotFound(path)));
    }

    #[test]
    fn failed_load_keeps_current_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.fbdb");
        std::fs::write(&path, b"FBSPIDX\0 but nothing useful after the magic").unwrap();

        let engine = engine();
        engine.insert_record(UserId(4), &finger(4, 20)).unwrap();
        let err = engine.load(&path).unwrap_err();
        assert!(matches!(err, IndexError::CorruptedDatabaseFile(_)));
        assert!(engine.contains(UserId(4)));
    }

    #[test]
    fn clear_empties_database() {
        let engine = engine();
        engine.insert_record(UserId(1), &finger(1, 20)).unwrap();
        engine.insert_record(UserId(2), &finger(5, 20)).unwrap();
        assert_eq!(engine.clear(), 2);
        assert_eq!(engine.stats(), IndexStats::default());
    }
}
