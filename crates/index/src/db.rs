//! In-memory search database: user id to enrolled samples.

use hashbrown::HashMap;
use matcher::SampleInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-chosen identifier of an enrolled person. The index never assigns
/// ids itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for UserId {
    fn from(id: u32) -> Self {
        UserId(id)
    }
}

/// Every sample enrolled for one user, in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub samples: Vec<SampleInfo>,
}

/// Size of a database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub users: usize,
    pub samples: usize,
}

/// Mapping from user id to record.
///
/// A user present in the map always has at least one sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSearchDb {
    users: HashMap<UserId, UserRecord>,
    samples: usize,
}

impl IndexSearchDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a database from persisted records, rejecting empty and
    /// repeated users.
    pub fn from_records(records: Vec<UserRecord>) -> Result<Self, String> {
        let mut db = Self::new();
        for record in records {
            if record.samples.is_empty() {
                return Err(format!("user {} has no samples", record.user_id));
            }
            if db.users.contains_key(&record.user_id) {
                return Err(format!("user {} appears twice", record.user_id));
            }
            db.samples += record.samples.len();
            db.users.insert(record.user_id, record);
        }
        Ok(db)
    }

    /// Records ordered by user id.
    pub fn to_records(&self) -> Vec<UserRecord> {
        let mut records: Vec<UserRecord> = self.users.values().cloned().collect();
        records.sort_unstable_by_key(|r| r.user_id);
        records
    }

    /// Append a sample, creating the user on first insert.
    pub fn push_sample(&mut self, user_id: UserId, sample: SampleInfo) -> usize {
        let record = self.users.entry(user_id).or_insert_with(|| UserRecord {
            user_id,
            samples: Vec::new(),
        });
        record.samples.push(sample);
        self.samples += 1;
        record.samples.len()
    }

    pub fn remove(&mut self, user_id: UserId) -> bool {
        match self.users.remove(&user_id) {
            Some(record) => {
                self.samples -= record.samples.len();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, user_id: UserId) -> Option<&UserRecord> {
        self.users.get(&user_id)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            users: self.users.len(),
            samples: self.samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn clear(&mut self) {
        self.users.clear();
        self.samples = 0;
    }
}
