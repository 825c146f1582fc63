use std::path::PathBuf;

use matcher::MatchError;
use template::TemplateError;
use thiserror::Error;

use crate::db::UserId;

/// Errors surfaced by the search index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IndexError {
    #[error("insert for user {user_id} rejected: quality {quality} below required {required}")]
    InsertRejected {
        user_id: UserId,
        quality: u8,
        required: u8,
    },
    #[error("insert for user {user_id} rejected: {found} feature points, at least {required} required")]
    TooFewFeatures {
        user_id: UserId,
        found: usize,
        required: usize,
    },
    #[error("database file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("corrupted database file: {0}")]
    CorruptedDatabaseFile(String),
    #[error("database I/O failure: {0}")]
    IoFailure(String),
    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl IndexError {
    pub(crate) fn corrupted<E: std::fmt::Display>(err: E) -> Self {
        Self::CorruptedDatabaseFile(err.to_string())
    }

    pub(crate) fn io<E: std::fmt::Display>(err: E) -> Self {
        Self::IoFailure(err.to_string())
    }
}
