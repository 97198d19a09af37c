//! Repository layer: typed CRUD and derived finders over SQLite.
//!
//! # Responsibility
//! - Expose a generic repository per entity shape bound to one connection.
//! - Keep SQL details inside the engine boundary.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Persistence`) in
//!   addition to DB transport errors.
//! - Lookups model absence as `None`, never as an error.
//! - Writes are visible to the next call on the same connection.

use crate::db::DbError;
use crate::model::entity::EntityId;
use crate::query::QueryError;
use rusqlite::ErrorCode;
use thiserror::Error;

pub mod branch_repo;
pub mod employee_repo;
pub mod repository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: EntityId },

    /// Store-level constraint violation (uniqueness, foreign key, not null).
    #[error("{entity} could not be persisted: {message}")]
    Persistence {
        entity: &'static str,
        message: String,
    },

    #[error("{entity}.{relation} must reference a persisted entity")]
    UnsavedRelation {
        entity: &'static str,
        relation: &'static str,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Maps constraint violations on writes to `Persistence`.
pub(crate) fn map_write_error(entity: &'static str, err: rusqlite::Error) -> RepoError {
    match err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepoError::Persistence {
                entity,
                message: message.unwrap_or_else(|| failure.to_string()),
            }
        }
        other => other.into(),
    }
}
