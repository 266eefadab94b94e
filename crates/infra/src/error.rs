use thiserror::Error;

use tribal_core::DomainError;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The record to update or delete does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Constraint violation (duplicate email, duplicate review, stock race).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A [`crate::repository::Mutation`] rejected the stored record.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Stored data could not be mapped back to a domain value.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The in-memory store lock was poisoned by a panicking writer.
    #[error("store unavailable: lock poisoned")]
    Poisoned,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
