//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | RepositoryError |
//! |------------|---------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Database` |
//! | Row value out of domain range | n/a | `DataCorruption` |
//!
//! Multi-table writes (checkout, cancellation, cart and wishlist saves) run
//! in a single transaction. `modify_*` edits read the row with
//! `SELECT ... FOR UPDATE` inside the transaction that writes it back.

mod carts;
mod orders;
mod products;
mod reviews;
mod users;
mod wishlists;

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::{RepoResult, RepositoryError};

/// Create a connection pool.
pub async fn create_pool(database_url: &SecretString, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &SecretString, max_connections: u32) -> RepoResult<Self> {
        let store = Self::new(create_pool(database_url, max_connections).await?);
        store.migrate().await?;
        Ok(store)
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Map a unique violation to `Conflict(message)`; everything else stays a
/// database error.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::Conflict(message.to_string())
    } else {
        RepositoryError::Database(err)
    }
}

fn to_i64(value: u64, field: &str) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| RepositoryError::Conflict(format!("{field} is out of range")))
}

fn to_u64(value: i64, field: &str) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepositoryError::DataCorruption(format!("negative {field}: {value}")))
}

fn to_u32(value: i64, field: &str) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| RepositoryError::DataCorruption(format!("{field} out of range: {value}")))
}

fn parse_column<T>(raw: &str, field: &str) -> RepoResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {field} '{raw}': {e}")))
}

/// Escape `LIKE` metacharacters and wrap in wildcards.
fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}
