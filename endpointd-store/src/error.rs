//! Storage error types.

use thiserror::Error;

/// Errors from the storage layer.
///
/// A missing record is not an error: lookups return the not-found marker.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("store is closed")]
    Closed,
}
