//! SQLite persistence for the memory subsystem.

pub mod entity;
pub mod memory;
pub mod pool;
pub mod summary;

pub use entity::SqliteEntityLinkRepository;
pub use memory::SqliteMemoryRepository;
pub use pool::{DatabasePool, default_database_url};
pub use summary::SqliteSummaryRepository;

use keepsake_types::error::RepositoryError;

/// Classify sqlx errors: connectivity problems are transient and eligible
/// for retry, everything else is a query error.
pub(crate) fn map_sqlx_err(error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            RepositoryError::Connection(error.to_string())
        }
        _ => RepositoryError::Query(error.to_string()),
    }
}
