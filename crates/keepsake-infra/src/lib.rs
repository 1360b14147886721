//! Infrastructure layer for Keepsake.
//!
//! Contains implementations of the repository traits defined in
//! `keepsake-core`: SQLite storage for memories, entity links, and
//! conversation summaries, plus bounded-backoff retry for transient
//! storage failures.

pub mod retry;
pub mod sqlite;

pub use retry::with_backoff;
pub use sqlite::{
    DatabasePool, SqliteEntityLinkRepository, SqliteMemoryRepository, SqliteSummaryRepository,
    default_database_url,
};
