use thiserror::Error;

/// Errors from repository operations (used by trait definitions in keepsake-core).
///
/// `Connection` is the transient storage failure that the infra layer
/// retries with backoff; `Exhausted` is what surfaces once that retry
/// budget is spent.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl RepositoryError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Connection(_))
    }
}
