//! Memory extraction, storage, and the repository contract.

pub mod extractor;
pub mod repository;
pub mod store;

pub use extractor::MemoryExtractor;
pub use repository::{EntityLinkRepository, MemoryRepository, SummaryRepository};
pub use store::{AddOutcome, MemoryStore};
