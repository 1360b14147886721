//! Keyword and term-frequency indexing over the memory corpus.
//!
//! The index is a cache, rebuilt wholesale whenever the memory count
//! changes; rebuilding is a pure function of the full corpus, so no
//! incremental bookkeeping or locking is needed. The session context owns
//! the cached instance.

pub mod keywords;

pub use keywords::{HeuristicTermExtractor, KeywordIndex, TermExtractor, jaccard};
