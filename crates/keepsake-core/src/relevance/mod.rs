//! Relevance ranking: temporal decay plus multi-factor scoring.

pub mod decay;
pub mod scorer;

pub use decay::DecayModel;
pub use scorer::{
    QueryContext, RelevanceScorer, RetrievalOptions, ScoredMemory, build_memory_context,
    select_for_budget,
};
