//! Text-completion port for the extraction pipeline.

pub mod box_provider;
pub mod provider;

pub use box_provider::BoxTextCompletion;
pub use provider::TextCompletion;
