//! Entity extraction and clustering.

pub mod clusterer;
pub mod extractor;

pub use clusterer::{EntityClusterer, entity_id};
pub use extractor::{EntityExtractor, PatternEntityExtractor};
