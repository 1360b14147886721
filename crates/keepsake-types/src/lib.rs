//! Shared domain types for Keepsake.
//!
//! Pure data: memory records, entity links, conversation summaries,
//! configuration, events, and the error taxonomy. No business logic and
//! no IO; those live in `keepsake-core` and `keepsake-infra`.

pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod page;
pub mod summary;
