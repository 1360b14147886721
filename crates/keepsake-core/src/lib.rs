//! Keepsake core: extraction, storage, relevance, and proactive recall
//! for a conversational companion's long-term memory.
//!
//! This crate is backend-agnostic. The text-completion collaborator is a
//! trait ([`llm::TextCompletion`]), persistence is a set of repository
//! traits ([`memory::repository`]), and everything is owned by a
//! per-conversation [`session::MemorySession`].

pub mod entity;
pub mod event;
pub mod index;
pub mod llm;
pub mod memory;
pub mod proactive;
pub mod relevance;
pub mod session;

pub use session::{MemorySession, SessionError, SessionOptions};
