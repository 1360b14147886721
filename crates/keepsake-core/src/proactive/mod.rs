//! Proactive memory surfacing.

pub mod controller;
pub mod evaluator;

pub use controller::{ProactiveAction, ProactiveController};
pub use evaluator::spawn_evaluator;
