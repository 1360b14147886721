//! Event publication.

pub mod bus;

pub use bus::EventBus;
