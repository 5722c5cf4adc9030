//! Built-in event handlers.

pub mod audit;
pub mod notification;
pub mod snapshot;
