//! Chronicle Pipeline: the write path and the replay path.
//!
//! Commands flow through the [`processor::CommandProcessor`], which folds
//! current state, appends the resulting events and hands them to the
//! [`publisher::EventPublisher`]. The [`replay::ReplayCoordinator`] re-drives
//! stored events through the same publisher in replay mode, and the
//! [`outbox::OutboxRelay`] finishes publications that a crash or an
//! exhausted retry left pending.

pub mod digest;
pub mod handlers;
pub mod locks;
pub mod outbox;
pub mod processor;
pub mod publisher;
pub mod replay;
pub mod retry;
