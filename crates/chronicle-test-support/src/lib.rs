//! Shared test doubles for the Chronicle event-sourced write pipeline.

mod audit;
mod clock;
mod fixtures;
mod handler;
mod ids;
mod notifier;
mod repository;

pub use audit::FailingAuditStore;
pub use clock::FixedClock;
pub use fixtures::stored_event;
pub use handler::{FailingHandler, RecordingHandler};
pub use ids::SequentialIds;
pub use notifier::{FailingNotifier, RecordingNotifier};
pub use repository::{FailingEventLog, StaticEventLog};
