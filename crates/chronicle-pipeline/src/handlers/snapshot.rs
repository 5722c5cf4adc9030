//! Snapshot cache and the projection handler that keeps it current.
//!
//! A snapshot is a `Projection<A>`: materialized state plus the last applied
//! sequence. The command processor loads "snapshot + tail" instead of
//! refolding from sequence 1. The cache is never a source of truth; losing or
//! invalidating an entry only costs a full fold.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::DomainError;
use chronicle_core::event::StoredEvent;
use chronicle_core::handler::{DispatchMode, EventHandler, HandlerRole};
use chronicle_core::id::EntityId;
use chronicle_core::projector::{Projection, apply_stored};
use tracing::warn;

fn poisoned() -> DomainError {
    DomainError::Infrastructure("snapshot cache lock poisoned".into())
}

/// In-memory snapshot cache for one aggregate type.
#[derive(Debug)]
pub struct SnapshotStore<A> {
    entries: RwLock<HashMap<EntityId, Projection<A>>>,
}

impl<A> Default for SnapshotStore<A> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<A: Aggregate> SnapshotStore<A> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached projection for an entity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the cache lock is poisoned.
    pub fn get(&self, entity_id: &EntityId) -> Result<Option<Projection<A>>, DomainError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(entity_id).cloned())
    }

    /// Stores a projection, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the cache lock is poisoned.
    pub fn put(&self, projection: Projection<A>) -> Result<(), DomainError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(projection.entity_id.clone(), projection);
        Ok(())
    }

    /// Drops the entry for an entity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the cache lock is poisoned.
    pub fn invalidate(&self, entity_id: &EntityId) -> Result<(), DomainError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(entity_id);
        Ok(())
    }
}

/// Extends cached snapshots with every dispatched event, live or replayed.
///
/// - an event at sequence 1 starts the entity over from its initial state,
///   so a full replay rebuilds the entry from scratch;
/// - an event at or below the cached watermark was already applied and is
///   skipped;
/// - an event beyond the watermark plus one means the cache missed events;
///   the entry is dropped and the next load refolds from the log.
///
/// Projector errors (unknown event type, malformed payload) are returned,
/// and the handler's role makes them fatal to the publish call.
pub struct SnapshotProjection<A> {
    store: Arc<SnapshotStore<A>>,
    name: String,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> SnapshotProjection<A> {
    /// Creates a handler maintaining `store`.
    #[must_use]
    pub fn new(store: Arc<SnapshotStore<A>>) -> Self {
        Self {
            store,
            name: format!("snapshot:{}", A::ENTITY_TYPE),
            _aggregate: PhantomData,
        }
    }
}

#[async_trait]
impl<A: Aggregate> EventHandler for SnapshotProjection<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> HandlerRole {
        HandlerRole::StateProjection
    }

    async fn handle(&self, event: &StoredEvent, _mode: DispatchMode) -> Result<(), DomainError> {
        if event.entity_type != A::ENTITY_TYPE {
            return Ok(());
        }

        let base = if event.sequence == 1 {
            Projection::initial(event.entity_id.clone())
        } else {
            match self.store.get(&event.entity_id)? {
                None => return Ok(()),
                Some(cached) if event.sequence <= cached.sequence => return Ok(()),
                Some(cached) if event.sequence > cached.sequence + 1 => {
                    warn!(
                        entity_id = %event.entity_id,
                        cached = cached.sequence,
                        found = event.sequence,
                        "snapshot missed events; invalidating"
                    );
                    return self.store.invalidate(&event.entity_id);
                }
                Some(cached) => cached,
            }
        };

        self.store.put(apply_stored(base, event)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_orders::domain::aggregates::{Order, OrderStatus};
    use chronicle_test_support::stored_event;
    use serde_json::json;

    fn entity() -> EntityId {
        EntityId::new("order-1").unwrap()
    }

    fn created() -> StoredEvent {
        stored_event("order-1", 1, "order.created", json!({ "customer": "ada" }))
    }

    fn line(sequence: i64) -> StoredEvent {
        stored_event(
            "order-1",
            sequence,
            "order.line_added",
            json!({ "sku": "SKU-1", "quantity": 1, "unit_price_cents": 500 }),
        )
    }

    fn handler() -> (Arc<SnapshotStore<Order>>, SnapshotProjection<Order>) {
        let store = Arc::new(SnapshotStore::new());
        let handler = SnapshotProjection::new(Arc::clone(&store));
        (store, handler)
    }

    #[tokio::test]
    async fn test_events_extend_the_snapshot_in_any_mode() {
        // Arrange
        let (store, handler) = handler();

        // Act
        handler.handle(&created(), DispatchMode::Live).await.unwrap();
        handler.handle(&line(2), DispatchMode::Replay).await.unwrap();

        // Assert
        let snapshot = store.get(&entity()).unwrap().unwrap();
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.state.status, OrderStatus::Placed);
        assert_eq!(snapshot.state.lines.len(), 1);
        assert_eq!(handler.name(), "snapshot:order");
    }

    #[tokio::test]
    async fn test_sequence_one_resets_the_snapshot() {
        let (store, handler) = handler();
        handler.handle(&created(), DispatchMode::Live).await.unwrap();
        handler.handle(&line(2), DispatchMode::Live).await.unwrap();

        handler.handle(&created(), DispatchMode::Replay).await.unwrap();

        let snapshot = store.get(&entity()).unwrap().unwrap();
        assert_eq!(snapshot.sequence, 1);
        assert!(snapshot.state.lines.is_empty());
    }

    #[tokio::test]
    async fn test_already_applied_event_is_skipped() {
        let (store, handler) = handler();
        handler.handle(&created(), DispatchMode::Live).await.unwrap();
        let second = line(2);
        handler.handle(&second, DispatchMode::Live).await.unwrap();

        handler.handle(&second, DispatchMode::Live).await.unwrap();

        let snapshot = store.get(&entity()).unwrap().unwrap();
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.state.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_missed_events_invalidate_the_snapshot() {
        let (store, handler) = handler();
        handler.handle(&created(), DispatchMode::Live).await.unwrap();

        handler.handle(&line(3), DispatchMode::Live).await.unwrap();

        assert!(store.get(&entity()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_uncached_entity_is_left_uncached() {
        let (store, handler) = handler();

        handler.handle(&line(2), DispatchMode::Live).await.unwrap();

        assert!(store.get(&entity()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_returned() {
        // Arrange
        let (store, handler) = handler();
        handler.handle(&created(), DispatchMode::Live).await.unwrap();
        let unknown = stored_event("order-1", 2, "order.refunded", json!({}));

        // Act
        let result = handler.handle(&unknown, DispatchMode::Replay).await;

        // Assert
        match result {
            Err(DomainError::UnknownEventType { event_type, .. }) => {
                assert_eq!(event_type, "order.refunded");
            }
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
        assert_eq!(store.get(&entity()).unwrap().unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_other_aggregate_types_are_ignored() {
        let (store, handler) = handler();
        let mut foreign = created();
        foreign.entity_type = "invoice".to_owned();

        handler.handle(&foreign, DispatchMode::Live).await.unwrap();

        assert!(store.get(&entity()).unwrap().is_none());
    }
}
