//! End-to-end scenarios: live commands, audit, notifications, replay and
//! outbox recovery wired together over the in-memory stores.

use std::sync::Arc;

use chronicle_core::audit::AuditStore;
use chronicle_core::error::DomainError;
use chronicle_core::event::StoredEvent;
use chronicle_core::id::EntityId;
use chronicle_core::projector::{Projection, fold};
use chronicle_core::repository::EventLog;
use chronicle_event_store::memory::{InMemoryAuditStore, InMemoryEventLog};
use chronicle_orders::domain::aggregates::{Order, OrderStatus};
use chronicle_orders::domain::commands::OrderCommand;
use chronicle_pipeline::digest::state_digest;
use chronicle_pipeline::handlers::audit::AuditSink;
use chronicle_pipeline::handlers::notification::NotificationHandler;
use chronicle_pipeline::handlers::snapshot::{SnapshotProjection, SnapshotStore};
use chronicle_pipeline::locks::EntityLocks;
use chronicle_pipeline::outbox::OutboxRelay;
use chronicle_pipeline::processor::{CommandProcessor, PublicationStatus};
use chronicle_pipeline::publisher::EventPublisher;
use chronicle_pipeline::replay::{ReplayCoordinator, ReplayTarget};
use chronicle_pipeline::retry::RetryPolicy;
use chronicle_test_support::{
    FixedClock, RecordingNotifier, SequentialIds, StaticEventLog, stored_event,
};
use serde_json::json;
use uuid::Uuid;

struct Harness {
    log: Arc<InMemoryEventLog>,
    audit: Arc<InMemoryAuditStore>,
    notifier: Arc<RecordingNotifier>,
    snapshots: Arc<SnapshotStore<Order>>,
    publisher: Arc<EventPublisher>,
    locks: Arc<EntityLocks>,
    processor: CommandProcessor<Order>,
    replay: ReplayCoordinator,
}

fn publisher(
    snapshots: &Arc<SnapshotStore<Order>>,
    audit: &Arc<InMemoryAuditStore>,
    notifier: &Arc<RecordingNotifier>,
) -> EventPublisher {
    EventPublisher::new()
        .with_handler(Arc::new(SnapshotProjection::new(Arc::clone(snapshots))))
        .with_handler(Arc::new(AuditSink::new(
            audit.clone(),
            Arc::new(FixedClock::standard()),
            Arc::new(SequentialIds::new()),
        )))
        .with_handler(Arc::new(NotificationHandler::new(notifier.clone())))
}

fn harness_over(log: Arc<InMemoryEventLog>) -> Harness {
    let audit = Arc::new(InMemoryAuditStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let snapshots = Arc::new(SnapshotStore::new());
    let publisher = Arc::new(publisher(&snapshots, &audit, &notifier));
    let locks = Arc::new(EntityLocks::new());
    let processor = CommandProcessor::new(
        log.clone(),
        Arc::clone(&publisher),
        Arc::clone(&locks),
        Arc::new(FixedClock::standard()),
        Arc::new(SequentialIds::new()),
    )
    .with_snapshots(Arc::clone(&snapshots))
    .with_retry(RetryPolicy::no_retry());
    let replay = ReplayCoordinator::new(log.clone(), Arc::clone(&publisher), Arc::clone(&locks));
    Harness {
        log,
        audit,
        notifier,
        snapshots,
        publisher,
        locks,
        processor,
        replay,
    }
}

fn harness() -> Harness {
    harness_over(Arc::new(InMemoryEventLog::new()))
}

fn order(id: &str) -> EntityId {
    EntityId::new(id).unwrap()
}

fn correlation(n: u128) -> Uuid {
    Uuid::from_u128(1_000 + n)
}

async fn run_order_lifecycle(h: &Harness, id: &str) -> Projection<Order> {
    let commands = [
        OrderCommand::create_order(order(id), correlation(1), "clerk", "ada"),
        OrderCommand::add_order_line(order(id), correlation(2), "clerk", "SKU-1", 2, 250),
        OrderCommand::add_order_line(order(id), correlation(3), "clerk", "SKU-2", 1, 990),
        OrderCommand::ship_order(order(id), correlation(4), "warehouse", "dhl", "TRK-1"),
    ];
    let mut last = None;
    for command in &commands {
        let outcome = h.processor.process(command).await.unwrap();
        last = Some(Projection {
            entity_id: outcome.entity_id,
            sequence: outcome.sequence,
            state: outcome.state,
        });
    }
    last.unwrap()
}

// --- scenario: create and ship, then replay ---

#[tokio::test]
async fn test_create_and_ship_then_replay_does_not_repeat_side_effects() {
    // Arrange
    let h = harness();
    let id = order("order-1");
    h.processor
        .process(&OrderCommand::create_order(id.clone(), correlation(1), "clerk", "ada"))
        .await
        .unwrap();
    let shipped = h
        .processor
        .process(&OrderCommand::ship_order(
            id.clone(),
            correlation(2),
            "warehouse",
            "dhl",
            "TRK-1",
        ))
        .await
        .unwrap();
    assert_eq!(shipped.sequence, 2);
    assert_eq!(h.audit.records_for_entity(&id).await.unwrap().len(), 2);
    assert_eq!(h.notifier.count(), 2);

    // Act
    let replayed: Projection<Order> = h.replay.replay_entity(&id).await.unwrap();

    // Assert
    assert_eq!(replayed.sequence, 2);
    assert_eq!(replayed.state, shipped.state);
    assert_eq!(replayed.state.status, OrderStatus::Shipped);
    assert_eq!(h.audit.records_for_entity(&id).await.unwrap().len(), 2);
    assert_eq!(h.notifier.count(), 2);
}

// --- scenario: gap at sequence 3 ---

#[tokio::test]
async fn test_replay_of_entity_missing_sequence_three_halts_at_two() {
    // Arrange
    let history = vec![
        stored_event("order-1", 1, "order.created", json!({ "customer": "ada" })),
        stored_event(
            "order-1",
            2,
            "order.line_added",
            json!({ "sku": "SKU-1", "quantity": 1, "unit_price_cents": 100 }),
        ),
        stored_event(
            "order-1",
            4,
            "order.shipped",
            json!({ "carrier": "dhl", "tracking_number": "TRK-1" }),
        ),
    ];
    let audit = Arc::new(InMemoryAuditStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let snapshots = Arc::new(SnapshotStore::new());
    let replay = ReplayCoordinator::new(
        Arc::new(StaticEventLog::new(history)),
        Arc::new(publisher(&snapshots, &audit, &notifier)),
        Arc::new(EntityLocks::new()),
    );

    // Act
    let result = replay.replay_entity::<Order>(&order("order-1")).await;

    // Assert
    match result {
        Err(DomainError::SequenceGap {
            entity_id,
            expected,
            found,
        }) => {
            assert_eq!(entity_id, order("order-1"));
            assert_eq!(expected, 3);
            assert_eq!(found, 4);
        }
        other => panic!("expected SequenceGap, got {other:?}"),
    }
    let reconstructed = snapshots.get(&order("order-1")).unwrap().unwrap();
    assert_eq!(reconstructed.sequence, 2);
    assert_eq!(reconstructed.state.status, OrderStatus::Placed);
    assert_eq!(reconstructed.state.lines.len(), 1);
    assert!(audit.all().unwrap().is_empty());
    assert_eq!(notifier.count(), 0);
}

// --- property: determinism ---

#[tokio::test]
async fn test_folding_the_same_history_twice_is_identical() {
    let h = harness();
    run_order_lifecycle(&h, "order-1").await;
    let events = h.log.read_events(&order("order-1"), 1).await.unwrap();

    let first = fold::<Order>(&order("order-1"), &events).unwrap();
    let second = fold::<Order>(&order("order-1"), &events).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        state_digest(&first.state).unwrap(),
        state_digest(&second.state).unwrap()
    );
}

// --- property: replay equivalence ---

#[tokio::test]
async fn test_replay_reconstructs_live_state_bit_for_bit() {
    // Arrange
    let h = harness();
    let live = run_order_lifecycle(&h, "order-1").await;

    // Act
    let replayed: Projection<Order> = h.replay.replay_entity(&order("order-1")).await.unwrap();

    // Assert
    assert_eq!(replayed, live);
    assert_eq!(
        state_digest(&replayed).unwrap(),
        state_digest(&live).unwrap()
    );
    assert_eq!(
        h.snapshots.get(&order("order-1")).unwrap(),
        Some(live)
    );
}

#[tokio::test]
async fn test_replay_to_sequence_matches_live_state_at_that_sequence() {
    // Arrange
    let h = harness();
    h.processor
        .process(&OrderCommand::create_order(order("order-1"), correlation(1), "clerk", "ada"))
        .await
        .unwrap();
    let at_two = h
        .processor
        .process(&OrderCommand::add_order_line(
            order("order-1"),
            correlation(2),
            "clerk",
            "SKU-1",
            4,
            100,
        ))
        .await
        .unwrap();
    h.processor
        .process(&OrderCommand::cancel_order(
            order("order-1"),
            correlation(3),
            "clerk",
            "duplicate",
        ))
        .await
        .unwrap();

    // Act
    let replayed: Projection<Order> = h
        .replay
        .replay_entity_to(&order("order-1"), ReplayTarget::Sequence(2))
        .await
        .unwrap();

    // Assert
    assert_eq!(replayed.state, at_two.state);
    assert_eq!(replayed.state.total_cents(), 400);
}

// --- property: no duplicate audit on replay ---

#[tokio::test]
async fn test_repeated_replays_keep_exactly_one_audit_record_per_event() {
    // Arrange
    let h = harness();
    run_order_lifecycle(&h, "order-1").await;
    run_order_lifecycle(&h, "order-2").await;

    // Act
    for _ in 0..3 {
        h.replay.replay_entity::<Order>(&order("order-1")).await.unwrap();
        let summary = h.replay.replay_all(0).await.unwrap();
        assert_eq!(summary.events_replayed, 8);
        assert!(summary.halted.is_empty());
    }

    // Assert
    let events = h.log.read_all(0, 100).await.unwrap();
    assert_eq!(events.len(), 8);
    for recorded in &events {
        assert_eq!(h.audit.count_for_event(recorded.event.event_id).unwrap(), 1);
    }
    assert_eq!(h.notifier.count(), 8);
}

// --- property: sequence gap-freedom ---

#[tokio::test]
async fn test_concurrent_commands_leave_gap_free_sequences() {
    // Arrange
    let h = Arc::new(harness());
    for n in 0..4 {
        h.processor
            .process(&OrderCommand::create_order(
                order(&format!("order-{n}")),
                correlation(n),
                "clerk",
                "ada",
            ))
            .await
            .unwrap();
    }

    // Act
    let mut tasks = Vec::new();
    for n in 0..4_u128 {
        for line in 0..5_u32 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                h.processor
                    .process(&OrderCommand::add_order_line(
                        order(&format!("order-{n}")),
                        correlation(n * 10 + u128::from(line)),
                        "clerk",
                        format!("SKU-{line}"),
                        1,
                        100,
                    ))
                    .await
                    .map(|_| ())
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Assert
    for n in 0..4 {
        let events = h
            .log
            .read_events(&order(&format!("order-{n}")), 1)
            .await
            .unwrap();
        let sequences: Vec<i64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (1..=6).collect::<Vec<i64>>());
    }
}

// --- property: concurrency conflict detection ---

#[tokio::test]
async fn test_two_commands_with_the_same_expected_sequence_admit_one() {
    // Arrange
    let log = Arc::new(InMemoryEventLog::new());
    let first = harness_over(log.clone());
    let second = harness_over(log.clone());
    first
        .processor
        .process(&OrderCommand::create_order(order("order-1"), correlation(1), "clerk", "ada"))
        .await
        .unwrap();
    let mut a = OrderCommand::add_order_line(order("order-1"), correlation(2), "clerk", "SKU-A", 1, 100);
    a.metadata = a.metadata.expecting(1);
    let mut b = OrderCommand::add_order_line(order("order-1"), correlation(3), "clerk", "SKU-B", 1, 100);
    b.metadata = b.metadata.expecting(1);

    // Act
    let (ra, rb) = tokio::join!(first.processor.process(&a), second.processor.process(&b));

    // Assert
    let results = [ra.map(|_| ()), rb.map(|_| ())];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(DomainError::ConcurrencyConflict { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(log.read_events(&order("order-1"), 1).await.unwrap().len(), 2);
}

// --- outbox recovery ---

#[tokio::test]
async fn test_relay_completes_publication_interrupted_after_append() {
    // Arrange: an event made durable by a process that died before publishing.
    let h = harness();
    let stranded = StoredEvent {
        actor: "clerk".to_owned(),
        ..stored_event("order-9", 1, "order.created", json!({ "customer": "ada" }))
    };
    h.log
        .append_events(&order("order-9"), 0, std::slice::from_ref(&stranded))
        .await
        .unwrap();
    let relay = OutboxRelay::new(
        h.log.clone(),
        Arc::clone(&h.publisher),
        Arc::clone(&h.locks),
        RetryPolicy::no_retry(),
        10,
    );

    // Act
    let report = relay.drain().await.unwrap();
    let again = relay.drain().await.unwrap();

    // Assert
    assert_eq!(report.delivered, 1);
    assert_eq!(again.delivered, 0);
    assert_eq!(h.audit.count_for_event(stranded.event_id).unwrap(), 1);
    assert_eq!(h.notifier.sent(), vec![stranded.event_id]);
    assert_eq!(
        h.snapshots.get(&order("order-9")).unwrap().map(|p| p.sequence),
        Some(1)
    );
}

#[tokio::test]
async fn test_command_outcome_reports_delivery() {
    let h = harness();

    let outcome = h
        .processor
        .process(&OrderCommand::create_order(order("order-1"), correlation(1), "clerk", "ada"))
        .await
        .unwrap();

    assert_eq!(
        outcome.publication,
        PublicationStatus::Delivered {
            failed_handlers: vec![]
        }
    );
    assert!(h.log.pending_publications(0, 10).await.unwrap().is_empty());
}
