//! Helpers over the event sequence of one operation.

use ace_core::events::OperationSubscription;
use ace_protocol::ipc::{Event, OperationOutcome, WarningLevel};
use ace_protocol::progress_models::ProgressFrame;
use std::time::Duration;
use tokio_stream::StreamExt;

/// Collect every event until the operation's task has finished.
///
/// The channel closes only after the worker has been reaped and the
/// operation removed from the registry.
pub async fn drain(subscription: OperationSubscription) -> Vec<Event> {
    tokio::time::timeout(
        Duration::from_secs(30),
        subscription.into_stream().collect::<Vec<_>>(),
    )
    .await
    .expect("Operation did not finish in time")
}

/// Assert the invariants every event sequence must hold.
///
/// 1. `Started` comes first
/// 2. Exactly one `Resolved`, and it comes last
/// 3. Every event belongs to the same operation
pub fn assert_event_sequence(events: &[Event]) {
    assert!(!events.is_empty(), "Event sequence is empty");
    assert!(
        matches!(events[0], Event::Started { .. }),
        "First event should be Started, got: {:?}",
        events[0]
    );

    let resolved = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(resolved, 1, "Expected exactly one Resolved event: {events:?}");
    assert!(
        events.last().is_some_and(Event::is_terminal),
        "Resolved should be last: {events:?}"
    );

    let id = events[0].operation_id();
    assert!(events.iter().all(|e| e.operation_id() == id));
}

pub fn outcome(events: &[Event]) -> &OperationOutcome {
    events
        .iter()
        .find_map(|e| match e {
            Event::Resolved { outcome, .. } => Some(outcome),
            _ => None,
        })
        .expect("No Resolved event")
}

/// Concatenation of every chat chunk.
#[allow(dead_code)]
pub fn chunk_text(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Chunk { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Progress frames with their `synthetic` flag, in order.
#[allow(dead_code)]
pub fn frames(events: &[Event]) -> Vec<(ProgressFrame, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress {
                frame, synthetic, ..
            } => Some((frame.clone(), *synthetic)),
            _ => None,
        })
        .collect()
}

#[allow(dead_code)]
pub fn warnings(events: &[Event]) -> Vec<WarningLevel> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Warning { level, .. } => Some(*level),
            _ => None,
        })
        .collect()
}
