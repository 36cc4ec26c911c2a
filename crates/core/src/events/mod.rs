//! Per-operation event delivery.
//!
//! Every operation gets its own bounded channel. The supervisor task holds
//! the [`Subscriber`] end and the caller holds the [`OperationSubscription`]
//! end, so events of one operation keep the order they were produced in
//! and a slow reader slows down only its own worker.

use ace_protocol::config_models::EventSettings;
use ace_protocol::ipc::{Event, OperationOutcome, WarningLevel};
use ace_protocol::operation_models::OperationKind;
use ace_protocol::progress_models::ProgressFrame;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;
use uuid::Uuid;

/// Creates the channel pair for each new operation.
#[derive(Debug, Clone)]
pub struct EventRouter {
    capacity: usize,
}

impl EventRouter {
    pub fn new(settings: &EventSettings) -> Self {
        Self {
            capacity: settings.channel_capacity.max(1),
        }
    }

    pub fn open(
        &self,
        operation_id: Uuid,
        kind: OperationKind,
    ) -> (Subscriber, OperationSubscription) {
        let (tx, rx) = mpsc::channel(self.capacity);
        (
            Subscriber {
                operation_id,
                kind,
                tx,
                pending: VecDeque::new(),
                backlog_limit: self.capacity,
                resolved: false,
                detached: false,
            },
            OperationSubscription {
                operation_id,
                kind,
                rx,
            },
        )
    }
}

/// Producer side of one operation's events.
///
/// Stamps the operation id on every event and emits nothing after
/// `Resolved`. Emitting never waits: events the channel cannot take yet are
/// queued in order and handed over by [`deliver`](Self::deliver), so the
/// owner can keep watching its deadlines while a reader is slow.
#[derive(Debug)]
pub struct Subscriber {
    operation_id: Uuid,
    kind: OperationKind,
    tx: mpsc::Sender<Event>,
    /// Events not yet accepted by the channel, oldest first.
    pending: VecDeque<Event>,
    /// Queue length at which the producer should stop reading its source.
    backlog_limit: usize,
    resolved: bool,
    detached: bool,
}

impl Subscriber {
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Events are waiting for the reader.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The reader has fallen a full channel behind.
    pub fn is_backlogged(&self) -> bool {
        self.pending.len() >= self.backlog_limit
    }

    pub fn started(&mut self) {
        let event = Event::Started {
            operation_id: self.operation_id,
            kind: self.kind,
        };
        self.emit(event);
    }

    pub fn chunk(&mut self, text: String) {
        let event = Event::Chunk {
            operation_id: self.operation_id,
            text,
        };
        self.emit(event);
    }

    pub fn progress(&mut self, frame: ProgressFrame, synthetic: bool) {
        let event = Event::Progress {
            operation_id: self.operation_id,
            kind: self.kind,
            frame,
            synthetic,
        };
        self.emit(event);
    }

    pub fn warning(&mut self, level: WarningLevel, message: impl Into<String>) {
        let event = Event::Warning {
            operation_id: self.operation_id,
            level,
            message: message.into(),
        };
        self.emit(event);
    }

    /// Emit the terminal event. Returns false if one was already emitted.
    pub fn resolve(&mut self, outcome: OperationOutcome) -> bool {
        if self.resolved {
            return false;
        }
        let event = Event::Resolved {
            operation_id: self.operation_id,
            kind: self.kind,
            outcome,
        };
        self.emit(event);
        self.resolved = true;
        true
    }

    /// Hand the oldest queued event to the reader, waiting for room.
    ///
    /// Cancel safe: an event leaves the queue only once the channel has
    /// accepted it.
    pub async fn deliver(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let closed = match self.tx.reserve().await {
            Ok(permit) => {
                if let Some(event) = self.pending.pop_front() {
                    permit.send(event);
                }
                false
            }
            Err(_) => true,
        };
        if closed {
            self.detach();
        }
    }

    /// Deliver every queued event.
    pub async fn deliver_all(&mut self) {
        while self.has_pending() {
            self.deliver().await;
        }
    }

    fn emit(&mut self, event: Event) {
        if self.resolved || self.detached {
            return;
        }
        if !self.pending.is_empty() {
            self.pending.push_back(event);
            return;
        }
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => self.pending.push_back(event),
            Err(TrySendError::Closed(_)) => self.detach(),
        }
    }

    fn detach(&mut self) {
        // The operation keeps running to completion without a reader
        self.detached = true;
        self.pending.clear();
        debug!(operation_id = %self.operation_id, "Subscription dropped, discarding events");
    }
}

/// Consumer side of one operation's events.
#[derive(Debug)]
pub struct OperationSubscription {
    operation_id: Uuid,
    kind: OperationKind,
    rx: mpsc::Receiver<Event>,
}

impl OperationSubscription {
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Next event, or `None` once the operation's task has finished.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<Event> {
        ReceiverStream::new(self.rx)
    }

    /// Events up to and including `Resolved`.
    ///
    /// Unlike [`into_stream`](Self::into_stream) this ends as soon as the
    /// operation resolves, without waiting for the worker to be reaped.
    pub fn until_resolved(self) -> impl Stream<Item = Event> + Send {
        let mut rx = self.rx;
        async_stream::stream! {
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        }
    }

    /// Collect every event up to and including `Resolved`.
    pub async fn collect_until_resolved(self) -> Vec<Event> {
        self.until_resolved().collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ace_protocol::ipc::{EventChannel, FailureCategory, OperationValue};
    use ace_protocol::progress_models::Stage;

    fn router() -> EventRouter {
        EventRouter::new(&EventSettings::default())
    }

    #[tokio::test]
    async fn test_events_are_stamped_and_ordered() {
        let id = Uuid::new_v4();
        let (mut sub, subscription) = router().open(id, OperationKind::Query);

        sub.started();
        sub.chunk("Hi".to_string());
        sub.chunk(" there".to_string());
        sub.resolve(OperationOutcome::Succeeded {
            value: OperationValue::Text("Hi there".to_string()),
        });
        sub.deliver_all().await;
        drop(sub);

        let events = subscription.collect_until_resolved().await;
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.operation_id() == id));
        assert!(matches!(&events[1], Event::Chunk { text, .. } if text == "Hi"));
        assert!(matches!(&events[2], Event::Chunk { text, .. } if text == " there"));
        assert!(events[3].is_terminal());
    }

    #[tokio::test]
    async fn test_nothing_after_resolved() {
        let (mut sub, subscription) = router().open(Uuid::new_v4(), OperationKind::DownloadModel);

        assert!(sub.resolve(OperationOutcome::failed(FailureCategory::Cancelled, "stop")));
        assert!(!sub.resolve(OperationOutcome::TimedOut { after_secs: 1 }));
        sub.progress(ProgressFrame::new("late", 50, Stage::Verifying), false);
        sub.warning(WarningLevel::FinalWarning, "late");
        sub.deliver_all().await;
        drop(sub);

        let events: Vec<Event> = subscription.into_stream().collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[tokio::test]
    async fn test_progress_channel_depends_on_kind() {
        let (mut download, mut dl_sub) = router().open(Uuid::new_v4(), OperationKind::DownloadModel);
        let (mut tune, mut tune_sub) = router().open(Uuid::new_v4(), OperationKind::StartFineTune);

        let frame = ProgressFrame::new("45%", 45, Stage::DownloadingLayers);
        download.progress(frame.clone(), false);
        tune.progress(frame, false);

        assert_eq!(
            dl_sub.recv().await.unwrap().channel(),
            EventChannel::DownloadProgress
        );
        assert_eq!(
            tune_sub.recv().await.unwrap().channel(),
            EventChannel::FineTuneProgress
        );
    }

    #[tokio::test]
    async fn test_dropped_subscription_does_not_block() {
        let (mut sub, subscription) = router().open(Uuid::new_v4(), OperationKind::Query);
        drop(subscription);

        for _ in 0..1000 {
            sub.chunk("x".to_string());
        }
        assert!(!sub.has_pending());
        assert!(sub.resolve(OperationOutcome::TimedOut { after_secs: 1 }));
        sub.deliver_all().await;
    }

    #[tokio::test]
    async fn test_emitting_never_waits_for_a_slow_reader() {
        let router = EventRouter::new(&EventSettings {
            channel_capacity: 2,
        });
        let (mut sub, mut subscription) = router.open(Uuid::new_v4(), OperationKind::Query);

        for i in 0..5 {
            sub.chunk(i.to_string());
        }
        assert!(sub.has_pending());
        assert!(sub.is_backlogged());

        let reader = tokio::spawn(async move {
            let mut texts = Vec::new();
            while let Some(Event::Chunk { text, .. }) = subscription.recv().await {
                texts.push(text);
            }
            texts
        });
        sub.deliver_all().await;
        assert!(!sub.is_backlogged());
        drop(sub);

        assert_eq!(reader.await.unwrap(), vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_abandoned_delivery_keeps_the_event() {
        let router = EventRouter::new(&EventSettings {
            channel_capacity: 1,
        });
        let (mut sub, mut subscription) = router.open(Uuid::new_v4(), OperationKind::Query);

        sub.chunk("a".to_string());
        sub.chunk("b".to_string());
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), sub.deliver()).await;
        assert!(waited.is_err(), "Channel is full, delivery should wait");

        assert!(matches!(subscription.recv().await, Some(Event::Chunk { text, .. }) if text == "a"));
        sub.deliver_all().await;
        assert!(matches!(subscription.recv().await, Some(Event::Chunk { text, .. }) if text == "b"));
    }
}
