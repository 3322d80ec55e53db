use crate::event::LoggingEvent;
use crate::sink::EventSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hands finalized events to a background task through a bounded channel
/// so the observing thread never blocks on file I/O.
///
/// The drain task owns the sink reference; it exits (after a final flush)
/// once every sender is dropped. When the queue is full the event is
/// dropped and counted rather than blocking the wrapped call.
pub struct AsyncDispatcher {
    sender: mpsc::Sender<LoggingEvent>,
    /// Total events offered to the queue.
    pub total_events: AtomicU64,
    /// Successfully enqueued.
    pub enqueued_events: AtomicU64,
    /// Dropped because the queue was full.
    pub dropped_events: AtomicU64,
}

impl AsyncDispatcher {
    pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

    /// Create the dispatcher and spawn its drain task. Must run inside a
    /// tokio runtime. A minimal queue depth is enforced to avoid
    /// degenerate configurations.
    pub fn spawn(sink: Arc<dyn EventSink>, depth: usize) -> (Self, JoinHandle<()>) {
        let depth = depth.max(16);
        let (tx, mut rx) = mpsc::channel::<LoggingEvent>(depth);

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.append(&event) {
                    eprintln!("kafka-method-log: background append failed: {e}");
                }
            }
            if let Err(e) = sink.flush() {
                eprintln!("kafka-method-log: final flush failed: {e}");
            }
        });

        (
            AsyncDispatcher {
                sender: tx,
                total_events: AtomicU64::new(0),
                enqueued_events: AtomicU64::new(0),
                dropped_events: AtomicU64::new(0),
            },
            handle,
        )
    }

    /// Offer an event to the queue without blocking.
    pub fn enqueue(&self, event: LoggingEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(event) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("kafka-method-log: event queue full, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogLevel, LoggingEvent};
    use crate::sink::testing::RecordingSink;

    fn event() -> LoggingEvent {
        LoggingEvent::new("Service", "processOrder", LogLevel::Info)
    }

    #[tokio::test]
    async fn drains_queue_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, handle) = AsyncDispatcher::spawn(sink.clone(), 64);

        dispatcher.enqueue(event());
        dispatcher.enqueue(event());
        dispatcher.enqueue(event());
        assert_eq!(dispatcher.enqueued_events.load(Ordering::Relaxed), 3);

        drop(dispatcher);
        handle.await.unwrap();
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        // Current-thread runtime: the drain task cannot run until the
        // first await, so the queue fills deterministically.
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, handle) = AsyncDispatcher::spawn(sink.clone(), 16);

        for _ in 0..20 {
            dispatcher.enqueue(event());
        }
        assert_eq!(dispatcher.total_events.load(Ordering::Relaxed), 20);
        assert_eq!(dispatcher.enqueued_events.load(Ordering::Relaxed), 16);
        assert_eq!(dispatcher.dropped_events.load(Ordering::Relaxed), 4);

        drop(dispatcher);
        handle.await.unwrap();
        assert_eq!(sink.len(), 16);
    }

    #[tokio::test]
    async fn task_ends_after_senders_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, handle) = AsyncDispatcher::spawn(sink, 16);
        drop(dispatcher);
        handle.await.unwrap();
    }
}
