//! Live notification channel
//!
//! An unbounded FIFO queue with exactly one draining consumer. The scheduler
//! and the submission handler publish; the `/notifications/stream` handler
//! attaches as the consumer. While the queue is empty the consumer yields a
//! keep-alive frame every `keepalive` period so the stream never goes silent.
//!
//! Publishing never blocks and never fails. Events published while no
//! consumer is attached stay queued until one attaches; nothing bounds
//! that backlog.

use apollo_common::NotificationEvent;
use axum::response::sse::Event;
use futures::stream::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// SSE comment text used for idle frames
pub const KEEPALIVE_COMMENT: &str = "keep-alive";

/// One frame of the notification stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationFrame {
    Event(NotificationEvent),
    KeepAlive,
}

impl NotificationFrame {
    /// Wire form: `data: <json>\n\n` or `: keep-alive\n\n`
    pub fn to_sse_text(&self) -> String {
        match self {
            NotificationFrame::Event(event) => format!("data: {}\n\n", event_json(event)),
            NotificationFrame::KeepAlive => format!(": {}\n\n", KEEPALIVE_COMMENT),
        }
    }

    pub fn into_sse_event(self) -> Event {
        match self {
            NotificationFrame::Event(event) => Event::default().data(event_json(&event)),
            NotificationFrame::KeepAlive => Event::default().comment(KEEPALIVE_COMMENT),
        }
    }
}

fn event_json(event: &NotificationEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| {
        warn!("Failed to serialize notification: {}", e);
        "{}".to_string()
    })
}

/// Shared publish side plus the single consumer slot
pub struct NotificationChannel {
    tx: UnboundedSender<NotificationEvent>,
    rx: Arc<Mutex<UnboundedReceiver<NotificationEvent>>>,
    keepalive: Duration,
    published: AtomicU64,
}

impl NotificationChannel {
    pub fn new(keepalive: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            keepalive,
            published: AtomicU64::new(0),
        }
    }

    /// Queue an event for the stream consumer
    pub fn publish(&self, event: NotificationEvent) {
        debug!(title = %event.title, "Queueing notification");
        // The receiver lives as long as self, so send cannot fail here
        if self.tx.send(event).is_ok() {
            self.published.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Attach as the single consumer
    ///
    /// Returns `None` while another consumer holds the queue. Dropping the
    /// returned consumer releases the queue for the next one.
    pub fn attach(&self) -> Option<NotificationConsumer> {
        let rx = Arc::clone(&self.rx).try_lock_owned().ok()?;
        Some(NotificationConsumer {
            rx,
            keepalive: self.keepalive,
        })
    }

    pub fn is_attached(&self) -> bool {
        self.rx.try_lock().is_err()
    }

    /// Total events published since startup
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// Exclusive draining end of the notification queue
pub struct NotificationConsumer {
    rx: OwnedMutexGuard<UnboundedReceiver<NotificationEvent>>,
    keepalive: Duration,
}

impl NotificationConsumer {
    /// Next queued event, or a keep-alive after one idle period
    pub async fn next_frame(&mut self) -> NotificationFrame {
        match tokio::time::timeout(self.keepalive, self.rx.recv()).await {
            Ok(Some(event)) => NotificationFrame::Event(event),
            Ok(None) => {
                tokio::time::sleep(self.keepalive).await;
                NotificationFrame::KeepAlive
            }
            Err(_) => NotificationFrame::KeepAlive,
        }
    }

    /// Endless frame stream; the queue is released when the stream is dropped
    pub fn into_stream(mut self) -> impl Stream<Item = NotificationFrame> {
        async_stream::stream! {
            loop {
                yield self.next_frame().await;
            }
        }
    }
}
