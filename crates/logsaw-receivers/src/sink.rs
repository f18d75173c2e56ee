use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use logsaw_logs::EventContainer;
use logsaw_types::LogEvent;

/// Entry point through which receivers hand events to a container.
///
/// Explicitly constructed and cloned into every receiver that needs it.
#[derive(Clone)]
pub struct EventSink {
    container: EventContainer,
    published: Arc<AtomicU64>,
}

impl EventSink {
    pub fn new(container: EventContainer) -> Self {
        Self {
            container,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Store one event; returns whether it is visible under the display rule
    pub fn publish(&self, event: LogEvent) -> bool {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.container.add_event(event)
    }

    /// Store a batch; returns how many of its events are visible
    pub fn publish_batch(&self, events: Vec<LogEvent>) -> usize {
        self.published
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        self.container.add_events(events)
    }

    /// Push an out-of-band row-count notification
    pub fn flush(&self) {
        self.container.notify_count_listeners();
    }

    /// Events published through this sink and its clones
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn container(&self) -> &EventContainer {
        &self.container
    }
}
