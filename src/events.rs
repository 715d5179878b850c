//! Cross-event bus
//!
//! In-process publish log fed by every domain mutation. Events land in a
//! bounded ring buffer, are persisted in full on every publish, and fan out
//! to an optional notification sink. Publishing never blocks on, and never
//! fails because of, sink delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::store::mirror::JsonMirror;

/// Ring buffer capacity; the oldest event is evicted beyond this
pub const EVENT_BUFFER_CAP: usize = 50;
/// How many events `list()` returns
pub const EVENT_LIST_LIMIT: usize = 20;

const EVENTS_FILE: &str = "cross-events";

/// A lightweight notification record describing a domain mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
    pub at: DateTime<Utc>,
}

/// Receives every published event; must never block the publisher
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &CrossEvent);
}

/// Bounded publish log with full-buffer persistence per publish
pub struct CrossEventBus {
    events: Mutex<VecDeque<CrossEvent>>,
    mirror: JsonMirror,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl CrossEventBus {
    pub fn new(mirror: JsonMirror) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(EVENT_BUFFER_CAP)),
            mirror,
            sink: Mutex::new(None),
        }
    }

    /// Attach the notification sink (chat system messages)
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock().expect("event sink poisoned") = Some(sink);
    }

    /// Append an event, persist the buffer, notify the sink
    pub async fn publish(&self, kind: &str, message: &str, payload: Value) -> CrossEvent {
        let event = CrossEvent {
            kind: kind.to_string(),
            message: message.to_string(),
            payload,
            at: Utc::now(),
        };

        let snapshot: Vec<CrossEvent> = {
            let mut events = self.events.lock().expect("event buffer poisoned");
            events.push_back(event.clone());
            while events.len() > EVENT_BUFFER_CAP {
                events.pop_front();
            }
            events.iter().cloned().collect()
        };

        if let Err(err) = self.mirror.write(EVENTS_FILE, &snapshot).await {
            warn!("Cross-event persistence failed: {err}");
        }

        let sink = self.sink.lock().expect("event sink poisoned").clone();
        if let Some(sink) = sink {
            sink.on_event(&event);
        }

        event
    }

    /// Most recent events, newest first
    pub fn list(&self) -> Vec<CrossEvent> {
        let events = self.events.lock().expect("event buffer poisoned");
        events
            .iter()
            .rev()
            .take(EVENT_LIST_LIMIT)
            .cloned()
            .collect()
    }

    /// Current buffer occupancy
    pub fn len(&self) -> usize {
        self.events.lock().expect("event buffer poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    async fn fresh_bus(dir: &std::path::Path) -> CrossEventBus {
        CrossEventBus::new(JsonMirror::open(dir).await.unwrap())
    }

    #[tokio::test]
    async fn test_ring_buffer_bound() {
        let dir = tempdir().unwrap();
        let bus = fresh_bus(dir.path()).await;

        for i in 0..60 {
            bus.publish("test", &format!("event {i}"), json!({})).await;
        }

        assert_eq!(bus.len(), EVENT_BUFFER_CAP);
        let listed = bus.list();
        assert_eq!(listed.len(), EVENT_LIST_LIMIT);
        // Newest first: the last published event leads the listing.
        assert_eq!(listed[0].message, "event 59");
        assert_eq!(listed[EVENT_LIST_LIMIT - 1].message, "event 40");
    }

    #[tokio::test]
    async fn test_buffer_persisted_on_publish() {
        let dir = tempdir().unwrap();
        let bus = fresh_bus(dir.path()).await;
        bus.publish("dream", "recorded", json!({ "id": "dream-1" })).await;

        let raw = tokio::fs::read_to_string(dir.path().join("cross-events.json"))
            .await
            .unwrap();
        let persisted: Vec<CrossEvent> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].kind, "dream");
    }

    #[tokio::test]
    async fn test_sink_receives_every_event() {
        struct Counter(AtomicUsize);
        impl EventSink for Counter {
            fn on_event(&self, _event: &CrossEvent) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dir = tempdir().unwrap();
        let bus = fresh_bus(dir.path()).await;
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        bus.set_sink(counter.clone());

        for _ in 0..3 {
            bus.publish("backlog", "added", json!({})).await;
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }
}
