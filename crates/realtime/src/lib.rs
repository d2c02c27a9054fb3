//! Per-bot topic fan-out for handoff console sessions.
//!
//! The [`Broadcaster`] decouples the assignment engine's commit path from
//! slow consumers: `publish` never blocks, and each subscriber reads from a
//! bounded queue. A subscriber that falls too far behind loses the oldest
//! events and is told how many it missed, so it can resync from the store
//! instead of holding up everyone else.
//!
//! Delivery is at-least-once in per-topic publish order. There is no replay:
//! a session that reconnects starts from the events published after it
//! subscribed and re-queries the store for current state.
//!
//! # Example
//!
//! ```
//! use realtime_bus::{Broadcaster, Event};
//!
//! # async fn example() {
//! let bus = Broadcaster::default();
//! let mut sub = bus.subscribe("support-bot");
//!
//! bus.publish("support-bot", Event::agent_status_changed(&serde_json::json!({
//!     "id": "agent-1",
//!     "online": true,
//! })));
//!
//! let event = sub.recv().await.unwrap();
//! assert_eq!(event.resource, "agent");
//! # }
//! ```

mod event;

pub use event::Event;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default per-subscriber queue depth.
const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Errors surfaced to a subscriber.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecvError {
    /// The subscriber fell behind and the oldest `skipped` events were
    /// dropped. The stream continues; the caller should resync from the
    /// store before trusting its local view again.
    #[error("subscriber lagged, {skipped} events dropped; resync required")]
    Lagged { skipped: u64 },

    /// The bus was dropped; no more events will arrive.
    #[error("topic closed")]
    Closed,
}

struct Topic {
    tx: broadcast::Sender<Event>,
    next_seq: u64,
}

struct Inner {
    capacity: usize,
    topics: Mutex<HashMap<String, Topic>>,
}

/// Publish/subscribe bus with one bounded channel per bot topic.
///
/// Cheap to clone; all clones share the same topics.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl Broadcaster {
    /// Create a bus whose per-subscriber queues hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                topics: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Publish an event on a bot's topic, returning the assigned sequence.
    ///
    /// Never blocks. Publishing with no subscribers is fine; the event is
    /// simply dropped and the sequence still advances.
    pub fn publish(&self, bot_id: &str, mut event: Event) -> u64 {
        let mut topics = self.lock_topics();
        let capacity = self.inner.capacity;
        let topic = topics
            .entry(bot_id.to_string())
            .or_insert_with(|| new_topic(capacity));

        let seq = topic.next_seq;
        topic.next_seq += 1;
        event.seq = seq;

        trace!(
            bot_id = %bot_id,
            seq,
            resource = event.resource,
            kind = event.kind,
            subscribers = topic.tx.receiver_count(),
            "publishing event"
        );

        // Err here only means no live subscribers.
        let _ = topic.tx.send(event);
        seq
    }

    /// Subscribe to a bot's topic, receiving events published from now on.
    pub fn subscribe(&self, bot_id: &str) -> Subscription {
        let mut topics = self.lock_topics();
        let capacity = self.inner.capacity;
        let topic = topics
            .entry(bot_id.to_string())
            .or_insert_with(|| new_topic(capacity));

        debug!(bot_id = %bot_id, "new topic subscription");
        Subscription {
            rx: topic.tx.subscribe(),
        }
    }

    /// Number of live subscribers on a bot's topic.
    pub fn subscriber_count(&self, bot_id: &str) -> usize {
        self.lock_topics()
            .get(bot_id)
            .map(|t| t.tx.receiver_count())
            .unwrap_or(0)
    }

    fn lock_topics(&self) -> std::sync::MutexGuard<'_, HashMap<String, Topic>> {
        // Held only for map lookup and a non-blocking send.
        match self.inner.topics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn new_topic(capacity: usize) -> Topic {
    let (tx, _) = broadcast::channel(capacity);
    Topic { tx, next_seq: 0 }
}

/// One session's view of a bot topic. Dropping it releases the queue.
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Wait for the next event.
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Err(RecvError::Lagged { skipped })
            }
            Err(broadcast::error::RecvError::Closed) => Err(RecvError::Closed),
        }
    }

    /// Take an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marker(n: u64) -> Event {
        Event::conversation_message(&json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = Broadcaster::default();
        let mut sub = bus.subscribe("bot-1");

        for n in 0..5 {
            bus.publish("bot-1", marker(n));
        }

        for n in 0..5 {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.seq, n);
            assert_eq!(event.payload["n"], n);
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = Broadcaster::default();
        let mut sub_a = bus.subscribe("bot-a");
        let mut sub_b = bus.subscribe("bot-b");

        bus.publish("bot-a", marker(1));

        assert_eq!(sub_a.recv().await.unwrap().payload["n"], 1);
        assert!(sub_b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest_and_is_flagged() {
        let bus = Broadcaster::new(2);
        let mut sub = bus.subscribe("bot-1");

        for n in 0..5 {
            bus.publish("bot-1", marker(n));
        }

        // Oldest three were dropped; the subscriber is told to resync.
        let err = sub.recv().await.unwrap_err();
        assert_eq!(err, RecvError::Lagged { skipped: 3 });

        // Stream continues from the oldest retained event.
        assert_eq!(sub.recv().await.unwrap().seq, 3);
        assert_eq!(sub.recv().await.unwrap().seq, 4);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_advances_seq() {
        let bus = Broadcaster::default();

        assert_eq!(bus.publish("bot-1", marker(0)), 0);
        assert_eq!(bus.publish("bot-1", marker(1)), 1);

        // A late subscriber gets no replay.
        let mut sub = bus.subscribe("bot-1");
        assert!(sub.try_recv().is_none());

        assert_eq!(bus.publish("bot-1", marker(2)), 2);
        assert_eq!(sub.recv().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_dropped_subscription_releases_queue() {
        let bus = Broadcaster::default();
        let sub = bus.subscribe("bot-1");
        assert_eq!(bus.subscriber_count("bot-1"), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count("bot-1"), 0);

        // Publishing afterwards is harmless.
        bus.publish("bot-1", marker(0));
    }
}
