//! In-memory relay pool.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::nostr::{Event, Filter};
use crate::relay::{RelayPool, RelaySubscription, SubscriptionHandler};
use crate::{PayrailError, Result};

struct Subscription {
    relays: Vec<String>,
    filters: Vec<Filter>,
    handler: Arc<dyn SubscriptionHandler>,
}

#[derive(Default)]
struct PoolState {
    events: HashMap<String, Vec<Event>>,
    subscriptions: HashMap<u64, Subscription>,
    next_id: u64,
    publish_attempts: usize,
}

/// A relay pool held entirely in memory.
///
/// Published events are stored per relay and pushed synchronously to every
/// open subscription covering that relay. Relays can be scripted to reject
/// publishes or to never signal end of stored events.
#[derive(Clone, Default)]
pub struct MemoryRelayPool {
    state: Arc<Mutex<PoolState>>,
    rejecting: HashSet<String>,
    silent: HashSet<String>,
}

impl MemoryRelayPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `relay` reject every publish.
    pub fn with_rejecting_relay(mut self, relay: &str) -> Self {
        self.rejecting.insert(relay.to_string());
        self
    }

    /// Make `relay` never send end-of-stored-events.
    pub fn with_silent_relay(mut self, relay: &str) -> Self {
        self.silent.insert(relay.to_string());
        self
    }

    /// Store `event` on `relay` without notifying subscribers.
    pub fn seed(&self, relay: &str, event: Event) {
        self.state
            .lock()
            .unwrap()
            .events
            .entry(relay.to_string())
            .or_default()
            .push(event);
    }

    /// Push `event` to live subscribers of `relay` without storing it.
    pub fn inject(&self, relay: &str, event: Event) {
        self.dispatch(relay, &event);
    }

    /// Events stored on `relay`, oldest first.
    pub fn stored_events(&self, relay: &str) -> Vec<Event> {
        self.state
            .lock()
            .unwrap()
            .events
            .get(relay)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of subscriptions not yet closed.
    pub fn open_subscriptions(&self) -> usize {
        self.state.lock().unwrap().subscriptions.len()
    }

    /// Total publish calls, accepted or not.
    pub fn publish_attempts(&self) -> usize {
        self.state.lock().unwrap().publish_attempts
    }

    fn dispatch(&self, relay: &str, event: &Event) {
        // Collect first so handlers run without the lock held.
        let handlers: Vec<Arc<dyn SubscriptionHandler>> = {
            let state = self.state.lock().unwrap();
            state
                .subscriptions
                .values()
                .filter(|sub| sub.relays.iter().any(|r| r == relay))
                .filter(|sub| sub.filters.iter().any(|f| f.matches(event)))
                .map(|sub| Arc::clone(&sub.handler))
                .collect()
        };
        for handler in handlers {
            handler.on_event(relay, event.clone());
        }
    }
}

#[async_trait]
impl RelayPool for MemoryRelayPool {
    async fn publish(&self, relay: &str, event: &Event) -> Result<()> {
        self.state.lock().unwrap().publish_attempts += 1;
        if self.rejecting.contains(relay) {
            return Err(PayrailError::Transport(format!(
                "{} rejected: blocked",
                relay
            )));
        }
        self.seed(relay, event.clone());
        self.dispatch(relay, event);
        Ok(())
    }

    async fn subscribe_many(
        &self,
        relays: &[String],
        filters: Vec<Filter>,
        handler: Arc<dyn SubscriptionHandler>,
    ) -> Result<Box<dyn RelaySubscription>> {
        let (id, backlog) = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;

            let backlog: Vec<(String, Vec<Event>)> = relays
                .iter()
                .map(|relay| {
                    let stored = state
                        .events
                        .get(relay)
                        .map(|events| {
                            events
                                .iter()
                                .filter(|e| filters.iter().any(|f| f.matches(e)))
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default();
                    (relay.clone(), stored)
                })
                .collect();

            state.subscriptions.insert(
                id,
                Subscription {
                    relays: relays.to_vec(),
                    filters,
                    handler: Arc::clone(&handler),
                },
            );
            (id, backlog)
        };

        for (relay, events) in backlog {
            for event in events {
                handler.on_event(&relay, event);
            }
            if !self.silent.contains(&relay) {
                handler.on_end_of_stored_events(&relay);
            }
        }

        Ok(Box::new(MemorySubscription {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySubscription {
    id: u64,
    state: Arc<Mutex<PoolState>>,
}

impl RelaySubscription for MemorySubscription {
    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.subscriptions.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nostr::{Keys, Kind, UnsignedEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        events: AtomicUsize,
        eose: AtomicUsize,
    }

    impl SubscriptionHandler for Counter {
        fn on_event(&self, _relay: &str, _event: Event) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }

        fn on_end_of_stored_events(&self, _relay: &str) {
            self.eose.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn note(keys: &Keys) -> Event {
        UnsignedEvent::new(keys.public_key(), 1, vec![], "note")
            .sign(keys)
            .unwrap()
    }

    #[tokio::test]
    async fn test_replays_backlog_then_streams() {
        let pool = MemoryRelayPool::new().with_silent_relay("wss://b");
        let keys = Keys::generate();
        pool.seed("wss://a", note(&keys));

        let counter = Arc::new(Counter::default());
        let relays = vec!["wss://a".to_string(), "wss://b".to_string()];
        let sub = pool
            .subscribe_many(&relays, vec![Filter::new().kind(1)], counter.clone())
            .await
            .unwrap();
        assert_eq!(counter.events.load(Ordering::SeqCst), 1);
        assert_eq!(counter.eose.load(Ordering::SeqCst), 1);

        pool.publish("wss://b", &note(&keys)).await.unwrap();
        assert_eq!(counter.events.load(Ordering::SeqCst), 2);

        sub.close();
        sub.close();
        pool.publish("wss://a", &note(&keys)).await.unwrap();
        assert_eq!(counter.events.load(Ordering::SeqCst), 2);
        assert_eq!(pool.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_filters_apply() {
        let pool = MemoryRelayPool::new();
        let counter = Arc::new(Counter::default());
        let _sub = pool
            .subscribe_many(
                &["wss://a".to_string()],
                vec![Filter::new().kind(Kind::GIFT_WRAP)],
                counter.clone(),
            )
            .await
            .unwrap();

        pool.publish("wss://a", &note(&Keys::generate())).await.unwrap();
        assert_eq!(counter.events.load(Ordering::SeqCst), 0);
        assert_eq!(pool.publish_attempts(), 1);
    }
}
