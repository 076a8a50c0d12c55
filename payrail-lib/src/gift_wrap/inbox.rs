//! Live subscription to gift wraps addressed to the local identity.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{GiftWrapCodec, UnwrappedGift};
use crate::nostr::{Event, Filter, Keys, Kind, PublicKey};
use crate::relay::{RelayPool, RelaySubscription, SubscriptionHandler};
use crate::Result;

/// Callback invoked once per opened gift wrap.
type MessageCallback = dyn Fn(UnwrappedGift) + Send + Sync;

/// Gift wrap ids remembered for de-duplication per subscription.
const SEEN_CAPACITY: usize = 4096;

/// Insertion-ordered id set that forgets its oldest entry when full.
struct SeenIds {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl SeenIds {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    /// Record `id`; false if it is already remembered.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Default)]
struct Slot {
    generation: u64,
    active: Option<ActiveSubscription>,
}

struct ActiveSubscription {
    owner: PublicKey,
    handle: Box<dyn RelaySubscription>,
}

impl Slot {
    fn dispose(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.close();
            info!(owner = %active.owner, "Closed gift wrap subscription");
        }
    }
}

/// Session object owning at most one live gift wrap subscription.
///
/// Subscribing again replaces the previous subscription. The swap happens
/// under an async lock, so concurrent callers converge on a single live
/// subscription (the last one to take the lock).
pub struct GiftWrapInbox {
    pool: Arc<dyn RelayPool>,
    slot: Arc<Mutex<Slot>>,
}

impl GiftWrapInbox {
    pub fn new(pool: Arc<dyn RelayPool>) -> Self {
        Self {
            pool,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Subscribe to gift wraps tagged with `keys`' public key on `relays`.
    ///
    /// Events that fail to open are dropped. Each gift wrap id is delivered
    /// at most once even when several relays return it.
    pub async fn subscribe<F>(
        &self,
        keys: Keys,
        relays: &[String],
        on_message: F,
    ) -> Result<InboxDisposer>
    where
        F: Fn(UnwrappedGift) + Send + Sync + 'static,
    {
        let owner = keys.public_key();
        let filter = Filter::new().kind(Kind::GIFT_WRAP).p_tag(&owner);
        let handler = Arc::new(InboxHandler {
            keys,
            on_message: Box::new(on_message),
            seen: StdMutex::new(SeenIds::new(SEEN_CAPACITY)),
        });

        let mut slot = self.slot.lock().await;
        slot.dispose();

        let handle = self
            .pool
            .subscribe_many(relays, vec![filter], handler)
            .await?;
        slot.generation += 1;
        slot.active = Some(ActiveSubscription { owner, handle });
        info!(owner = %owner, relays = relays.len(), "Subscribed to gift wraps");

        Ok(InboxDisposer {
            generation: slot.generation,
            slot: Arc::clone(&self.slot),
        })
    }

    /// Close the active subscription, if any.
    pub async fn close(&self) {
        self.slot.lock().await.dispose();
    }

    /// Whether a subscription is currently open.
    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.active.is_some()
    }
}

/// Closes the subscription it was returned for.
///
/// Does nothing once a later `subscribe` has replaced that subscription.
pub struct InboxDisposer {
    generation: u64,
    slot: Arc<Mutex<Slot>>,
}

impl InboxDisposer {
    pub async fn dispose(self) {
        let mut slot = self.slot.lock().await;
        if slot.generation == self.generation {
            slot.dispose();
        }
    }
}

struct InboxHandler {
    keys: Keys,
    on_message: Box<MessageCallback>,
    seen: StdMutex<SeenIds>,
}

impl InboxHandler {
    fn first_sighting(&self, id: &str) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(id),
            Err(poisoned) => poisoned.into_inner().insert(id),
        }
    }
}

impl SubscriptionHandler for InboxHandler {
    fn on_event(&self, relay: &str, event: Event) {
        if event.kind != Kind::GIFT_WRAP || !self.first_sighting(&event.id) {
            return;
        }
        match GiftWrapCodec::unwrap(&event, &self.keys) {
            Ok(gift) => (self.on_message)(gift),
            Err(e) => debug!(relay, event_id = %event.id, error = %e, "Dropping unreadable gift wrap"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryRelayPool;

    fn relays() -> Vec<String> {
        vec!["wss://one".to_string(), "wss://two".to_string()]
    }

    fn collector() -> (Arc<StdMutex<Vec<UnwrappedGift>>>, impl Fn(UnwrappedGift) + Send + Sync) {
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        (received, move |gift| sink.lock().unwrap().push(gift))
    }

    #[tokio::test]
    async fn test_delivers_live_messages_once() {
        let pool = Arc::new(MemoryRelayPool::new());
        let inbox = GiftWrapInbox::new(pool.clone());
        let codec = GiftWrapCodec::new(pool.clone());
        let alice = Keys::generate();
        let bob = Keys::generate();

        let (received, on_message) = collector();
        inbox.subscribe(bob.clone(), &relays(), on_message).await.unwrap();

        let wrapped = GiftWrapCodec::wrap("hi bob", &alice, &bob.public_key()).unwrap();
        codec.publish(&wrapped, &relays()).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].rumor.content, "hi bob");
        assert_eq!(received[0].sender, alice.public_key());
    }

    #[tokio::test]
    async fn test_drops_garbage_events() {
        let pool = Arc::new(MemoryRelayPool::new());
        let inbox = GiftWrapInbox::new(pool.clone());
        let bob = Keys::generate();
        let eve = Keys::generate();

        let (received, on_message) = collector();
        inbox.subscribe(bob.clone(), &relays(), on_message).await.unwrap();

        // Addressed to bob but encrypted for someone else.
        let mut misdirected = GiftWrapCodec::wrap("x", &eve, &eve.public_key()).unwrap();
        misdirected.tags = vec![vec!["p".to_string(), bob.public_key().to_hex()]];
        pool.inject("wss://one", misdirected);

        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_seen_ids_are_bounded() {
        let mut seen = SeenIds::new(3);
        for id in ["a", "b", "c"] {
            assert!(seen.insert(id));
        }
        assert!(!seen.insert("b"));

        assert!(seen.insert("d"));
        assert_eq!(seen.len(), 3);
        // "a" was evicted and counts as new again; "d" is remembered.
        assert!(seen.insert("a"));
        assert!(!seen.insert("d"));
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_previous() {
        let pool = Arc::new(MemoryRelayPool::new());
        let inbox = GiftWrapInbox::new(pool.clone());
        let bob = Keys::generate();

        let (_, first) = collector();
        let stale = inbox.subscribe(bob.clone(), &relays(), first).await.unwrap();
        let (_, second) = collector();
        let _current = inbox.subscribe(bob.clone(), &relays(), second).await.unwrap();
        assert_eq!(pool.open_subscriptions(), 1);

        // The stale disposer must not close the newer subscription.
        stale.dispose().await;
        assert!(inbox.is_active().await);
        assert_eq!(pool.open_subscriptions(), 1);

        inbox.close().await;
        assert!(!inbox.is_active().await);
        assert_eq!(pool.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_subscribes_leave_one_live() {
        let pool = Arc::new(MemoryRelayPool::new());
        let inbox = Arc::new(GiftWrapInbox::new(pool.clone()));
        let bob = Keys::generate();

        let tasks = (0..4).map(|_| {
            let inbox = Arc::clone(&inbox);
            let keys = bob.clone();
            async move { inbox.subscribe(keys, &relays(), |_| {}).await }
        });
        for result in futures::future::join_all(tasks).await {
            assert!(result.is_ok());
        }
        assert_eq!(pool.open_subscriptions(), 1);
    }
}
