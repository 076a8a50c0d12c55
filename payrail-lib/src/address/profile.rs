//! Kind-0 profile lookup.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ProfileStoreConfig;
use crate::nostr::{Event, Filter, Kind, PublicKey};
use crate::relay::{RelayPool, SubscriptionHandler};
use crate::Result;

/// The subset of kind-0 metadata the router reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Lightning address (`name@domain`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
    /// Bech32 LNURL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud06: Option<String>,
}

impl Profile {
    /// Profile with only a Lightning address set.
    pub fn with_lud16(address: impl Into<String>) -> Self {
        Self {
            lud16: Some(address.into()),
            ..Self::default()
        }
    }

    /// Parse kind-0 event content.
    ///
    /// Unknown fields are ignored; non-string values for known fields are an
    /// error.
    pub fn from_metadata(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Source of profile metadata.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Latest profile for `pubkey`, or `None` if the user never published one.
    async fn fetch_profile(&self, pubkey: &PublicKey) -> Result<Option<Profile>>;
}

/// [`ProfileStore`] that queries a relay pool for the newest kind-0 event.
pub struct RelayProfileStore {
    pool: Arc<dyn RelayPool>,
    config: ProfileStoreConfig,
}

impl RelayProfileStore {
    pub fn new(pool: Arc<dyn RelayPool>, config: ProfileStoreConfig) -> Self {
        Self { pool, config }
    }
}

enum Signal {
    Event(Box<Event>),
    EndOfStored,
}

struct ProfileCollector {
    tx: Mutex<Option<mpsc::UnboundedSender<Signal>>>,
}

impl ProfileCollector {
    fn send(&self, signal: Signal) {
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(signal);
            }
        }
    }
}

impl SubscriptionHandler for ProfileCollector {
    fn on_event(&self, _relay: &str, event: Event) {
        self.send(Signal::Event(Box::new(event)));
    }

    fn on_end_of_stored_events(&self, _relay: &str) {
        self.send(Signal::EndOfStored);
    }
}

#[async_trait]
impl ProfileStore for RelayProfileStore {
    async fn fetch_profile(&self, pubkey: &PublicKey) -> Result<Option<Profile>> {
        if self.config.relays.is_empty() {
            return Ok(None);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = Arc::new(ProfileCollector {
            tx: Mutex::new(Some(tx)),
        });
        let filter = Filter::new()
            .kind(Kind::METADATA)
            .author(*pubkey)
            .limit(1);
        let subscription = self
            .pool
            .subscribe_many(&self.config.relays, vec![filter], handler.clone())
            .await?;

        let expected_eose = self.config.relays.len();
        let mut newest: Option<Event> = None;
        let collect = async {
            let mut eose = 0;
            while let Some(signal) = rx.recv().await {
                match signal {
                    Signal::Event(event) => {
                        if event.kind != Kind::METADATA || event.pubkey != *pubkey {
                            continue;
                        }
                        if let Err(e) = event.verify() {
                            debug!(pubkey = %pubkey, error = %e, "Ignoring invalid metadata event");
                            continue;
                        }
                        if newest
                            .as_ref()
                            .map_or(true, |current| event.created_at > current.created_at)
                        {
                            newest = Some(*event);
                        }
                    }
                    Signal::EndOfStored => {
                        eose += 1;
                        if eose >= expected_eose {
                            break;
                        }
                    }
                }
            }
        };
        if tokio::time::timeout(self.config.timeout(), collect)
            .await
            .is_err()
        {
            debug!(pubkey = %pubkey, timeout_ms = self.config.timeout_ms, "Profile lookup timed out");
        }

        subscription.close();
        if let Ok(mut tx) = handler.tx.lock() {
            tx.take();
        }

        match newest {
            Some(event) => match Profile::from_metadata(&event.content) {
                Ok(profile) => Ok(Some(profile)),
                Err(e) => {
                    warn!(pubkey = %pubkey, error = %e, "Malformed profile metadata");
                    Err(e)
                }
            },
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nostr::{Keys, UnsignedEvent};
    use crate::test_utils::MemoryRelayPool;

    fn metadata(keys: &Keys, content: &str, created_at: u64) -> Event {
        UnsignedEvent::new(keys.public_key(), Kind::METADATA, vec![], content)
            .with_created_at(created_at)
            .sign(keys)
            .unwrap()
    }

    fn store(pool: Arc<MemoryRelayPool>, relays: &[&str]) -> RelayProfileStore {
        let config = ProfileStoreConfig::new(relays.iter().map(|r| r.to_string()).collect())
            .with_timeout_ms(200);
        RelayProfileStore::new(pool, config)
    }

    #[test]
    fn test_parse_metadata() {
        let profile = Profile::from_metadata(
            r#"{"name":"bob","display_name":"Bob","lud16":"bob@example.com","picture":"x"}"#,
        )
        .unwrap();
        assert_eq!(profile.name.as_deref(), Some("bob"));
        assert_eq!(profile.lud16.as_deref(), Some("bob@example.com"));
        assert!(profile.lud06.is_none());

        assert!(Profile::from_metadata("not json").is_err());
    }

    #[tokio::test]
    async fn test_newest_profile_wins() {
        let pool = Arc::new(MemoryRelayPool::new());
        let bob = Keys::generate();
        pool.seed("wss://a", metadata(&bob, r#"{"lud16":"old@example.com"}"#, 100));
        pool.seed("wss://b", metadata(&bob, r#"{"lud16":"new@example.com"}"#, 200));

        let profile = store(pool.clone(), &["wss://a", "wss://b"])
            .fetch_profile(&bob.public_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.lud16.as_deref(), Some("new@example.com"));
        assert_eq!(pool.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_forged_profile_ignored() {
        let pool = Arc::new(MemoryRelayPool::new());
        let bob = Keys::generate();
        let mut forged = metadata(&bob, r#"{"lud16":"bob@example.com"}"#, 300);
        forged.content = r#"{"lud16":"mallory@evil.com"}"#.to_string();
        pool.seed("wss://a", forged);

        let profile = store(pool, &["wss://a"])
            .fetch_profile(&bob.public_key())
            .await
            .unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let pool = Arc::new(MemoryRelayPool::new());
        let bob = Keys::generate();
        let profile = store(pool, &["wss://a"])
            .fetch_profile(&bob.public_key())
            .await
            .unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_relay_times_out() {
        let pool = Arc::new(MemoryRelayPool::new().with_silent_relay("wss://slow"));
        let bob = Keys::generate();
        pool.seed("wss://a", metadata(&bob, r#"{"lud16":"bob@example.com"}"#, 100));

        let profile = store(pool, &["wss://a", "wss://slow"])
            .fetch_profile(&bob.public_key())
            .await
            .unwrap();
        assert_eq!(profile.unwrap().lud16.as_deref(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn test_malformed_content_is_error() {
        let pool = Arc::new(MemoryRelayPool::new());
        let bob = Keys::generate();
        pool.seed("wss://a", metadata(&bob, "{not json", 100));

        let result = store(pool, &["wss://a"]).fetch_profile(&bob.public_key()).await;
        assert!(result.is_err());
    }
}
