//! NIP-59 gift wrapping.
//!
//! A message travels as three nested layers:
//!
//! 1. **rumor** (kind 14): the plaintext event, never signed
//! 2. **seal** (kind 13): the rumor encrypted to the recipient and signed by
//!    the sender, with an empty tag list
//! 3. **gift wrap** (kind 1059): the seal encrypted again under a one-shot
//!    ephemeral key, tagged `["p", recipient]` and signed by that key
//!
//! Relays only ever see the outer layer, which carries neither the sender's
//! pubkey nor the real send time.

mod inbox;

pub use inbox::{GiftWrapInbox, InboxDisposer};

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, instrument};

use crate::nostr::nip44::{self, ConversationKey};
use crate::nostr::{unix_now, Event, Keys, Kind, PublicKey, Rumor, UnsignedEvent};
use crate::relay::{PublishReport, RelayPool, RelayPublisher};
use crate::{PayrailError, Result};

/// Window, in seconds, that seal and wrap timestamps are backdated within.
const TIMESTAMP_JITTER_SECS: u64 = 24 * 60 * 60;

/// A successfully opened gift wrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnwrappedGift {
    /// The inner message.
    pub rumor: Rumor,
    /// Author, as proven by the seal signature.
    pub sender: PublicKey,
}

/// Builds, publishes and opens gift wraps.
#[derive(Clone)]
pub struct GiftWrapCodec {
    publisher: RelayPublisher,
}

impl GiftWrapCodec {
    /// Create a codec publishing through `pool`.
    pub fn new(pool: Arc<dyn RelayPool>) -> Self {
        Self {
            publisher: RelayPublisher::new(pool),
        }
    }

    /// Wrap `content` as a private direct message from `sender` to `recipient`.
    pub fn wrap(content: &str, sender: &Keys, recipient: &PublicKey) -> Result<Event> {
        let rumor = UnsignedEvent::new(
            sender.public_key(),
            Kind::PRIVATE_DIRECT_MESSAGE,
            vec![vec!["p".to_string(), recipient.to_hex()]],
            content,
        )
        .into_rumor();
        Self::wrap_rumor(&rumor, sender, recipient)
    }

    /// Seal and wrap a caller-built rumor.
    ///
    /// The rumor must be authored by `sender`; the seal signature is what
    /// proves authorship to the recipient.
    pub fn wrap_rumor(rumor: &Rumor, sender: &Keys, recipient: &PublicKey) -> Result<Event> {
        if rumor.pubkey != sender.public_key() {
            return Err(PayrailError::Crypto(
                "rumor author does not match sender keys".to_string(),
            ));
        }

        let seal = Self::seal(rumor, sender, recipient)?;

        let ephemeral = Keys::generate();
        let wrap_key = ConversationKey::between(&ephemeral, recipient);
        let content = nip44::encrypt(&wrap_key, &serde_json::to_string(&seal)?)?;

        let gift_wrap = UnsignedEvent::new(
            ephemeral.public_key(),
            Kind::GIFT_WRAP,
            vec![vec!["p".to_string(), recipient.to_hex()]],
            content,
        )
        .with_created_at(random_past_timestamp())
        .sign(&ephemeral)?;

        // `ephemeral` and `wrap_key` are erased when they go out of scope here.
        Ok(gift_wrap)
    }

    fn seal(rumor: &Rumor, sender: &Keys, recipient: &PublicKey) -> Result<Event> {
        let seal_key = ConversationKey::between(sender, recipient);
        let content = nip44::encrypt(&seal_key, &serde_json::to_string(rumor)?)?;
        sender.sign_event(
            UnsignedEvent::new(sender.public_key(), Kind::SEAL, vec![], content)
                .with_created_at(random_past_timestamp()),
        )
    }

    /// Publish a gift wrap to every relay in `relays`.
    #[instrument(skip_all, fields(event_id = %gift_wrap.id, relay_count = relays.len()))]
    pub async fn publish(&self, gift_wrap: &Event, relays: &[String]) -> Result<PublishReport> {
        self.publisher.publish(gift_wrap, relays).await
    }

    /// Open a gift wrap addressed to `recipient`.
    ///
    /// Every failure (wrong kind, bad signature, wrong key, malformed layer,
    /// mismatched sender) is reported as [`PayrailError::Crypto`].
    pub fn unwrap(gift_wrap: &Event, recipient: &Keys) -> Result<UnwrappedGift> {
        if gift_wrap.kind != Kind::GIFT_WRAP {
            return Err(PayrailError::Crypto(format!(
                "expected kind {}, got {}",
                Kind::GIFT_WRAP,
                gift_wrap.kind
            )));
        }
        gift_wrap.verify()?;

        let wrap_key = ConversationKey::between(recipient, &gift_wrap.pubkey);
        let seal_json = nip44::decrypt(&wrap_key, &gift_wrap.content)?;
        let seal: Event = parse_layer(&seal_json, "seal")?;
        if seal.kind != Kind::SEAL {
            return Err(PayrailError::Crypto(format!(
                "expected seal kind {}, got {}",
                Kind::SEAL,
                seal.kind
            )));
        }
        seal.verify()?;

        let seal_key = ConversationKey::between(recipient, &seal.pubkey);
        let rumor_json = nip44::decrypt(&seal_key, &seal.content)?;
        let rumor: Rumor = parse_layer(&rumor_json, "rumor")?;

        if rumor.pubkey != seal.pubkey {
            return Err(PayrailError::Crypto(
                "rumor author does not match seal signer".to_string(),
            ));
        }

        debug!(sender = %seal.pubkey, kind = rumor.kind, "Opened gift wrap");
        Ok(UnwrappedGift {
            sender: seal.pubkey,
            rumor,
        })
    }
}

fn parse_layer<T: serde::de::DeserializeOwned>(json: &str, layer: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| PayrailError::Crypto(format!("malformed {}: {}", layer, e)))
}

/// A timestamp drawn uniformly from the preceding 24 hours.
fn random_past_timestamp() -> u64 {
    let offset = rand::thread_rng().gen_range(0..=TIMESTAMP_JITTER_SECS);
    unix_now().saturating_sub(offset)
}
