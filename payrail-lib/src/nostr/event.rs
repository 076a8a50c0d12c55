//! NIP-01 events, rumors and subscription filters.

use std::str::FromStr;

use secp256k1::schnorr;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::keys::{verify_digest, Keys, PublicKey};
use crate::{PayrailError, Result};

/// Event kinds used by this crate.
pub struct Kind;

impl Kind {
    /// User metadata (profile) event.
    pub const METADATA: u16 = 0;
    /// NIP-59 seal.
    pub const SEAL: u16 = 13;
    /// NIP-17 private direct message (rumor kind).
    pub const PRIVATE_DIRECT_MESSAGE: u16 = 14;
    /// NIP-59 gift wrap.
    pub const GIFT_WRAP: u16 = 1059;
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// NIP-01 event id: sha256 of `[0, pubkey, created_at, kind, tags, content]`.
pub fn event_hash(
    pubkey: &PublicKey,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> [u8; 32] {
    let canonical = serde_json::json!([0, pubkey.to_hex(), created_at, kind, tags, content]);
    Sha256::digest(canonical.to_string().as_bytes()).into()
}

/// An event template waiting to be signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    /// Author.
    pub pubkey: PublicKey,
    /// Unix seconds.
    pub created_at: u64,
    /// Event kind.
    pub kind: u16,
    /// Tag arrays.
    pub tags: Vec<Vec<String>>,
    /// Content.
    pub content: String,
}

impl UnsignedEvent {
    /// Create a template authored by `pubkey`, stamped now.
    pub fn new(pubkey: PublicKey, kind: u16, tags: Vec<Vec<String>>, content: impl Into<String>) -> Self {
        Self {
            pubkey,
            created_at: unix_now(),
            kind,
            tags,
            content: content.into(),
        }
    }

    /// Override the timestamp.
    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    fn hash(&self) -> [u8; 32] {
        event_hash(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Sign with `keys`, which must match the template author.
    pub fn sign(self, keys: &Keys) -> Result<Event> {
        if keys.public_key() != self.pubkey {
            return Err(PayrailError::Crypto(
                "signing key does not match event pubkey".to_string(),
            ));
        }
        let digest = self.hash();
        let sig = keys.sign_digest(digest);
        Ok(Event {
            id: hex::encode(digest),
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: sig.to_string(),
        })
    }

    /// Compute the id and drop the signing step.
    pub fn into_rumor(self) -> Rumor {
        Rumor {
            id: hex::encode(self.hash()),
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
        }
    }
}

/// A signed NIP-01 event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Hex sha256 of the canonical serialization.
    pub id: String,
    /// Author.
    pub pubkey: PublicKey,
    /// Unix seconds.
    pub created_at: u64,
    /// Event kind.
    pub kind: u16,
    /// Tag arrays.
    pub tags: Vec<Vec<String>>,
    /// Content.
    pub content: String,
    /// Hex BIP-340 signature.
    pub sig: String,
}

impl Event {
    /// Check the id against the content and the signature against the id.
    pub fn verify(&self) -> Result<()> {
        let digest = event_hash(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        );
        if hex::encode(digest) != self.id.to_lowercase() {
            return Err(PayrailError::Crypto("event id mismatch".to_string()));
        }
        let sig = schnorr::Signature::from_str(&self.sig)
            .map_err(|e| PayrailError::Crypto(format!("malformed signature: {}", e)))?;
        verify_digest(&self.pubkey, digest, &sig)
    }

    /// Values of every tag named `name` (first element after the name).
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }

    /// JSON serialization.
    pub fn as_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Unsigned event carried inside a seal. Never published as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rumor {
    /// Hex event id (computed, not signed).
    pub id: String,
    /// Claimed author; the seal signature vouches for it.
    pub pubkey: PublicKey,
    /// Unix seconds.
    pub created_at: u64,
    /// Event kind.
    pub kind: u16,
    /// Tag arrays.
    pub tags: Vec<Vec<String>>,
    /// Content.
    pub content: String,
}

/// Subscription filter (NIP-01 `REQ` filter object).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<PublicKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,
    #[serde(rename = "#p", skip_serializing_if = "Option::is_none")]
    pub p_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.get_or_insert_with(Vec::new).push(kind);
        self
    }

    pub fn author(mut self, author: PublicKey) -> Self {
        self.authors.get_or_insert_with(Vec::new).push(author);
        self
    }

    pub fn p_tag(mut self, pubkey: &PublicKey) -> Self {
        self.p_tags.get_or_insert_with(Vec::new).push(pubkey.to_hex());
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `event` satisfies every populated field (limit is ignored).
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| id == &event.id) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.contains(&event.pubkey) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(p_tags) = &self.p_tags {
            if !event.tag_values("p").any(|v| p_tags.iter().any(|p| p == v)) {
                return false;
            }
        }
        if self.since.is_some_and(|since| event.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at > until) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_event_verifies() {
        let keys = Keys::generate();
        let event = UnsignedEvent::new(keys.public_key(), 1, vec![], "hello")
            .sign(&keys)
            .unwrap();
        assert_eq!(event.id.len(), 64);
        assert_eq!(event.sig.len(), 128);
        assert!(event.verify().is_ok());
    }

    #[test]
    fn tampered_event_fails_verification() {
        let keys = Keys::generate();
        let mut event = UnsignedEvent::new(keys.public_key(), 1, vec![], "hello")
            .sign(&keys)
            .unwrap();
        event.content = "goodbye".to_string();
        assert!(event.verify().is_err());
    }

    #[test]
    fn sign_rejects_foreign_template() {
        let author = Keys::generate();
        let other = Keys::generate();
        let result = UnsignedEvent::new(author.public_key(), 1, vec![], "x").sign(&other);
        assert!(result.is_err());
    }

    #[test]
    fn rumor_id_matches_signed_id() {
        let keys = Keys::generate();
        let template = UnsignedEvent::new(keys.public_key(), 14, vec![], "hi").with_created_at(1_700_000_000);
        let rumor = template.clone().into_rumor();
        let event = template.sign(&keys).unwrap();
        assert_eq!(rumor.id, event.id);
    }

    #[test]
    fn event_json_round_trips() {
        let keys = Keys::generate();
        let event = UnsignedEvent::new(
            keys.public_key(),
            Kind::GIFT_WRAP,
            vec![vec!["p".to_string(), "ab".to_string()]],
            "payload \"quoted\"\n",
        )
        .sign(&keys)
        .unwrap();
        let parsed: Event = serde_json::from_str(&event.as_json().unwrap()).unwrap();
        assert_eq!(parsed, event);
        assert!(parsed.verify().is_ok());
    }

    #[test]
    fn filter_matching() {
        let keys = Keys::generate();
        let recipient = Keys::generate().public_key();
        let event = UnsignedEvent::new(
            keys.public_key(),
            Kind::GIFT_WRAP,
            vec![vec!["p".to_string(), recipient.to_hex()]],
            "",
        )
        .with_created_at(100)
        .sign(&keys)
        .unwrap();

        assert!(Filter::new().kind(Kind::GIFT_WRAP).p_tag(&recipient).matches(&event));
        assert!(!Filter::new().kind(Kind::METADATA).matches(&event));
        assert!(!Filter::new().p_tag(&keys.public_key()).matches(&event));
        assert!(!Filter::new().since(101).matches(&event));
        assert!(Filter::new().author(keys.public_key()).matches(&event));
    }

    #[test]
    fn filter_serializes_tag_key() {
        let pk = Keys::generate().public_key();
        let json = serde_json::to_value(Filter::new().kind(1059).p_tag(&pk)).unwrap();
        assert_eq!(json["kinds"], serde_json::json!([1059]));
        assert_eq!(json["#p"], serde_json::json!([pk.to_hex()]));
        assert!(json.get("limit").is_none());
    }
}
