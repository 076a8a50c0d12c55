//! Recipient identity to Lightning address resolution.
//!
//! A recipient that advertises a `lud16` in their profile is paid there.
//! Everyone else gets a deterministic custodial address derived from their
//! public identifier, `{npub}@{fallback_domain}`, so resolution always yields
//! something payable.

mod profile;

pub use profile::{Profile, ProfileStore, RelayProfileStore};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DEFAULT_FALLBACK_DOMAIN;
use crate::nostr::PublicKey;

/// Where a resolved address came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressSource {
    /// The recipient's own kind-0 `lud16` field.
    #[serde(rename = "kind0")]
    Kind0,
    /// Derived from the recipient's npub and the fallback domain.
    #[serde(rename = "npubcash-fallback")]
    NpubcashFallback,
}

impl AddressSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kind0 => "kind0",
            Self::NpubcashFallback => "npubcash-fallback",
        }
    }
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payable Lightning address and its provenance.
///
/// Derived fresh on every resolution and never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightningAddressRecord {
    /// `name@domain`.
    pub address: String,
    pub source: AddressSource,
}

impl LightningAddressRecord {
    pub fn is_fallback(&self) -> bool {
        self.source == AddressSource::NpubcashFallback
    }
}

/// Split `name@domain` into its parts.
///
/// Surrounding whitespace is ignored. The name is limited to ASCII
/// alphanumerics and `-_.+` and may not be `.` or `..`. The domain is a bare
/// host with an optional port: no path, query, fragment or userinfo
/// characters. Returns `None` for anything else.
pub fn split_lightning_address(address: &str) -> Option<(&str, &str)> {
    let (name, domain) = address.trim().split_once('@')?;
    let name_ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'));
    let domain_ok = !domain.is_empty()
        && !domain
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '@' | '/' | '\\' | '?' | '#'));
    if name_ok && domain_ok {
        Some((name, domain))
    } else {
        None
    }
}

/// Whether `address` is a syntactically valid Lightning address.
pub fn is_valid_lightning_address(address: &str) -> bool {
    split_lightning_address(address).is_some()
}

/// Maps recipients to Lightning addresses.
#[derive(Clone)]
pub struct AddressResolver {
    profiles: Arc<dyn ProfileStore>,
    fallback_domain: String,
}

impl AddressResolver {
    /// Create a resolver falling back to the default custodial domain.
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            profiles,
            fallback_domain: DEFAULT_FALLBACK_DOMAIN.to_string(),
        }
    }

    /// Override the fallback domain.
    pub fn with_fallback_domain(mut self, domain: impl Into<String>) -> Self {
        self.fallback_domain = domain.into();
        self
    }

    /// The fallback address for `pubkey`.
    pub fn fallback_address(&self, pubkey: &PublicKey) -> LightningAddressRecord {
        LightningAddressRecord {
            address: format!("{}@{}", pubkey.to_npub(), self.fallback_domain),
            source: AddressSource::NpubcashFallback,
        }
    }

    /// Resolve `pubkey` to a payable address. Never fails.
    pub async fn resolve(&self, pubkey: &PublicKey) -> LightningAddressRecord {
        match self.profiles.fetch_profile(pubkey).await {
            Ok(Some(profile)) => match profile.lud16.as_deref().map(str::trim) {
                Some(lud16) if is_valid_lightning_address(lud16) => {
                    debug!(pubkey = %pubkey, address = lud16, "Using profile lightning address");
                    return LightningAddressRecord {
                        address: lud16.to_string(),
                        source: AddressSource::Kind0,
                    };
                }
                Some(lud16) => {
                    warn!(pubkey = %pubkey, lud16, "Ignoring malformed lud16");
                }
                None => debug!(pubkey = %pubkey, "Profile has no lud16"),
            },
            Ok(None) => debug!(pubkey = %pubkey, "No profile found"),
            Err(e) => warn!(pubkey = %pubkey, error = %e, "Profile lookup failed"),
        }
        self.fallback_address(pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nostr::Keys;
    use crate::test_utils::StaticProfileStore;

    #[test]
    fn test_split_lightning_address() {
        assert_eq!(
            split_lightning_address(" bob@example.com "),
            Some(("bob", "example.com"))
        );
        assert!(split_lightning_address("bob").is_none());
        assert!(split_lightning_address("@example.com").is_none());
        assert!(split_lightning_address("bob@").is_none());
        assert!(split_lightning_address("a@b@c").is_none());
        assert!(split_lightning_address("bo b@example.com").is_none());
        assert_eq!(
            split_lightning_address("Bob.Smith+tips@127.0.0.1:8080"),
            Some(("Bob.Smith+tips", "127.0.0.1:8080"))
        );
    }

    #[test]
    fn test_split_rejects_url_injection() {
        assert!(split_lightning_address("bob@host/x?").is_none());
        assert!(split_lightning_address("bob@host#frag").is_none());
        assert!(split_lightning_address("bob@host\\evil").is_none());
        assert!(split_lightning_address("../a@host").is_none());
        assert!(split_lightning_address("..@host").is_none());
        assert!(split_lightning_address("a/b@host").is_none());
        assert!(split_lightning_address("a%2f@host").is_none());
    }

    #[tokio::test]
    async fn test_profile_address_wins() {
        let bob = Keys::generate().public_key();
        let store = StaticProfileStore::new().with_profile(bob, Profile::with_lud16("alice@getalby.com"));
        let resolver = AddressResolver::new(Arc::new(store));

        let record = resolver.resolve(&bob).await;
        assert_eq!(record.address, "alice@getalby.com");
        assert_eq!(record.source, AddressSource::Kind0);
        assert!(!record.is_fallback());
    }

    #[tokio::test]
    async fn test_missing_profile_falls_back() {
        let bob = Keys::generate().public_key();
        let resolver = AddressResolver::new(Arc::new(StaticProfileStore::new()));

        let record = resolver.resolve(&bob).await;
        assert_eq!(record.address, format!("{}@npub.cash", bob.to_npub()));
        assert_eq!(record.source, AddressSource::NpubcashFallback);
    }

    #[tokio::test]
    async fn test_malformed_lud16_falls_back() {
        let bob = Keys::generate().public_key();
        let store = StaticProfileStore::new().with_profile(bob, Profile::with_lud16("not-an-address"));
        let resolver = AddressResolver::new(Arc::new(store)).with_fallback_domain("cash.example");

        let record = resolver.resolve(&bob).await;
        assert_eq!(record.address, format!("{}@cash.example", bob.to_npub()));
        assert!(record.is_fallback());
    }

    #[tokio::test]
    async fn test_store_error_falls_back() {
        let bob = Keys::generate().public_key();
        let store = StaticProfileStore::new().with_failure(bob);
        let resolver = AddressResolver::new(Arc::new(store));

        assert!(resolver.resolve(&bob).await.is_fallback());
    }

    #[test]
    fn test_source_serde() {
        assert_eq!(
            serde_json::to_string(&AddressSource::NpubcashFallback).unwrap(),
            "\"npubcash-fallback\""
        );
        assert_eq!(AddressSource::Kind0.to_string(), "kind0");
    }
}
