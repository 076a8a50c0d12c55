use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::address::AddressSource;
use crate::nostr::PublicKey;

/// Outcome of a direct wallet payment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectResult {
    pub success: bool,
    /// Payment hash or wallet-specific id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_sats: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DirectResult {
    /// A successful payment.
    pub fn succeeded(tx_id: Option<String>, fee_sats: Option<u64>) -> Self {
        Self {
            success: true,
            tx_id,
            fee_sats,
            error: None,
        }
    }

    /// A failed payment.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Outcome of paying a resolved Lightning address through LNURL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LnurlResult {
    pub success: bool,
    /// Address that was paid (or attempted).
    pub address: String,
    pub source: AddressSource,
    /// Invoice obtained from the callback, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A minted bearer token that never reached its recipient.
///
/// Whoever holds the string can spend it, so it is never serialized and its
/// `Debug` output is redacted. The buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(Zeroizing<String>);

impl BearerToken {
    pub(crate) fn new(token: String) -> Self {
        Self(Zeroizing::new(token))
    }

    /// The token string, for the host to re-deliver or redeem.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Outcome of delivering a token over a gift-wrapped DM.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmResult {
    pub success: bool,
    pub recipient: PublicKey,
    /// Id of the published gift wrap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Relays that accepted the gift wrap.
    #[serde(default)]
    pub accepted_relays: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a token was minted but could not be delivered.
    #[serde(skip)]
    pub undelivered_token: Option<BearerToken>,
}

impl DmResult {
    pub(crate) fn failed(recipient: PublicKey, error: impl Into<String>) -> Self {
        Self {
            success: false,
            recipient,
            event_id: None,
            accepted_relays: Vec::new(),
            error: Some(error.into()),
            undelivered_token: None,
        }
    }

    /// A failure after minting: hand `token` back to the caller.
    pub(crate) fn undelivered(
        recipient: PublicKey,
        token: String,
        error: impl Into<String>,
    ) -> Self {
        Self {
            undelivered_token: Some(BearerToken::new(token)),
            ..Self::failed(recipient, error)
        }
    }
}
