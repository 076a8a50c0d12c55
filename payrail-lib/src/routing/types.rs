use std::fmt;

use serde::{Deserialize, Serialize};

use crate::executors::{BearerToken, DirectResult, DmResult, LnurlResult};
use crate::nostr::PublicKey;
use crate::{PayrailError, Result};

/// One payout to make.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecipient {
    pubkey: PublicKey,
    amount_sats: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl PayoutRecipient {
    /// Create a recipient. `amount_sats` must be positive.
    pub fn new(pubkey: PublicKey, amount_sats: u64) -> Result<Self> {
        if amount_sats == 0 {
            return Err(PayrailError::invalid_data(
                "amount_sats",
                "must be greater than zero",
            ));
        }
        Ok(Self {
            pubkey,
            amount_sats,
            name: None,
        })
    }

    /// Create a recipient from a hex or npub identifier.
    pub fn parse(identifier: &str, amount_sats: u64) -> Result<Self> {
        Self::new(PublicKey::parse(identifier)?, amount_sats)
    }

    /// Attach a display name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    pub fn amount_sats(&self) -> u64 {
        self.amount_sats
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Rail a payment settled on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Direct self-custodial wallet.
    Breez,
    /// LNURL to the recipient's own address.
    Lnurl,
    /// LNURL to the fallback custodial address.
    Npubcash,
    /// Token delivered over a gift-wrapped DM.
    CashuDm,
    /// Every rail failed.
    Failed,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breez => "breez",
            Self::Lnurl => "lnurl",
            Self::Npubcash => "npubcash",
            Self::CashuDm => "cashu_dm",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome for one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_sats: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ecash minted for the DM rail that no relay accepted. The host must
    /// redeem or re-deliver it.
    #[serde(skip)]
    pub undelivered_token: Option<BearerToken>,
}

impl PaymentResult {
    /// Terminal failure after every rail was tried.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            method: PaymentMethod::Failed,
            tx_id: None,
            fee_sats: None,
            error: Some(error.into()),
            undelivered_token: None,
        }
    }
}

/// Router position while handling one recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteState {
    NotStarted,
    TryingDirectWallet,
    TryingLnurl,
    TryingDmFallback,
    Succeeded,
    Failed,
}

impl RouteState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// What one rail did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rail", rename_all = "snake_case")]
pub enum RailAttempt {
    Direct(DirectResult),
    Lnurl(LnurlResult),
    Dm(DmResult),
}

impl RailAttempt {
    pub fn success(&self) -> bool {
        match self {
            Self::Direct(r) => r.success,
            Self::Lnurl(r) => r.success,
            Self::Dm(r) => r.success,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Direct(r) => r.error.as_deref(),
            Self::Lnurl(r) => r.error.as_deref(),
            Self::Dm(r) => r.error.as_deref(),
        }
    }

    fn rail_name(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Lnurl(_) => "lnurl",
            Self::Dm(_) => "dm",
        }
    }

    /// Aggregate result for a successful attempt.
    pub(crate) fn to_payment_result(&self) -> PaymentResult {
        match self {
            Self::Direct(r) => PaymentResult {
                success: r.success,
                method: PaymentMethod::Breez,
                tx_id: r.tx_id.clone(),
                fee_sats: r.fee_sats,
                error: r.error.clone(),
                undelivered_token: None,
            },
            Self::Lnurl(r) => PaymentResult {
                success: r.success,
                method: if r.source == crate::address::AddressSource::NpubcashFallback {
                    PaymentMethod::Npubcash
                } else {
                    PaymentMethod::Lnurl
                },
                tx_id: None,
                fee_sats: None,
                error: r.error.clone(),
                undelivered_token: None,
            },
            Self::Dm(r) => PaymentResult {
                success: r.success,
                method: PaymentMethod::CashuDm,
                tx_id: r.event_id.clone(),
                fee_sats: None,
                error: r.error.clone(),
                undelivered_token: r.undelivered_token.clone(),
            },
        }
    }
}

/// Full trace of routing one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteReport {
    pub result: PaymentResult,
    /// Every state entered, starting with [`RouteState::NotStarted`].
    pub states: Vec<RouteState>,
    /// One entry per rail actually attempted, in order.
    pub attempts: Vec<RailAttempt>,
}

impl RouteReport {
    pub fn final_state(&self) -> RouteState {
        self.states.last().copied().unwrap_or(RouteState::NotStarted)
    }
}

/// `rail: error` for every failed attempt, joined.
pub(crate) fn summarize_failures(attempts: &[RailAttempt]) -> String {
    let parts: Vec<String> = attempts
        .iter()
        .filter(|a| !a.success())
        .map(|a| format!("{}: {}", a.rail_name(), a.error().unwrap_or("failed")))
        .collect();
    if parts.is_empty() {
        "no payment rail available".to_string()
    } else {
        parts.join("; ")
    }
}
