//! Scripted wallets and profile stores.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::address::{Profile, ProfileStore};
use crate::executors::{DirectResult, DirectWallet, InvoiceSettlement, TokenMint};
use crate::nostr::PublicKey;
use crate::{PayrailError, Result};

/// Profile store answering from a fixed table.
#[derive(Default)]
pub struct StaticProfileStore {
    profiles: HashMap<PublicKey, Profile>,
    failing: HashSet<PublicKey>,
    lookups: Arc<AtomicUsize>,
}

impl StaticProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `profile` for `pubkey`.
    pub fn with_profile(mut self, pubkey: PublicKey, profile: Profile) -> Self {
        self.profiles.insert(pubkey, profile);
        self
    }

    /// Fail lookups for `pubkey` with a transport error.
    pub fn with_failure(mut self, pubkey: PublicKey) -> Self {
        self.failing.insert(pubkey);
        self
    }

    /// Shared counter of `fetch_profile` calls.
    pub fn lookup_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.lookups)
    }
}

#[async_trait]
impl ProfileStore for StaticProfileStore {
    async fn fetch_profile(&self, pubkey: &PublicKey) -> Result<Option<Profile>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(pubkey) {
            return Err(PayrailError::ConnectionFailed {
                target: "profile relays".to_string(),
                reason: "unreachable".to_string(),
            });
        }
        Ok(self.profiles.get(pubkey).cloned())
    }
}

/// Self-custodial wallet double.
pub struct MockDirectWallet {
    initialized: bool,
    balance: Option<u64>,
    outcome: DirectResult,
    payments: RwLock<Vec<(String, u64, Option<String>)>>,
}

impl Default for MockDirectWallet {
    fn default() -> Self {
        Self {
            initialized: true,
            balance: Some(0),
            outcome: DirectResult::succeeded(Some("mock-payment-hash".to_string()), Some(0)),
            payments: RwLock::new(Vec::new()),
        }
    }
}

impl MockDirectWallet {
    /// An initialized, empty wallet whose payments succeed.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, sats: u64) -> Self {
        self.balance = Some(sats);
        self
    }

    /// Make balance lookups fail.
    pub fn with_balance_error(mut self) -> Self {
        self.balance = None;
        self
    }

    pub fn uninitialized(mut self) -> Self {
        self.initialized = false;
        self
    }

    /// Make every payment fail with `error`.
    pub fn failing(mut self, error: &str) -> Self {
        self.outcome = DirectResult::failed(error);
        self
    }

    /// Every `pay_address` call as `(address, amount, comment)`.
    pub fn payments(&self) -> Vec<(String, u64, Option<String>)> {
        self.payments.read().unwrap().clone()
    }
}

#[async_trait]
impl DirectWallet for MockDirectWallet {
    async fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn balance_sats(&self) -> Result<u64> {
        self.balance
            .ok_or_else(|| PayrailError::Internal("wallet backend unavailable".to_string()))
    }

    async fn pay_address(
        &self,
        address: &str,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> DirectResult {
        self.payments.write().unwrap().push((
            address.to_string(),
            amount_sats,
            comment.map(str::to_string),
        ));
        self.outcome.clone()
    }
}

#[derive(Clone)]
enum MeltBehavior {
    Accept,
    Refuse,
    Fail(String),
}

/// Ecash wallet double implementing both melt and mint.
pub struct MockSettlementRail {
    melt: MeltBehavior,
    mint_error: Option<String>,
    melted: RwLock<Vec<String>>,
    minted: RwLock<Vec<u64>>,
}

impl Default for MockSettlementRail {
    fn default() -> Self {
        Self {
            melt: MeltBehavior::Accept,
            mint_error: None,
            melted: RwLock::new(Vec::new()),
            minted: RwLock::new(Vec::new()),
        }
    }
}

impl MockSettlementRail {
    /// A rail that melts and mints successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token string minted for `amount_sats`.
    pub fn token_for(amount_sats: u64) -> String {
        format!("cashuAmocktoken{}", amount_sats)
    }

    /// Melts return `Ok(false)`.
    pub fn melt_refusing(mut self) -> Self {
        self.melt = MeltBehavior::Refuse;
        self
    }

    /// Melts return an error.
    pub fn melt_failing(mut self, error: &str) -> Self {
        self.melt = MeltBehavior::Fail(error.to_string());
        self
    }

    /// Mints return an error.
    pub fn mint_failing(mut self, error: &str) -> Self {
        self.mint_error = Some(error.to_string());
        self
    }

    /// Invoices passed to `melt_invoice_to_payment`.
    pub fn melted_invoices(&self) -> Vec<String> {
        self.melted.read().unwrap().clone()
    }

    /// Amounts successfully minted.
    pub fn minted_amounts(&self) -> Vec<u64> {
        self.minted.read().unwrap().clone()
    }
}

#[async_trait]
impl InvoiceSettlement for MockSettlementRail {
    async fn melt_invoice_to_payment(&self, bolt11: &str) -> Result<bool> {
        self.melted.write().unwrap().push(bolt11.to_string());
        match &self.melt {
            MeltBehavior::Accept => Ok(true),
            MeltBehavior::Refuse => Ok(false),
            MeltBehavior::Fail(reason) => Err(PayrailError::payment("ecash", reason.clone())),
        }
    }
}

#[async_trait]
impl TokenMint for MockSettlementRail {
    async fn mint_transferable_token(&self, amount_sats: u64) -> Result<String> {
        if let Some(reason) = &self.mint_error {
            return Err(PayrailError::payment("ecash", reason.clone()));
        }
        self.minted.write().unwrap().push(amount_sats);
        Ok(Self::token_for(amount_sats))
    }
}
