//! Payment routing with rail fallback.
//!
//! Each recipient walks a fixed chain of rails, stopping at the first that
//! settles:
//!
//! ```text
//! NotStarted ─▶ TryingDirectWallet ─▶ TryingLnurl ─▶ TryingDmFallback ─▶ Failed
//!      │               │                   │                │
//!      └───────────────┴──▶ Succeeded ◀────┴────────────────┘
//! ```
//!
//! The direct wallet is skipped unless it is configured, initialized and
//! funded. No rail is retried within a call.

mod pacing;
mod types;

pub use pacing::{FixedIntervalPacer, NoPacing, PayoutPacer};
pub use types::{PaymentMethod, PaymentResult, PayoutRecipient, RailAttempt, RouteReport, RouteState};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::address::{AddressResolver, LightningAddressRecord, ProfileStore};
use crate::config::{LnurlConfig, RouterConfig};
use crate::executors::{
    DirectWallet, DirectWalletExecutor, DmExecutor, InvoiceSettlement, LnurlExecutor,
    SettlementRail, TokenMint,
};
use crate::gift_wrap::GiftWrapCodec;
use crate::lnurl::LnurlInvoiceResolver;
use crate::nostr::Keys;
use crate::relay::RelayPool;
use crate::{PayrailError, Result};

use types::summarize_failures;

/// Routes payouts across the direct wallet, LNURL and DM rails.
pub struct PaymentRouter {
    config: RouterConfig,
    resolver: AddressResolver,
    direct: Option<DirectWalletExecutor>,
    lnurl: LnurlExecutor,
    dm: DmExecutor,
    pacer: Arc<dyn PayoutPacer>,
}

impl PaymentRouter {
    /// Start building a router.
    pub fn builder(
        config: RouterConfig,
        profiles: Arc<dyn ProfileStore>,
        pool: Arc<dyn RelayPool>,
    ) -> PaymentRouterBuilder {
        PaymentRouterBuilder {
            config,
            profiles,
            pool,
            direct_wallet: None,
            invoice_settlement: None,
            token_mint: None,
            identity: None,
            lnurl_resolver: None,
            pacer: None,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Pay one recipient, returning only the aggregate result.
    pub async fn route_payment(&self, recipient: &PayoutRecipient) -> PaymentResult {
        self.route_payment_detailed(recipient).await.result
    }

    /// Pay one recipient and report every state and rail attempt.
    #[instrument(skip_all, fields(recipient = %recipient.pubkey(), name = recipient.name(), amount_sats = recipient.amount_sats()))]
    pub async fn route_payment_detailed(&self, recipient: &PayoutRecipient) -> RouteReport {
        let amount = recipient.amount_sats();
        let comment = self.config.payment_comment.as_deref();
        let mut states = vec![RouteState::NotStarted];
        let mut attempts = Vec::new();
        let mut address: Option<LightningAddressRecord> = None;

        if let Some(direct) = &self.direct {
            if direct.is_eligible(amount).await {
                states.push(RouteState::TryingDirectWallet);
                let record = self.resolver.resolve(recipient.pubkey()).await;
                let result = direct.execute(&record.address, amount, comment).await;
                address = Some(record);
                let success = result.success;
                attempts.push(RailAttempt::Direct(result));
                if success {
                    return finish(states, attempts);
                }
                info!("Direct wallet failed, trying LNURL");
            }
        }

        states.push(RouteState::TryingLnurl);
        let record = match address {
            Some(record) => record,
            None => self.resolver.resolve(recipient.pubkey()).await,
        };
        let result = self.lnurl.execute(&record, amount, comment).await;
        let success = result.success;
        attempts.push(RailAttempt::Lnurl(result));
        if success {
            return finish(states, attempts);
        }
        info!(address = %record.address, "LNURL failed, trying DM fallback");

        states.push(RouteState::TryingDmFallback);
        let result = self.dm.execute(recipient.pubkey(), amount).await;
        attempts.push(RailAttempt::Dm(result));
        finish(states, attempts)
    }

    /// Pay every recipient in order, one at a time.
    ///
    /// The result map is keyed by hex pubkey. Every recipient gets an entry;
    /// when the same pubkey appears twice the later result replaces the
    /// earlier one.
    #[instrument(skip_all, fields(count = recipients.len()))]
    pub async fn process_payouts(
        &self,
        recipients: Vec<PayoutRecipient>,
    ) -> HashMap<String, PaymentResult> {
        let mut results = HashMap::with_capacity(recipients.len());

        for recipient in recipients {
            self.pacer.ready().await;
            let result = self.route_payment(&recipient).await;
            let key = recipient.pubkey().to_hex();
            if results.insert(key, result).is_some() {
                warn!(
                    recipient = %recipient.pubkey(),
                    "Duplicate recipient in batch; keeping the latest result"
                );
            }
        }

        let settled = results.values().filter(|r| r.success).count();
        info!(settled, failed = results.len() - settled, "Payout batch finished");
        results
    }
}

fn finish(mut states: Vec<RouteState>, attempts: Vec<RailAttempt>) -> RouteReport {
    let result = match attempts.last() {
        Some(last) if last.success() => {
            states.push(RouteState::Succeeded);
            last.to_payment_result()
        }
        last => {
            states.push(RouteState::Failed);
            let error = PayrailError::Exhausted(summarize_failures(&attempts));
            warn!(error = %error, "All payment rails failed");
            let mut result = PaymentResult::failed(error.to_string());
            if let Some(RailAttempt::Dm(dm)) = last {
                result.undelivered_token = dm.undelivered_token.clone();
            }
            result
        }
    };
    RouteReport {
        result,
        states,
        attempts,
    }
}

/// Builder for [`PaymentRouter`].
pub struct PaymentRouterBuilder {
    config: RouterConfig,
    profiles: Arc<dyn ProfileStore>,
    pool: Arc<dyn RelayPool>,
    direct_wallet: Option<Arc<dyn DirectWallet>>,
    invoice_settlement: Option<Arc<dyn InvoiceSettlement>>,
    token_mint: Option<Arc<dyn TokenMint>>,
    identity: Option<Keys>,
    lnurl_resolver: Option<LnurlInvoiceResolver>,
    pacer: Option<Arc<dyn PayoutPacer>>,
}

impl PaymentRouterBuilder {
    /// Use a self-custodial wallet as the first rail.
    pub fn with_direct_wallet(mut self, wallet: Arc<dyn DirectWallet>) -> Self {
        self.direct_wallet = Some(wallet);
        self
    }

    /// Use one ecash wallet for both melting and minting.
    pub fn with_settlement_rail<R: SettlementRail + 'static>(mut self, rail: Arc<R>) -> Self {
        let settlement: Arc<dyn InvoiceSettlement> = rail.clone();
        let mint: Arc<dyn TokenMint> = rail;
        self.invoice_settlement = Some(settlement);
        self.token_mint = Some(mint);
        self
    }

    /// Set only the invoice melt capability.
    pub fn with_invoice_settlement(mut self, settlement: Arc<dyn InvoiceSettlement>) -> Self {
        self.invoice_settlement = Some(settlement);
        self
    }

    /// Set only the token mint capability.
    pub fn with_token_mint(mut self, mint: Arc<dyn TokenMint>) -> Self {
        self.token_mint = Some(mint);
        self
    }

    /// Identity that signs DM seals.
    pub fn with_identity(mut self, keys: Keys) -> Self {
        self.identity = Some(keys);
        self
    }

    /// Replace the default LNURL resolver.
    pub fn with_lnurl_resolver(mut self, resolver: LnurlInvoiceResolver) -> Self {
        self.lnurl_resolver = Some(resolver);
        self
    }

    /// Replace the default fixed-interval pacer.
    pub fn with_pacer(mut self, pacer: Arc<dyn PayoutPacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    pub fn build(self) -> Result<PaymentRouter> {
        let lnurl_resolver = match self.lnurl_resolver {
            Some(resolver) => resolver,
            None => LnurlInvoiceResolver::new(LnurlConfig::default())?,
        };
        let pacer: Arc<dyn PayoutPacer> = match self.pacer {
            Some(pacer) => pacer,
            None => Arc::new(FixedIntervalPacer::new(self.config.payout_interval())),
        };
        let resolver = AddressResolver::new(self.profiles)
            .with_fallback_domain(self.config.fallback_domain.clone());
        let dm = DmExecutor::new(
            GiftWrapCodec::new(self.pool),
            self.identity,
            self.token_mint,
            self.config.relays.clone(),
            self.config.dm_memo.clone(),
        );

        Ok(PaymentRouter {
            resolver,
            direct: self.direct_wallet.map(DirectWalletExecutor::new),
            lnurl: LnurlExecutor::new(lnurl_resolver, self.invoice_settlement),
            dm,
            pacer,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Profile;
    use crate::test_utils::{
        fixtures, MemoryRelayPool, MockDirectWallet, MockSettlementRail, StaticProfileStore,
    };

    fn router_with(
        profiles: StaticProfileStore,
        pool: Arc<MemoryRelayPool>,
    ) -> PaymentRouterBuilder {
        PaymentRouter::builder(
            RouterConfig::new(vec![fixtures::RELAY.to_string()]),
            Arc::new(profiles),
            pool,
        )
        .with_pacer(Arc::new(NoPacing))
    }

    #[tokio::test]
    async fn test_direct_wallet_success_short_circuits() {
        let recipient = fixtures::recipient(1_000);
        let wallet = Arc::new(MockDirectWallet::new().with_balance(5_000));
        let rail = Arc::new(MockSettlementRail::new());
        let router = router_with(StaticProfileStore::new(), Arc::new(MemoryRelayPool::new()))
            .with_direct_wallet(wallet.clone())
            .with_settlement_rail(rail.clone())
            .build()
            .unwrap();

        let report = router.route_payment_detailed(&recipient).await;
        assert!(report.result.success);
        assert_eq!(report.result.method, PaymentMethod::Breez);
        assert_eq!(
            report.states,
            vec![
                RouteState::NotStarted,
                RouteState::TryingDirectWallet,
                RouteState::Succeeded
            ]
        );
        assert_eq!(wallet.payments().len(), 1);
        assert!(wallet.payments()[0].0.ends_with("@npub.cash"));
        assert!(rail.minted_amounts().is_empty());
    }

    #[tokio::test]
    async fn test_underfunded_wallet_is_skipped() {
        let recipient = fixtures::recipient(1_000);
        let wallet = Arc::new(MockDirectWallet::new().with_balance(999));
        let pool = Arc::new(MemoryRelayPool::new());
        let router = router_with(StaticProfileStore::new(), pool.clone())
            .with_direct_wallet(wallet.clone())
            .with_token_mint(Arc::new(MockSettlementRail::new()))
            .with_identity(Keys::generate())
            .build()
            .unwrap();

        let report = router.route_payment_detailed(&recipient).await;
        assert!(wallet.payments().is_empty());
        assert_eq!(
            report.states,
            vec![
                RouteState::NotStarted,
                RouteState::TryingLnurl,
                RouteState::TryingDmFallback,
                RouteState::Succeeded
            ]
        );
        assert_eq!(report.result.method, PaymentMethod::CashuDm);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(pool.stored_events(fixtures::RELAY).len(), 1);
    }

    #[tokio::test]
    async fn test_failing_wallet_falls_through_to_dm() {
        let recipient = fixtures::recipient(50);
        let router = router_with(StaticProfileStore::new(), Arc::new(MemoryRelayPool::new()))
            .with_direct_wallet(Arc::new(
                MockDirectWallet::new().with_balance(100).failing("no route"),
            ))
            .with_token_mint(Arc::new(MockSettlementRail::new()))
            .with_identity(Keys::generate())
            .build()
            .unwrap();

        let report = router.route_payment_detailed(&recipient).await;
        assert!(report.result.success);
        assert_eq!(report.result.method, PaymentMethod::CashuDm);
        assert!(matches!(report.attempts[0], RailAttempt::Direct(ref r) if !r.success));
        assert!(matches!(report.attempts[1], RailAttempt::Lnurl(ref r) if !r.success));
    }

    #[tokio::test]
    async fn test_everything_failing_is_terminal() {
        let recipient = fixtures::recipient(10);
        let router = router_with(StaticProfileStore::new(), Arc::new(MemoryRelayPool::new()))
            .with_direct_wallet(Arc::new(MockDirectWallet::new().uninitialized()))
            .build()
            .unwrap();

        let report = router.route_payment_detailed(&recipient).await;
        assert!(!report.result.success);
        assert_eq!(report.result.method, PaymentMethod::Failed);
        assert_eq!(report.final_state(), RouteState::Failed);
        let error = report.result.error.unwrap();
        assert!(error.contains("lnurl"));
        assert!(error.contains("dm: token mint is not configured"));
    }

    #[tokio::test]
    async fn test_dm_relay_rejection_fails() {
        let recipient = fixtures::recipient(10);
        let pool = Arc::new(MemoryRelayPool::new().with_rejecting_relay(fixtures::RELAY));
        let router = router_with(StaticProfileStore::new(), pool)
            .with_token_mint(Arc::new(MockSettlementRail::new()))
            .with_identity(Keys::generate())
            .build()
            .unwrap();

        let result = router.route_payment(&recipient).await;
        assert!(!result.success);
        assert_eq!(result.method, PaymentMethod::Failed);
        assert!(result.error.unwrap().starts_with("all payment rails failed"));
        assert_eq!(
            result.undelivered_token.as_ref().map(|t| t.expose()),
            Some(MockSettlementRail::token_for(10).as_str())
        );
    }

    #[tokio::test]
    async fn test_address_resolved_once_per_route() {
        let recipient = fixtures::recipient(10);
        let profiles = StaticProfileStore::new()
            .with_profile(*recipient.pubkey(), Profile::with_lud16("bob@invalid.invalid"));
        let lookups = profiles.lookup_counter();
        let router = router_with(profiles, Arc::new(MemoryRelayPool::new()))
            .with_direct_wallet(Arc::new(
                MockDirectWallet::new().with_balance(100).failing("no route"),
            ))
            .build()
            .unwrap();

        router.route_payment(&recipient).await;
        assert_eq!(lookups.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_keeps_going_and_dedupes() {
        let first = fixtures::recipient(10);
        let failing = fixtures::recipient(20);
        let third = fixtures::recipient(30);
        let profiles = StaticProfileStore::new().with_failure(*failing.pubkey());
        let router = router_with(profiles, Arc::new(MemoryRelayPool::new()))
            .with_token_mint(Arc::new(MockSettlementRail::new()))
            .with_identity(Keys::generate())
            .build()
            .unwrap();

        let duplicate = PayoutRecipient::new(*first.pubkey(), 99).unwrap();
        let results = router
            .process_payouts(vec![first.clone(), failing.clone(), third.clone(), duplicate])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.values().all(|r| r.success));
        assert!(results.contains_key(&failing.pubkey().to_hex()));
    }
}
