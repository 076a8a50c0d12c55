//! Payment rail executors and the wallet capabilities they drive.
//!
//! The host wallet plugs in through three capability traits:
//!
//! - [`DirectWallet`]: a self-custodial Lightning wallet that pays addresses
//! - [`InvoiceSettlement`]: pays a BOLT11 invoice from an ecash balance (melt)
//! - [`TokenMint`]: mints a bearer ecash token for out-of-band delivery
//!
//! Each executor wraps one rail and always returns a typed result; none of
//! them propagate errors, so the router can fall through to the next rail.

mod direct;
mod dm;
mod lnurl;
mod results;

pub use direct::DirectWalletExecutor;
pub use dm::DmExecutor;
pub use lnurl::LnurlExecutor;
pub use results::{BearerToken, DirectResult, DmResult, LnurlResult};

use async_trait::async_trait;

use crate::Result;

/// Self-custodial Lightning wallet able to pay Lightning addresses directly.
#[async_trait]
pub trait DirectWallet: Send + Sync {
    /// Whether the wallet has finished starting up.
    async fn is_initialized(&self) -> bool;

    /// Spendable balance.
    async fn balance_sats(&self) -> Result<u64>;

    /// Pay `amount_sats` to a Lightning address.
    async fn pay_address(
        &self,
        address: &str,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> DirectResult;
}

/// Pays invoices out of an ecash balance.
#[async_trait]
pub trait InvoiceSettlement: Send + Sync {
    /// Melt ecash to pay `bolt11`. `Ok(false)` means the mint refused.
    async fn melt_invoice_to_payment(&self, bolt11: &str) -> Result<bool>;
}

/// Mints bearer tokens.
#[async_trait]
pub trait TokenMint: Send + Sync {
    /// Mint a transferable token worth `amount_sats`.
    async fn mint_transferable_token(&self, amount_sats: u64) -> Result<String>;
}

/// An ecash wallet offering both settlement capabilities.
pub trait SettlementRail: InvoiceSettlement + TokenMint {}

impl<T: InvoiceSettlement + TokenMint + ?Sized> SettlementRail for T {}
