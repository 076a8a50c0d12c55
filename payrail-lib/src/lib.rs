//! Payrail library.
//!
//! Settles payouts to nostr identities across heterogeneous payment rails.
//! The crate holds no wallet, socket or key storage of its own; the host
//! injects those capabilities through traits.
//!
//! # Rails
//!
//! For each recipient the [`routing::PaymentRouter`] tries, in order:
//!
//! 1. **Direct wallet**: a self-custodial Lightning wallet pays the
//!    recipient's Lightning address
//! 2. **LNURL**: an invoice is fetched over LNURL-pay and paid by melting
//!    ecash
//! 3. **DM fallback**: an ecash token is minted and delivered inside a NIP-59
//!    gift-wrapped direct message
//!
//! Recipients without a Lightning address in their profile are paid at a
//! deterministic custodial address, `{npub}@npub.cash` by default.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use payrail_lib::prelude::*;
//!
//! let config = RouterConfig::from_env();
//! let profiles = Arc::new(RelayProfileStore::new(pool.clone(), ProfileStoreConfig::new(config.relays.clone())));
//! let router = PaymentRouter::builder(config, profiles, pool)
//!     .with_direct_wallet(wallet)
//!     .with_settlement_rail(ecash)
//!     .with_identity(keys)
//!     .build()?;
//!
//! let results = router
//!     .process_payouts(vec![PayoutRecipient::parse("npub1...", 1_000)?])
//!     .await;
//! ```

pub mod address;
pub mod config;
pub mod errors;
pub mod executors;
pub mod gift_wrap;
pub mod lnurl;
pub mod nostr;
pub mod prelude;
pub mod relay;
pub mod routing;

/// Test doubles for every injected collaborator.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use errors::{PayrailError, PayrailErrorCode};

/// Common result alias for payrail operations.
pub type Result<T> = std::result::Result<T, PayrailError>;
