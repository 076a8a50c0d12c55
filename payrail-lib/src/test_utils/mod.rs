//! Test utilities for payrail.
//!
//! In-memory stand-ins for every collaborator the router talks to:
//! - [`MemoryRelayPool`]: a relay pool that stores and replays events
//! - [`StaticProfileStore`]: canned kind-0 profiles
//! - [`MockDirectWallet`] and [`MockSettlementRail`]: scripted wallets
//!   that record what they were asked to do
//!
//! ## Usage
//!
//! ```rust,ignore
//! use payrail_lib::test_utils::{fixtures, MemoryRelayPool, MockSettlementRail, StaticProfileStore};
//!
//! let pool = Arc::new(MemoryRelayPool::new());
//! let router = PaymentRouter::builder(config, Arc::new(StaticProfileStore::new()), pool.clone())
//!     .with_settlement_rail(Arc::new(MockSettlementRail::new()))
//!     .with_identity(fixtures::sender_keys())
//!     .build()?;
//! ```

mod assertions;
pub mod fixtures;
mod mock_relay;
mod mock_wallet;

pub use assertions::{assert_delivered_to, assert_payment_failed, assert_payment_succeeded};
pub use mock_relay::MemoryRelayPool;
pub use mock_wallet::{MockDirectWallet, MockSettlementRail, StaticProfileStore};
