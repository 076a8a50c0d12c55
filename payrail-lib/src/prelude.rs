//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use payrail_lib::prelude::*;
//! ```

// Error handling
pub use crate::errors::{PayrailError, PayrailErrorCode};
pub use crate::Result;

// Configuration
pub use crate::config::{LnurlConfig, ProfileStoreConfig, RouterConfig};

// Identity and events
pub use crate::nostr::{Event, Keys, PublicKey, Rumor};

// Address resolution
pub use crate::address::{
    AddressResolver, AddressSource, LightningAddressRecord, Profile, ProfileStore,
    RelayProfileStore,
};
pub use crate::lnurl::{LnurlInvoiceResolver, ResolvedLnurlEndpoint};

// Relays and gift wraps
pub use crate::gift_wrap::{GiftWrapCodec, GiftWrapInbox, InboxDisposer, UnwrappedGift};
pub use crate::relay::{PublishReport, RelayPool, RelaySubscription, SubscriptionHandler};

// Wallet capabilities
pub use crate::executors::{
    DirectResult, DirectWallet, DmResult, InvoiceSettlement, LnurlResult, SettlementRail,
    TokenMint,
};

// Routing
pub use crate::routing::{
    FixedIntervalPacer, NoPacing, PaymentMethod, PaymentResult, PaymentRouter, PayoutPacer,
    PayoutRecipient, RailAttempt, RouteReport, RouteState,
};
