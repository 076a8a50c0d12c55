//! Relay pool seam and publish fan-out.
//!
//! Socket transport is owned by the host; this crate only talks to a
//! [`RelayPool`]. [`RelayPublisher`] fans one event out to many relays and
//! reports which of them accepted it.

mod publisher;

pub use publisher::{PublishReport, RelayPublisher};

use std::sync::Arc;

use async_trait::async_trait;

use crate::nostr::{Event, Filter};
use crate::Result;

/// Receives events for a subscription.
///
/// Called from whatever task drives the pool; implementations must not block.
pub trait SubscriptionHandler: Send + Sync {
    /// An event matching the subscription filters arrived from `relay`.
    fn on_event(&self, relay: &str, event: Event);

    /// `relay` has sent every stored event and is now streaming live ones.
    fn on_end_of_stored_events(&self, _relay: &str) {}
}

/// Handle to an open subscription.
pub trait RelaySubscription: Send + Sync {
    /// Stop delivering events. Calling more than once is a no-op.
    fn close(&self);
}

/// Connection pool to a set of relays.
#[async_trait]
pub trait RelayPool: Send + Sync {
    /// Publish `event` to a single relay, resolving once the relay answers.
    async fn publish(&self, relay: &str, event: &Event) -> Result<()>;

    /// Open one subscription spanning `relays`.
    async fn subscribe_many(
        &self,
        relays: &[String],
        filters: Vec<Filter>,
        handler: Arc<dyn SubscriptionHandler>,
    ) -> Result<Box<dyn RelaySubscription>>;
}
