use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::RelayPool;
use crate::nostr::Event;
use crate::{PayrailError, Result};

/// Per-relay outcome of a publish.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Relays that accepted the event.
    pub accepted: Vec<String>,
    /// Relays that rejected it, with the reason.
    pub rejected: Vec<(String, String)>,
}

impl PublishReport {
    /// Whether at least one relay accepted.
    pub fn is_delivered(&self) -> bool {
        !self.accepted.is_empty()
    }
}

/// Publishes events to every relay at once.
#[derive(Clone)]
pub struct RelayPublisher {
    pool: Arc<dyn RelayPool>,
}

impl RelayPublisher {
    pub fn new(pool: Arc<dyn RelayPool>) -> Self {
        Self { pool }
    }

    /// Publish `event` to all `relays` concurrently.
    ///
    /// Succeeds when any relay accepts. Fails with
    /// [`PayrailError::DeliveryFailed`] when none does or `relays` is empty.
    pub async fn publish(&self, event: &Event, relays: &[String]) -> Result<PublishReport> {
        if relays.is_empty() {
            return Err(PayrailError::DeliveryFailed {
                attempted: 0,
                reason: "no relays configured".to_string(),
            });
        }

        let outcomes = join_all(relays.iter().map(|relay| async move {
            (relay.clone(), self.pool.publish(relay, event).await)
        }))
        .await;

        let mut report = PublishReport::default();
        for (relay, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!(relay = %relay, event_id = %event.id, "Relay accepted event");
                    report.accepted.push(relay);
                }
                Err(e) => {
                    warn!(relay = %relay, event_id = %event.id, error = %e, "Relay rejected event");
                    report.rejected.push((relay, e.to_string()));
                }
            }
        }

        if report.is_delivered() {
            Ok(report)
        } else {
            Err(PayrailError::DeliveryFailed {
                attempted: relays.len(),
                reason: report
                    .rejected
                    .last()
                    .map(|(_, reason)| reason.clone())
                    .unwrap_or_default(),
            })
        }
    }
}
