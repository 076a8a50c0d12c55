//! Test assertions and verification helpers.

use super::MemoryRelayPool;
use crate::gift_wrap::GiftWrapCodec;
use crate::nostr::Keys;
use crate::routing::{PaymentMethod, PaymentResult};

/// Assert that a payment settled on `method`.
///
/// # Panics
/// Panics if the payment failed or used another rail.
pub fn assert_payment_succeeded(result: &PaymentResult, method: PaymentMethod) {
    assert!(
        result.success,
        "Payment should have succeeded, got error: {:?}",
        result.error
    );
    assert_eq!(result.method, method, "Payment settled on the wrong rail");
}

/// Assert that a payment exhausted every rail.
///
/// # Panics
/// Panics if the payment succeeded.
pub fn assert_payment_failed(result: &PaymentResult) {
    assert!(!result.success, "Expected payment to fail, but it succeeded");
    assert_eq!(result.method, PaymentMethod::Failed);
    assert!(result.error.is_some(), "Failed payment should carry an error");
}

/// Assert that `relay` holds a gift wrap `recipient` can open, and return its
/// plaintext.
///
/// # Panics
/// Panics if no stored event on `relay` opens with `recipient`'s keys.
pub fn assert_delivered_to(pool: &MemoryRelayPool, relay: &str, recipient: &Keys) -> String {
    pool.stored_events(relay)
        .iter()
        .find_map(|event| GiftWrapCodec::unwrap(event, recipient).ok())
        .map(|gift| gift.rumor.content)
        .unwrap_or_else(|| panic!("No gift wrap for {} on {}", recipient.public_key(), relay))
}
