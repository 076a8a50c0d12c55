//! Test fixtures and data generators.

use crate::nostr::{Keys, PublicKey};
use crate::routing::PayoutRecipient;

/// Relay URL used by single-relay tests.
pub const RELAY: &str = "wss://relay.test";

/// Secret key from the NIP-06 test vectors.
pub const SENDER_SECRET_HEX: &str =
    "7f7ff03d123792d6ac594bfa67bf6d0c0ab55b6b1fdb6249303fe861f1ccba9a";

/// Sample BOLT11 invoice returned by mocked LNURL callbacks.
pub const SAMPLE_INVOICE: &str = "lnbc10u1pjtestpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdqqcqzzsxqyz5vq";

/// A fixed sender identity.
pub fn sender_keys() -> Keys {
    Keys::from_secret_hex(SENDER_SECRET_HEX).expect("fixture secret is valid")
}

/// A fresh random public key.
pub fn random_pubkey() -> PublicKey {
    Keys::generate().public_key()
}

/// A recipient with a fresh random identity.
pub fn recipient(amount_sats: u64) -> PayoutRecipient {
    PayoutRecipient::new(random_pubkey(), amount_sats).expect("amount must be positive")
}

/// LNURL-pay discovery body for the given bounds (millisats).
pub fn pay_request_json(callback: &str, min_msat: u64, max_msat: u64) -> serde_json::Value {
    serde_json::json!({
        "tag": "payRequest",
        "callback": callback,
        "minSendable": min_msat,
        "maxSendable": max_msat,
        "metadata": "[[\"text/plain\",\"Pay to test\"]]",
        "commentAllowed": 140
    })
}
