//! Nostr protocol primitives.
//!
//! Just enough of NIP-01 (events, filters, signatures) and NIP-44 v2 to build
//! and open gift-wrapped messages and read kind-0 profiles.

mod event;
mod keys;
pub mod nip44;

pub use event::{event_hash, unix_now, Event, Filter, Kind, Rumor, UnsignedEvent};
pub use keys::{Keys, PublicKey};
