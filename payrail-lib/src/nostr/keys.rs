//! secp256k1 identities for nostr events.
//!
//! Key material is handed in by the host identity provider; derivation from a
//! mnemonic lives outside this crate.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use bech32::{Bech32, Hrp};
use secp256k1::{schnorr, All, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::event::{Event, UnsignedEvent};
use crate::{PayrailError, Result};

const NPUB_HRP: &str = "npub";

pub(crate) fn secp() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

/// x-only public key identifying a nostr user.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(XOnlyPublicKey);

impl PublicKey {
    /// Parse a 64-character hex public key.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| PayrailError::invalid_data("pubkey", e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Parse 32 raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        XOnlyPublicKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| PayrailError::invalid_data("pubkey", e.to_string()))
    }

    /// Parse a bech32 `npub1...` identifier.
    pub fn from_npub(npub: &str) -> Result<Self> {
        let (hrp, data) = bech32::decode(npub.trim())
            .map_err(|e| PayrailError::invalid_data("npub", e.to_string()))?;
        if !hrp.to_string().eq_ignore_ascii_case(NPUB_HRP) {
            return Err(PayrailError::invalid_data(
                "npub",
                format!("unexpected prefix {}", hrp),
            ));
        }
        Self::from_slice(&data)
    }

    /// Parse either hex or npub form.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.starts_with(NPUB_HRP) {
            Self::from_npub(value)
        } else {
            Self::from_hex(value)
        }
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }

    /// Raw 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.serialize()
    }

    /// Public identifier text form (`npub1...`).
    pub fn to_npub(&self) -> String {
        // Constant hrp and a 32-byte payload: encoding cannot fail.
        Hrp::parse(NPUB_HRP)
            .ok()
            .and_then(|hrp| bech32::encode::<Bech32>(hrp, &self.0.serialize()).ok())
            .unwrap_or_else(|| self.to_hex())
    }

    pub(crate) fn as_xonly(&self) -> &XOnlyPublicKey {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = PayrailError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// A signing identity: secret key plus its x-only public key.
///
/// The secret is erased from memory when the value is dropped.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
    public_key: PublicKey,
}

impl Keys {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        let keypair = Keypair::new(secp(), &mut rand::thread_rng());
        Self::from_keypair(keypair)
    }

    /// Build from a 32-byte secret.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(secret)
            .map_err(|e| PayrailError::invalid_data("secret_key", e.to_string()))?;
        Ok(Self::from_keypair(Keypair::from_secret_key(
            secp(),
            &secret_key,
        )))
    }

    /// Build from a 64-character hex secret.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = zeroize::Zeroizing::new(
            hex::decode(secret_hex.trim())
                .map_err(|e| PayrailError::invalid_data("secret_key", e.to_string()))?,
        );
        Self::from_secret_bytes(&bytes)
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let (xonly, _parity) = keypair.x_only_public_key();
        Self {
            keypair,
            public_key: PublicKey(xonly),
        }
    }

    /// The public half of this identity.
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Sign `event`, which must be authored by this identity.
    pub fn sign_event(&self, event: UnsignedEvent) -> Result<Event> {
        event.sign(self)
    }

    pub(crate) fn secret_key(&self) -> SecretKey {
        self.keypair.secret_key()
    }

    /// BIP-340 signature over a 32-byte digest.
    pub(crate) fn sign_digest(&self, digest: [u8; 32]) -> schnorr::Signature {
        let message = Message::from_digest(digest);
        secp().sign_schnorr(&message, &self.keypair)
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl Drop for Keys {
    fn drop(&mut self) {
        self.keypair.non_secure_erase();
    }
}

/// Verify a BIP-340 signature over a 32-byte digest.
pub(crate) fn verify_digest(
    public_key: &PublicKey,
    digest: [u8; 32],
    signature: &schnorr::Signature,
) -> Result<()> {
    let message = Message::from_digest(digest);
    secp()
        .verify_schnorr(signature, &message, public_key.as_xonly())
        .map_err(|e| PayrailError::Crypto(format!("invalid signature: {}", e)))
}
