//! NIP-44 v2 authenticated encryption.
//!
//! Used for both inner layers of a gift wrap. A conversation key is derived
//! once per (secret, public) pair; every message then draws a random 32-byte
//! nonce from which the ChaCha20 key, ChaCha20 nonce and HMAC key are
//! expanded.
//!
//! # Wire Format
//!
//! ```text
//! base64( [1 byte version = 2][32 bytes nonce][N bytes ciphertext][32 bytes mac] )
//! ```
//!
//! The plaintext is padded before encryption to hide its exact length.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use secp256k1::{ecdh, Parity, SecretKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::{Keys, PublicKey};

type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 2;
const SALT: &[u8] = b"nip44-v2";
const NONCE_SIZE: usize = 32;
const MAC_SIZE: usize = 32;
const MIN_PLAINTEXT_SIZE: usize = 1;
const MAX_PLAINTEXT_SIZE: usize = 65535;
const MIN_PAYLOAD_B64: usize = 132;
const MAX_PAYLOAD_B64: usize = 87472;
const MIN_PAYLOAD_RAW: usize = 99;
const MAX_PAYLOAD_RAW: usize = 65603;

/// NIP-44 error types.
#[derive(Debug, thiserror::Error)]
pub enum Nip44Error {
    #[error("plaintext length {0} outside 1..=65535")]
    PlaintextLength(usize),
    #[error("unknown encryption version: {0}")]
    UnsupportedVersion(u8),
    #[error("invalid payload size: {0}")]
    PayloadSize(usize),
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("invalid MAC")]
    InvalidMac,
    #[error("invalid padding")]
    InvalidPadding,
    #[error("plaintext is not UTF-8")]
    InvalidUtf8,
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Result type for NIP-44 operations.
pub type Nip44Result<T> = Result<T, Nip44Error>;

impl From<Nip44Error> for crate::PayrailError {
    fn from(err: Nip44Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

/// Shared key for one (secret, public) pair; symmetric between the two parties.
#[derive(Clone)]
pub struct ConversationKey(Zeroizing<[u8; 32]>);

impl ConversationKey {
    /// ECDH on secp256k1 followed by HKDF-extract with the `nip44-v2` salt.
    pub fn derive(secret: &SecretKey, public: &PublicKey) -> Self {
        let full = public.as_xonly().public_key(Parity::Even);
        let point = Zeroizing::new(ecdh::shared_secret_point(&full, secret));
        let (prk, _) = Hkdf::<Sha256>::extract(Some(SALT), &point[..32]);
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&prk);
        Self(key)
    }

    /// Conversation key between `keys` and `public`.
    pub fn between(keys: &Keys, public: &PublicKey) -> Self {
        Self::derive(&keys.secret_key(), public)
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

struct MessageKeys {
    okm: Zeroizing<[u8; 76]>,
}

impl MessageKeys {
    fn derive(conversation_key: &ConversationKey, nonce: &[u8]) -> Nip44Result<Self> {
        let hk = Hkdf::<Sha256>::from_prk(conversation_key.as_bytes())
            .map_err(|e| Nip44Error::KeyDerivation(e.to_string()))?;
        let mut okm = Zeroizing::new([0u8; 76]);
        hk.expand(nonce, &mut okm[..])
            .map_err(|e| Nip44Error::KeyDerivation(e.to_string()))?;
        Ok(Self { okm })
    }

    fn chacha_key(&self) -> &[u8] {
        &self.okm[0..32]
    }

    fn chacha_nonce(&self) -> &[u8] {
        &self.okm[32..44]
    }

    fn hmac_key(&self) -> &[u8] {
        &self.okm[44..76]
    }

    fn apply_keystream(&self, buf: &mut [u8]) -> Nip44Result<()> {
        let mut cipher = ChaCha20::new_from_slices(self.chacha_key(), self.chacha_nonce())
            .map_err(|e| Nip44Error::KeyDerivation(e.to_string()))?;
        cipher.apply_keystream(buf);
        Ok(())
    }

    fn mac(&self, nonce: &[u8], ciphertext: &[u8]) -> Nip44Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.hmac_key())
            .map_err(|e| Nip44Error::KeyDerivation(e.to_string()))?;
        mac.update(nonce);
        mac.update(ciphertext);
        Ok(mac)
    }
}

/// Padded length for a plaintext of `len` bytes.
pub fn calc_padded_len(len: usize) -> usize {
    if len <= 32 {
        return 32;
    }
    let next_power = 1usize << (usize::BITS - (len - 1).leading_zeros());
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * ((len - 1) / chunk + 1)
}

fn pad(plaintext: &[u8]) -> Nip44Result<Vec<u8>> {
    let len = plaintext.len();
    if !(MIN_PLAINTEXT_SIZE..=MAX_PLAINTEXT_SIZE).contains(&len) {
        return Err(Nip44Error::PlaintextLength(len));
    }
    let padded_len = calc_padded_len(len);
    let mut out = Vec::with_capacity(2 + padded_len);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(plaintext);
    out.resize(2 + padded_len, 0);
    Ok(out)
}

fn unpad(padded: &[u8]) -> Nip44Result<&[u8]> {
    if padded.len() < 2 {
        return Err(Nip44Error::InvalidPadding);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if len < MIN_PLAINTEXT_SIZE
        || padded.len() < 2 + len
        || padded.len() != 2 + calc_padded_len(len)
    {
        return Err(Nip44Error::InvalidPadding);
    }
    Ok(&padded[2..2 + len])
}

/// Encrypt with a fresh random nonce.
pub fn encrypt(conversation_key: &ConversationKey, plaintext: &str) -> Nip44Result<String> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    encrypt_with_nonce(conversation_key, plaintext, &nonce)
}

/// Encrypt with a caller-supplied nonce. Only deterministic tests should use this.
pub fn encrypt_with_nonce(
    conversation_key: &ConversationKey,
    plaintext: &str,
    nonce: &[u8; NONCE_SIZE],
) -> Nip44Result<String> {
    let keys = MessageKeys::derive(conversation_key, nonce)?;
    let mut buf = pad(plaintext.as_bytes())?;
    keys.apply_keystream(&mut buf)?;
    let tag = keys.mac(nonce, &buf)?.finalize().into_bytes();

    let mut payload = Vec::with_capacity(1 + NONCE_SIZE + buf.len() + MAC_SIZE);
    payload.push(VERSION);
    payload.extend_from_slice(nonce);
    payload.extend_from_slice(&buf);
    payload.extend_from_slice(&tag);
    Ok(BASE64.encode(payload))
}

/// Decrypt and authenticate a payload.
pub fn decrypt(conversation_key: &ConversationKey, payload: &str) -> Nip44Result<String> {
    if payload.starts_with('#') {
        return Err(Nip44Error::UnsupportedVersion(0));
    }
    if !(MIN_PAYLOAD_B64..=MAX_PAYLOAD_B64).contains(&payload.len()) {
        return Err(Nip44Error::PayloadSize(payload.len()));
    }
    let raw = BASE64
        .decode(payload)
        .map_err(|e| Nip44Error::Base64(e.to_string()))?;
    if !(MIN_PAYLOAD_RAW..=MAX_PAYLOAD_RAW).contains(&raw.len()) {
        return Err(Nip44Error::PayloadSize(raw.len()));
    }
    if raw[0] != VERSION {
        return Err(Nip44Error::UnsupportedVersion(raw[0]));
    }

    let nonce = &raw[1..1 + NONCE_SIZE];
    let ciphertext = &raw[1 + NONCE_SIZE..raw.len() - MAC_SIZE];
    let tag = &raw[raw.len() - MAC_SIZE..];

    let keys = MessageKeys::derive(conversation_key, nonce)?;
    keys.mac(nonce, ciphertext)?
        .verify_slice(tag)
        .map_err(|_| Nip44Error::InvalidMac)?;

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    keys.apply_keystream(&mut buf)?;
    let plaintext = unpad(&buf)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| Nip44Error::InvalidUtf8)
}
