//! AES-256-GCM sealing and PBKDF2 key derivation using `ring`.
//!
//! Every [`seal`] draws a fresh random 96-bit nonce. The associated data
//! passed to [`seal`] must be passed unchanged to [`open`]; the store uses
//! it to bind each ciphertext to the identity of the row holding it, so a
//! blob copied onto another row fails authentication.

use std::fmt;
use std::num::NonZeroU32;

use ring::aead::{
    self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey,
};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, StoreError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Length of a PBKDF2 salt in bytes.
pub const SALT_LEN: usize = 32;

/// OWASP 2023 recommendation for PBKDF2-HMAC-SHA256.
const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(600_000) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

/// A 256-bit key that seals vault items.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Generate a key from the system CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; KEY_LEN];
        fill_random(&mut key)?;
        Ok(Self(key))
    }

    /// Wrap existing key material.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKeyLength`] unless `bytes` is exactly
    /// [`KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| StoreError::InvalidKeyLength {
            expected: KEY_LEN,
            found: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Derive a key from a passphrase and a stored salt.
    pub fn derive(passphrase: &[u8], salt: &[u8]) -> Self {
        let mut key = [0u8; KEY_LEN];
        derive_key_with_salt(passphrase, salt, &mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// Yields one nonce, then refuses. Each key binding is used exactly once.
struct OneShot(Option<[u8; NONCE_LEN_BYTES]>);

impl NonceSequence for OneShot {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Sealing
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
///
/// Returns `(nonce, ciphertext)`; the ciphertext carries the
/// [`TAG_LEN`]-byte tag at its end.
///
/// # Errors
///
/// Returns [`StoreError::RandomUnavailable`] if no nonce can be drawn, or
/// [`StoreError::EncryptionFailed`] if `ring` rejects the operation.
pub fn seal(
    key: &MasterKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; NONCE_LEN_BYTES], Vec<u8>)> {
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    fill_random(&mut nonce)?;

    let unbound = UnboundKey::new(AEAD_ALG, key.as_bytes()).map_err(|_| {
        StoreError::EncryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?;
    let mut sealing = SealingKey::new(unbound, OneShot(Some(nonce)));

    let mut in_out = plaintext.to_vec();
    sealing
        .seal_in_place_append_tag(Aad::from(aad), &mut in_out)
        .map_err(|_| StoreError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "sealed blob"
    );
    Ok((nonce, in_out))
}

/// Decrypt a ciphertext produced by [`seal`] with the same `key` and `aad`.
///
/// # Errors
///
/// Returns [`StoreError::DecryptionFailed`] if the key or associated data
/// differ, or the ciphertext was modified.
pub fn open(
    key: &MasterKey,
    nonce: &[u8; NONCE_LEN_BYTES],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let unbound = UnboundKey::new(AEAD_ALG, key.as_bytes()).map_err(|_| {
        StoreError::DecryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?;
    let mut opening = OpeningKey::new(unbound, OneShot(Some(*nonce)));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening
        .open_in_place(Aad::from(aad), &mut in_out)
        .map_err(|_| StoreError::DecryptionFailed {
            reason: "authentication failed: wrong key or corrupted data".into(),
        })?;

    tracing::trace!(
        ciphertext_len = ciphertext.len(),
        plaintext_len = plaintext.len(),
        "opened blob"
    );
    Ok(plaintext.to_vec())
}

// ---------------------------------------------------------------------------
// Key derivation and randomness
// ---------------------------------------------------------------------------

/// PBKDF2-HMAC-SHA256 of `password` with `salt` into `out`.
pub fn derive_key_with_salt(password: &[u8], salt: &[u8], out: &mut [u8; KEY_LEN]) {
    pbkdf2::derive(PBKDF2_ALG, PBKDF2_ITERATIONS, salt, password, out);
}

/// `len` bytes from the system CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    fill_random(&mut buf)?;
    Ok(buf)
}

fn fill_random(buf: &mut [u8]) -> Result<()> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| StoreError::RandomUnavailable)
}
