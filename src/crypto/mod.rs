//! Randomness and at-rest sealing of stored key material.
//!
//! The key store never runs the algorithms a key is meant for. It only
//! needs random bytes for fresh material and a password-derived key to
//! seal that material inside the image.

pub mod aead;
pub mod kdf;

pub use aead::Sealer;
pub use kdf::{KdfParams, derive_key};

use crate::error::{Error, Result};

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the nonce (24 bytes for XChaCha20-Poly1305).
pub const NONCE_LEN: usize = 24;
/// Length of the Poly1305 tag.
pub const TAG_LEN: usize = 16;
/// Length of the sealing key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random(buf: &mut [u8]) -> Result<()> {
    getrandom::fill(buf).map_err(|_| Error::RandomUnavailable)
}

/// Generate salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}
