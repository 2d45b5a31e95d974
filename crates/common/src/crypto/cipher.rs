//! AES-256-CTR stream transform
//!
//! Encryption and decryption are one operation: the keystream generated
//! from `(key, nonce)` is XORed into the data, so applying [`transform`]
//! twice with the same inputs returns the original bytes. Output length
//! always equals input length.
//!
//! The nonce is the full 128-bit initial counter block, incremented
//! big-endian per 16-byte block. Because the keystream at any offset can be
//! computed directly, [`transform_at`] lets callers process chunks
//! independently.

use aes::Aes256;
use ctr::cipher::{Iv, Key, KeyIvInit, StreamCipher, StreamCipherSeek};

use super::secret::{DataKey, Nonce, NONCE_SIZE, SECRET_SIZE};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("invalid {what} length, expected {expected} bytes, got {actual}")]
    InvalidParameter {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn keystream(key: &DataKey, nonce: &Nonce) -> Aes256Ctr {
    let key = Key::<Aes256Ctr>::from_slice(key.as_bytes());
    let iv = Iv::<Aes256Ctr>::from_slice(nonce.as_bytes());
    Aes256Ctr::new(key, iv)
}

/// Apply the keystream to `buf` in place
pub fn transform_in_place(key: &DataKey, nonce: &Nonce, buf: &mut [u8]) {
    keystream(key, nonce).apply_keystream(buf);
}

/// Encrypt or decrypt `data`, returning a new buffer of the same length
pub fn transform(key: &DataKey, nonce: &Nonce, data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    transform_in_place(key, nonce, &mut out);
    out
}

/// Apply the keystream to `buf` as if it started `offset` bytes into the
/// message
///
/// `transform_at(k, n, 0, buf)` is identical to [`transform_in_place`].
pub fn transform_at(key: &DataKey, nonce: &Nonce, offset: u64, buf: &mut [u8]) {
    let mut cipher = keystream(key, nonce);
    cipher.seek(offset);
    cipher.apply_keystream(buf);
}

/// [`transform`] over raw key and nonce slices
///
/// # Errors
///
/// Returns [`CipherError::InvalidParameter`] unless `key` is 32 bytes and
/// `nonce` is 16 bytes.
pub fn transform_slices(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError> {
    let key = DataKey::from_slice(key).map_err(|_| CipherError::InvalidParameter {
        what: "key",
        expected: SECRET_SIZE,
        actual: key.len(),
    })?;
    let nonce = Nonce::from_slice(nonce).map_err(|_| CipherError::InvalidParameter {
        what: "nonce",
        expected: NONCE_SIZE,
        actual: nonce.len(),
    })?;
    Ok(transform(&key, &nonce, data))
}
