//! Cryptographic primitives for pixseal
//!
//! This module provides the building blocks of the sealing protocol:
//!
//! - **Key Management**: RSA key pairs (2048-4096 bit) with DER/PEM encoding
//! - **Key Wrapping**: RSA-OAEP(SHA-256) for recipient keys, or Argon2id +
//!   AES key wrap for password-protected bundles
//! - **Encryption**: AES-256-CTR, one symmetric `transform` for both directions
//! - **Authentication**: HMAC-SHA256, verified in constant time
//!
//! # Security Model
//!
//! ## Per-bundle keys
//! Every seal draws a fresh [`DataKey`], an independent [`AuthKey`] and a
//! fresh [`Nonce`]. None of them are reused across bundles, so a
//! `(key, nonce)` pair never repeats.
//!
//! ## Encrypt-then-MAC
//! The tag covers the nonce and the ciphertext, never the plaintext, and is
//! checked before a single byte is decrypted.
//!
//! ## Randomness
//! Every function that needs randomness takes an explicit
//! `RngCore + CryptoRng` source. Production callers pass `OsRng`; tests pass
//! a seeded generator.

pub mod auth;
pub mod cipher;
mod keys;
pub mod password;
mod secret;
pub mod wrap;

pub use cipher::CipherError;
pub use keys::{
    KeyError, KeyPair, PrivateKey, PublicKey, DEFAULT_KEY_BITS, MAX_KEY_BITS, MIN_KEY_BITS,
};
pub use password::{PasswordError, PasswordParams, Salt};
pub use secret::{AuthKey, DataKey, Nonce, SecretError, Tag, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};
pub use wrap::{WrapError, WrappedKey};

/// Generate a key pair using the operating system's CSPRNG
pub fn generate_key_pair(bits: usize) -> Result<KeyPair, KeyError> {
    KeyPair::generate(bits, &mut rand::rngs::OsRng)
}
