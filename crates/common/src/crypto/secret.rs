//! Symmetric key material for a single sealing operation
//!
//! Every sealed bundle is protected by two independent 256-bit keys:
//! - a [`DataKey`] that drives the AES-256-CTR keystream
//! - an [`AuthKey`] that drives the HMAC-SHA256 tag
//!
//! plus a 128-bit [`Nonce`] used as the initial counter block. All three are
//! drawn fresh from a caller-supplied CSPRNG on every seal. Key types zeroize
//! their bytes on drop.

use std::fmt;

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 data key and the HMAC key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of the AES-CTR nonce (initial counter block) in bytes
pub const NONCE_SIZE: usize = 16;
/// Size of an HMAC-SHA256 tag in bytes
pub const TAG_SIZE: usize = 32;

/// Errors from building key material out of untrusted bytes
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("invalid {what} size, expected {expected}, got {actual}")]
    InvalidSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn copy_exact<const N: usize>(what: &'static str, data: &[u8]) -> Result<[u8; N], SecretError> {
    if data.len() != N {
        return Err(SecretError::InvalidSize {
            what,
            expected: N,
            actual: data.len(),
        });
    }
    let mut buff = [0; N];
    buff.copy_from_slice(data);
    Ok(buff)
}

macro_rules! symmetric_key {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; SECRET_SIZE]);

        impl $name {
            /// Draw a fresh key from a cryptographically secure RNG
            pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
                let mut buff = [0; SECRET_SIZE];
                rng.fill_bytes(&mut buff);
                Self(buff)
            }

            /// Create a key from a byte slice of exactly `SECRET_SIZE` bytes
            pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
                copy_exact($what, data).map(Self)
            }

            pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
                &self.0
            }
        }

        impl From<[u8; SECRET_SIZE]> for $name {
            fn from(bytes: [u8; SECRET_SIZE]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "(<redacted>)"))
            }
        }
    };
}

symmetric_key!(
    /// AES-256 key encrypting the payload of one bundle
    DataKey,
    "data key"
);

symmetric_key!(
    /// HMAC-SHA256 key authenticating the ciphertext of one bundle
    ///
    /// Always generated independently of the [`DataKey`]; the two are never
    /// derived from each other.
    AuthKey,
    "auth key"
);

/// Initial AES-CTR counter block
///
/// Reusing a nonce under the same [`DataKey`] leaks the XOR of the two
/// plaintexts, so the orchestrator draws a new one with every data key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut buff = [0; NONCE_SIZE];
        rng.fill_bytes(&mut buff);
        Self(buff)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        copy_exact("nonce", data).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; NONCE_SIZE]> for Nonce {
    fn from(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_hex())
    }
}

/// HMAC-SHA256 authentication tag
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tag([u8; TAG_SIZE]);

impl Tag {
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        copy_exact("tag", data).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; TAG_SIZE]> for Tag {
    fn from(bytes: [u8; TAG_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.to_hex())
    }
}
