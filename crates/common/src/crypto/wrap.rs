//! Key wrapping with RSA-OAEP
//!
//! Symmetric keys are encrypted under the recipient's RSA public key with
//! OAEP padding (SHA-256 digest, MGF1-SHA256, empty label). Unwrapping runs
//! blinded RSA decryption and reports every failure as the same
//! [`WrapError::Unwrap`], so callers cannot tell a wrong key from corrupted
//! bytes or a bad padding check.

use std::ops::Deref;

use rand::{CryptoRng, RngCore};
use rsa::Oaep;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::{PrivateKey, PublicKey};

/// Output length of the OAEP digest (SHA-256) in bytes
const OAEP_HASH_SIZE: usize = 32;

/// Errors that can occur while wrapping or unwrapping key material
#[derive(Debug, thiserror::Error)]
pub enum WrapError {
    #[error("key of {len} bytes is too large to wrap, at most {max} bytes fit")]
    KeyTooLarge { len: usize, max: usize },
    #[error("unable to unwrap key")]
    Unwrap,
    #[error("key wrap failed: {0}")]
    Encrypt(String),
}

/// A symmetric key encrypted for one recipient
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for WrappedKey {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for WrappedKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for WrappedKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedKey({} bytes)", self.0.len())
    }
}

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// Largest key, in bytes, that fits under `public` with OAEP-SHA256
pub fn max_wrap_len(public: &PublicKey) -> usize {
    public.size().saturating_sub(2 * OAEP_HASH_SIZE + 2)
}

/// Encrypt `key` so only the holder of the matching private key can read it
///
/// The result is always exactly `public.size()` bytes.
///
/// # Errors
///
/// Returns [`WrapError::KeyTooLarge`] if `key` is longer than
/// [`max_wrap_len`].
pub fn wrap<R: RngCore + CryptoRng>(
    key: &[u8],
    public: &PublicKey,
    rng: &mut R,
) -> Result<WrappedKey, WrapError> {
    let max = max_wrap_len(public);
    if key.len() > max {
        return Err(WrapError::KeyTooLarge {
            len: key.len(),
            max,
        });
    }
    let wrapped = public
        .as_rsa()
        .encrypt(rng, oaep(), key)
        .map_err(|e| WrapError::Encrypt(e.to_string()))?;
    Ok(WrappedKey(wrapped))
}

/// Recover a key wrapped by [`wrap`]
///
/// # Errors
///
/// Returns [`WrapError::Unwrap`] for a wrong private key, corrupted or
/// truncated bytes, or a failed padding check, without distinguishing them.
pub fn unwrap<R: RngCore + CryptoRng>(
    wrapped: &WrappedKey,
    private: &PrivateKey,
    rng: &mut R,
) -> Result<Zeroizing<Vec<u8>>, WrapError> {
    if wrapped.len() != private.public().size() {
        return Err(WrapError::Unwrap);
    }
    private
        .as_rsa()
        .decrypt_blinded(rng, oaep(), wrapped.bytes())
        .map(Zeroizing::new)
        .map_err(|_| WrapError::Unwrap)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::keys::KeyPair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn pair(seed: u64) -> KeyPair {
        KeyPair::generate(2048, &mut ChaCha20Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_wrap_unwrap() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let pair = pair(1);
        let key = [42u8; 32];

        let wrapped = wrap(&key, &pair.public, &mut rng).unwrap();
        assert_eq!(wrapped.len(), pair.public.size());

        let recovered = unwrap(&wrapped, &pair.private, &mut rng).unwrap();
        assert_eq!(recovered.as_slice(), &key);
    }

    #[test]
    fn test_wrap_is_randomized() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let pair = pair(1);
        let a = wrap(&[7u8; 32], &pair.public, &mut rng).unwrap();
        let b = wrap(&[7u8; 32], &pair.public, &mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unwrap_with_wrong_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let alice = pair(1);
        let bob = pair(2);

        let wrapped = wrap(&[1u8; 32], &alice.public, &mut rng).unwrap();
        assert!(matches!(
            unwrap(&wrapped, &bob.private, &mut rng),
            Err(WrapError::Unwrap)
        ));
    }

    #[test]
    fn test_unwrap_corrupted() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let pair = pair(1);
        let wrapped = wrap(&[1u8; 32], &pair.public, &mut rng).unwrap();

        let mut corrupted = wrapped.bytes().to_vec();
        corrupted[100] ^= 0x01;
        assert!(matches!(
            unwrap(&corrupted.into(), &pair.private, &mut rng),
            Err(WrapError::Unwrap)
        ));

        let truncated = WrappedKey::from(&wrapped[..wrapped.len() - 1]);
        assert!(matches!(
            unwrap(&truncated, &pair.private, &mut rng),
            Err(WrapError::Unwrap)
        ));
    }

    #[test]
    fn test_key_too_large() {
        let mut rng = ChaCha20Rng::seed_from_u64(14);
        let pair = pair(1);
        let max = max_wrap_len(&pair.public);
        assert_eq!(max, 256 - 66);

        assert!(wrap(&vec![0u8; max], &pair.public, &mut rng).is_ok());
        match wrap(&vec![0u8; max + 1], &pair.public, &mut rng) {
            Err(WrapError::KeyTooLarge { len, max: reported }) => {
                assert_eq!(len, max + 1);
                assert_eq!(reported, max);
            }
            other => panic!("expected KeyTooLarge, got {:?}", other),
        }
    }
}
