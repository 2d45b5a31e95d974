//! Sealing and opening payloads
//!
//! # Protocol Overview
//!
//! To seal a payload for a recipient:
//! 1. **Generate keys**: draw a fresh `DataKey`, an independent `AuthKey`
//!    and a fresh `Nonce`
//! 2. **Encrypt**: `ciphertext = AES-256-CTR(DataKey, Nonce, payload)`
//! 3. **Authenticate**: `tag = HMAC-SHA256(AuthKey, nonce || ciphertext)`
//! 4. **Wrap**: protect both keys under the recipient's public key (or a
//!    password-derived KEK)
//! 5. **Emit** the `SealedBundle`
//!
//! Opening is strictly ordered and fails closed:
//! 1. **Unwrap** both keys; any failure aborts with [`SealError::Unwrap`]
//! 2. **Verify** the tag; a mismatch aborts with
//!    [`SealError::TamperDetected`] before any decryption happens
//! 3. **Decrypt** and return the payload

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::bundle::{BundleError, KeyWrap, SealedBundle};
use crate::crypto::password::PasswordKek;
use crate::crypto::{
    auth, cipher, wrap, AuthKey, CipherError, DataKey, KeyError, Nonce, PasswordError,
    PasswordParams, PrivateKey, PublicKey, Salt, Tag, WrapError,
};

/// Every way sealing or opening can fail
///
/// None of these are transient; callers should surface them rather than
/// retry.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("malformed key: {0}")]
    KeyFormat(String),
    #[error("key of {len} bytes is too large to wrap, at most {max} bytes fit")]
    KeyTooLarge { len: usize, max: usize },
    #[error("unable to unwrap bundle keys")]
    Unwrap,
    #[error("authentication tag mismatch: bundle has been tampered with")]
    TamperDetected,
    #[error(transparent)]
    InvalidParameter(#[from] CipherError),
    #[error("malformed bundle: {0}")]
    BundleFormat(#[from] BundleError),
}

impl SealError {
    /// Whether this failure is an integrity violation rather than a usage or
    /// configuration problem
    pub fn is_tamper(&self) -> bool {
        matches!(self, SealError::TamperDetected)
    }
}

impl From<KeyError> for SealError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Generation(msg) => SealError::KeyGeneration(msg),
            KeyError::Format(msg) => SealError::KeyFormat(msg),
        }
    }
}

impl From<WrapError> for SealError {
    fn from(err: WrapError) -> Self {
        match err {
            WrapError::KeyTooLarge { len, max } => SealError::KeyTooLarge { len, max },
            WrapError::Unwrap => SealError::Unwrap,
            WrapError::Encrypt(msg) => SealError::KeyGeneration(msg),
        }
    }
}

impl From<PasswordError> for SealError {
    fn from(err: PasswordError) -> Self {
        SealError::KeyGeneration(err.to_string())
    }
}

/// Classify a KEK derivation failure while opening
///
/// Parameters come from the bundle, so out-of-range ones are a format
/// problem. Any other failure stays as opaque as a wrong password.
fn open_kdf_error(err: PasswordError) -> SealError {
    match err {
        PasswordError::Params(msg) => SealError::BundleFormat(BundleError::KdfParams(msg)),
        PasswordError::Derive(_) => SealError::Unwrap,
    }
}

/// Fresh key material for one bundle
struct SessionKeys {
    data_key: DataKey,
    auth_key: AuthKey,
    nonce: Nonce,
}

impl SessionKeys {
    fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, SealError> {
        let data_key = DataKey::generate(rng);
        let auth_key = AuthKey::generate(rng);
        // Identical keys only come out of a broken generator
        if data_key.as_bytes() == auth_key.as_bytes() {
            return Err(SealError::KeyGeneration(
                "rng produced identical data and auth keys".to_string(),
            ));
        }
        let nonce = Nonce::generate(rng);
        Ok(Self {
            data_key,
            auth_key,
            nonce,
        })
    }

    /// Encrypt and authenticate, returning `(ciphertext, tag)`
    fn encrypt(&self, payload: &[u8]) -> (Vec<u8>, Tag) {
        let ciphertext = cipher::transform(&self.data_key, &self.nonce, payload);
        let tag = auth::tag_parts(&self.auth_key, &[self.nonce.as_bytes(), &ciphertext]);
        (ciphertext, tag)
    }
}

fn unwrapped_keys(
    data_key: &[u8],
    auth_key: &[u8],
) -> Result<(DataKey, AuthKey), SealError> {
    // A wrong-length key is as opaque a failure as a bad padding check
    let data_key = DataKey::from_slice(data_key).map_err(|_| SealError::Unwrap)?;
    let auth_key = AuthKey::from_slice(auth_key).map_err(|_| SealError::Unwrap)?;
    Ok((data_key, auth_key))
}

/// Verify, then decrypt. The order here is the core guarantee of `open`.
fn verify_and_decrypt(
    bundle: &SealedBundle,
    data_key: &DataKey,
    auth_key: &AuthKey,
) -> Result<Vec<u8>, SealError> {
    let ciphertext = bundle.ciphertext();
    let nonce = bundle.nonce();
    if !auth::verify_parts(
        auth_key,
        &[nonce.as_bytes(), ciphertext],
        bundle.tag().as_bytes(),
    ) {
        tracing::warn!(len = ciphertext.len(), "bundle failed tag verification");
        return Err(SealError::TamperDetected);
    }
    tracing::trace!("tag verified");
    Ok(cipher::transform(data_key, nonce, ciphertext))
}

/// Seal `payload` for the holder of `recipient`'s private key using `OsRng`
pub fn seal(payload: &[u8], recipient: &PublicKey) -> Result<SealedBundle, SealError> {
    seal_with_rng(payload, recipient, &mut OsRng)
}

/// Seal `payload` for `recipient`, drawing every random value from `rng`
///
/// # Errors
///
/// Returns [`SealError::KeyGeneration`] if the rng yields identical data
/// and auth keys, or [`SealError::KeyTooLarge`] if the recipient modulus
/// cannot carry a 256-bit key.
pub fn seal_with_rng<R: RngCore + CryptoRng>(
    payload: &[u8],
    recipient: &PublicKey,
    rng: &mut R,
) -> Result<SealedBundle, SealError> {
    let keys = SessionKeys::generate(rng)?;
    let (ciphertext, tag) = keys.encrypt(payload);

    let key_wrap = KeyWrap::Rsa {
        data_key: wrap::wrap(keys.data_key.as_bytes(), recipient, rng)?,
        auth_key: wrap::wrap(keys.auth_key.as_bytes(), recipient, rng)?,
    };
    tracing::debug!(
        len = payload.len(),
        recipient = %recipient.fingerprint(),
        "sealed payload"
    );
    Ok(SealedBundle::new(key_wrap, keys.nonce, tag, ciphertext)?)
}

/// Open a bundle sealed for `private`'s public key using `OsRng` for
/// RSA blinding
pub fn open(bundle: &SealedBundle, private: &PrivateKey) -> Result<Vec<u8>, SealError> {
    open_with_rng(bundle, private, &mut OsRng)
}

/// Open a bundle, using `rng` for RSA blinding
///
/// # Errors
///
/// - [`SealError::Unwrap`] if the bundle is password-protected, was sealed
///   for another key, or its wrapped keys are corrupted
/// - [`SealError::TamperDetected`] if the tag does not match; nothing is
///   decrypted in this case
pub fn open_with_rng<R: RngCore + CryptoRng>(
    bundle: &SealedBundle,
    private: &PrivateKey,
    rng: &mut R,
) -> Result<Vec<u8>, SealError> {
    let KeyWrap::Rsa { data_key, auth_key } = bundle.key_wrap() else {
        return Err(SealError::Unwrap);
    };
    let data_key = wrap::unwrap(data_key, private, rng)?;
    let auth_key = wrap::unwrap(auth_key, private, rng)?;
    let (data_key, auth_key) = unwrapped_keys(&data_key, &auth_key)?;
    tracing::trace!("unwrapped bundle keys");

    let payload = verify_and_decrypt(bundle, &data_key, &auth_key)?;
    tracing::debug!(len = payload.len(), "opened bundle");
    Ok(payload)
}

/// Seal `payload` under a password instead of a recipient key
pub fn seal_with_password<R: RngCore + CryptoRng>(
    payload: &[u8],
    password: &[u8],
    params: PasswordParams,
    rng: &mut R,
) -> Result<SealedBundle, SealError> {
    let keys = SessionKeys::generate(rng)?;
    let (ciphertext, tag) = keys.encrypt(payload);

    let salt = Salt::generate(rng);
    let kek = PasswordKek::derive(password, &salt, params)?;
    let key_wrap = KeyWrap::Password {
        salt,
        params,
        data_key: kek.wrap(keys.data_key.as_bytes())?,
        auth_key: kek.wrap(keys.auth_key.as_bytes())?,
    };
    tracing::debug!(len = payload.len(), "sealed payload with password");
    Ok(SealedBundle::new(key_wrap, keys.nonce, tag, ciphertext)?)
}

/// Open a password-protected bundle
///
/// The Argon2 parameters stored in the bundle are used as-is.
///
/// # Errors
///
/// As [`open_with_rng`]; an RSA bundle or a wrong password is
/// [`SealError::Unwrap`], and cost parameters outside the accepted bounds
/// are [`SealError::BundleFormat`].
pub fn open_with_password(bundle: &SealedBundle, password: &[u8]) -> Result<Vec<u8>, SealError> {
    let KeyWrap::Password {
        salt,
        params,
        data_key,
        auth_key,
    } = bundle.key_wrap()
    else {
        return Err(SealError::Unwrap);
    };
    let kek = PasswordKek::derive(password, salt, *params).map_err(open_kdf_error)?;
    let data_key = kek.unwrap(data_key)?;
    let auth_key = kek.unwrap(auth_key)?;
    let (data_key, auth_key) = unwrapped_keys(&data_key, &auth_key)?;

    let payload = verify_and_decrypt(bundle, &data_key, &auth_key)?;
    tracing::debug!(len = payload.len(), "opened password bundle");
    Ok(payload)
}
