use std::fmt;

use rand::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Smallest RSA modulus accepted for generation or import, in bits
pub const MIN_KEY_BITS: usize = 2048;
/// Largest RSA modulus the backend will import, in bits
pub const MAX_KEY_BITS: usize = 4096;
/// Modulus size used when the caller has no preference
pub const DEFAULT_KEY_BITS: usize = 2048;

const PUBLIC_KEY_PEM_TAG: &str = "PUBLIC KEY";
const PRIVATE_KEY_PEM_TAG: &str = "PRIVATE KEY";

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Generation(String),
    #[error("malformed key: {0}")]
    Format(String),
}

fn check_bits(bits: usize) -> Result<(), KeyError> {
    if bits < MIN_KEY_BITS {
        return Err(KeyError::Generation(format!(
            "{} bit modulus is below the {} bit minimum",
            bits, MIN_KEY_BITS
        )));
    }
    if bits > MAX_KEY_BITS {
        return Err(KeyError::Generation(format!(
            "{} bit modulus exceeds the {} bit maximum",
            bits, MAX_KEY_BITS
        )));
    }
    Ok(())
}

fn decode_pem(pem_str: &str, tag: &str) -> Result<Vec<u8>, KeyError> {
    let pem = pem::parse(pem_str).map_err(|e| KeyError::Format(format!("invalid PEM: {}", e)))?;
    if pem.tag() != tag {
        return Err(KeyError::Format(format!(
            "invalid PEM tag, expected {}, got {}",
            tag,
            pem.tag()
        )));
    }
    Ok(pem.into_contents())
}

/// RSA public key of a recipient
///
/// Serialized as X.509 SubjectPublicKeyInfo DER, optionally PEM-framed with
/// the `PUBLIC KEY` tag.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Parse a SubjectPublicKeyInfo DER document
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Format`] if the bytes are not an RSA public key or
    /// the modulus is below [`MIN_KEY_BITS`].
    pub fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| KeyError::Format(format!("public key: {}", e)))?;
        let key = Self(key);
        if key.bits() < MIN_KEY_BITS {
            return Err(KeyError::Format(format!(
                "public key modulus of {} bits is below the {} bit minimum",
                key.bits(),
                MIN_KEY_BITS
            )));
        }
        Ok(key)
    }

    pub fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let doc = self
            .0
            .to_public_key_der()
            .map_err(|e| KeyError::Format(format!("public key encoding: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        Self::from_der(&decode_pem(pem_str, PUBLIC_KEY_PEM_TAG)?)
    }

    pub fn to_pem(&self) -> Result<String, KeyError> {
        let pem = pem::Pem::new(PUBLIC_KEY_PEM_TAG, self.to_der()?);
        Ok(pem::encode(&pem))
    }

    /// Modulus length in bytes; also the length of every wrapped key
    pub fn size(&self) -> usize {
        self.0.size()
    }

    /// Exact modulus length in bits, not rounded up to a whole byte
    pub fn bits(&self) -> usize {
        self.0.n().bits()
    }

    /// Hex SHA-256 of the DER encoding, for naming a key without showing it
    pub fn fingerprint(&self) -> String {
        match self.to_der() {
            Ok(der) => hex::encode(Sha256::digest(der)),
            Err(_) => String::from("<unencodable>"),
        }
    }

    pub(crate) fn as_rsa(&self) -> &RsaPublicKey {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// RSA private key of the receiving party
///
/// This key should never leave the owner's storage. It is serialized as
/// PKCS#8 DER; the encoded bytes are zeroized when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Parse and validate a PKCS#8 DER document
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Format`] if:
    /// - The bytes are not a PKCS#8 RSA private key
    /// - The key fails consistency validation
    /// - The modulus is below [`MIN_KEY_BITS`]
    pub fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        let key = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| KeyError::Format(format!("private key: {}", e)))?;
        key.validate()
            .map_err(|e| KeyError::Format(format!("private key validation: {}", e)))?;
        let key = Self(key);
        if key.public().bits() < MIN_KEY_BITS {
            return Err(KeyError::Format(format!(
                "private key modulus of {} bits is below the {} bit minimum",
                key.public().bits(),
                MIN_KEY_BITS
            )));
        }
        Ok(key)
    }

    pub fn to_der(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| KeyError::Format(format!("private key encoding: {}", e)))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let der = Zeroizing::new(decode_pem(pem_str, PRIVATE_KEY_PEM_TAG)?);
        Self::from_der(&der)
    }

    pub fn to_pem(&self) -> Result<Zeroizing<String>, KeyError> {
        let der = self.to_der()?;
        let pem = pem::Pem::new(PRIVATE_KEY_PEM_TAG, der.to_vec());
        Ok(Zeroizing::new(pem::encode(&pem)))
    }

    /// Derive the matching public key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    pub(crate) fn as_rsa(&self) -> &RsaPrivateKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public().fingerprint())
            .finish_non_exhaustive()
    }
}

/// A recipient's RSA key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a key pair with a `bits` sized modulus
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if `bits` is outside
    /// [`MIN_KEY_BITS`]..=[`MAX_KEY_BITS`] or prime generation fails.
    pub fn generate<R: RngCore + CryptoRng>(bits: usize, rng: &mut R) -> Result<Self, KeyError> {
        check_bits(bits)?;
        let private = RsaPrivateKey::new(rng, bits)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        let private = PrivateKey(private);
        let public = private.public();
        tracing::debug!(bits, fingerprint = %public.fingerprint(), "generated key pair");
        Ok(Self { public, private })
    }
}

impl From<PrivateKey> for KeyPair {
    fn from(private: PrivateKey) -> Self {
        Self {
            public: private.public(),
            private,
        }
    }
}
