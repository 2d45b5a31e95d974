//! Password-derived key wrapping
//!
//! The password variant of a sealed bundle never uses the password as a key
//! directly. Argon2id stretches it with a random per-bundle salt into a
//! 256-bit key-encryption key, which then wraps the data and auth keys with
//! AES-256 key wrap (RFC 3394). The salt and cost parameters travel with the
//! bundle so the receiver can re-derive the same KEK.

use aes_kw::KekAes256 as Kek;
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::secret::SECRET_SIZE;
use super::wrap::{WrapError, WrappedKey};

/// Size of the Argon2 salt in bytes
pub const SALT_SIZE: usize = 16;
/// Size of an AES-KW wrapped 256-bit key
///
/// AES-KW adds one 8-byte integrity block to the 32-byte key
pub const PASSWORD_WRAPPED_SIZE: usize = SECRET_SIZE + 8;
/// Largest Argon2 memory cost accepted, in KiB (1 GiB)
///
/// Parameters are read from untrusted bundles, so they are bounded before
/// any memory is allocated.
pub const MAX_MEMORY_KIB: u32 = 1 << 20;
/// Largest Argon2 pass count accepted
pub const MAX_ITERATIONS: u32 = 16;
/// Largest Argon2 lane count accepted
pub const MAX_PARALLELISM: u32 = 16;
/// Largest memory cost times pass count accepted, in KiB
pub const MAX_WORK_KIB: u64 = 4 << 20;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("password key derivation failed: {0}")]
    Derive(String),
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordParams {
    fn to_argon2(self) -> Result<Params, PasswordError> {
        if self.memory_kib > MAX_MEMORY_KIB {
            return Err(PasswordError::Params(format!(
                "memory cost of {} KiB exceeds the {} KiB limit",
                self.memory_kib, MAX_MEMORY_KIB
            )));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(PasswordError::Params(format!(
                "{} passes exceeds the limit of {}",
                self.iterations, MAX_ITERATIONS
            )));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(PasswordError::Params(format!(
                "{} lanes exceeds the limit of {}",
                self.parallelism, MAX_PARALLELISM
            )));
        }
        let work = u64::from(self.memory_kib) * u64::from(self.iterations);
        if work > MAX_WORK_KIB {
            return Err(PasswordError::Params(format!(
                "memory cost times passes of {} KiB exceeds the {} KiB limit",
                work, MAX_WORK_KIB
            )));
        }
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(SECRET_SIZE),
        )
        .map_err(|e| PasswordError::Params(e.to_string()))
    }
}

/// Random salt stored alongside a password-wrapped bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut buff = [0; SALT_SIZE];
        rng.fill_bytes(&mut buff);
        Self(buff)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl From<[u8; SALT_SIZE]> for Salt {
    fn from(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Key-encryption key derived from a password
pub struct PasswordKek(Zeroizing<[u8; SECRET_SIZE]>);

impl PasswordKek {
    /// Run Argon2id over `password` and `salt`
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError::Params`] for out-of-range cost parameters and
    /// [`PasswordError::Derive`] if hashing fails.
    pub fn derive(
        password: &[u8],
        salt: &Salt,
        params: PasswordParams,
    ) -> Result<Self, PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
        let mut out = Zeroizing::new([0u8; SECRET_SIZE]);
        argon2
            .hash_password_into(password, salt.as_bytes(), &mut out[..])
            .map_err(|e| PasswordError::Derive(e.to_string()))?;
        tracing::trace!(
            memory_kib = params.memory_kib,
            iterations = params.iterations,
            "derived password kek"
        );
        Ok(Self(out))
    }

    fn kek(&self) -> Kek {
        Kek::from(*self.0)
    }

    /// Wrap a symmetric key with AES-KW
    pub fn wrap(&self, key: &[u8]) -> Result<WrappedKey, WrapError> {
        self.kek()
            .wrap_vec(key)
            .map(WrappedKey::from)
            .map_err(|_| WrapError::Encrypt("AES-KW wrap error".to_string()))
    }

    /// Unwrap a key wrapped by [`PasswordKek::wrap`]
    ///
    /// A wrong password and corrupted bytes both fail the AES-KW integrity
    /// check and surface as [`WrapError::Unwrap`].
    pub fn unwrap(&self, wrapped: &WrappedKey) -> Result<Zeroizing<Vec<u8>>, WrapError> {
        self.kek()
            .unwrap_vec(wrapped.bytes())
            .map(Zeroizing::new)
            .map_err(|_| WrapError::Unwrap)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    // Small costs keep the tests fast; production uses the defaults.
    fn cheap() -> PasswordParams {
        PasswordParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_password_wrap_round_trip() {
        let salt = Salt::generate(&mut ChaCha20Rng::seed_from_u64(1));
        let kek = PasswordKek::derive(b"correct horse", &salt, cheap()).unwrap();

        let key = [9u8; SECRET_SIZE];
        let wrapped = kek.wrap(&key).unwrap();
        assert_eq!(wrapped.len(), PASSWORD_WRAPPED_SIZE);

        let again = PasswordKek::derive(b"correct horse", &salt, cheap()).unwrap();
        assert_eq!(again.unwrap(&wrapped).unwrap().as_slice(), &key);
    }

    #[test]
    fn test_wrong_password_fails() {
        let salt = Salt::generate(&mut ChaCha20Rng::seed_from_u64(2));
        let kek = PasswordKek::derive(b"correct horse", &salt, cheap()).unwrap();
        let wrapped = kek.wrap(&[1u8; SECRET_SIZE]).unwrap();

        let wrong = PasswordKek::derive(b"battery staple", &salt, cheap()).unwrap();
        assert!(matches!(wrong.unwrap(&wrapped), Err(WrapError::Unwrap)));
    }

    #[test]
    fn test_salt_changes_kek() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let a = PasswordKek::derive(b"pw", &Salt::generate(&mut rng), cheap()).unwrap();
        let b = PasswordKek::derive(b"pw", &Salt::generate(&mut rng), cheap()).unwrap();
        let wrapped = a.wrap(&[5u8; SECRET_SIZE]).unwrap();
        assert!(b.unwrap(&wrapped).is_err());
    }

    #[test]
    fn test_invalid_params() {
        let salt = Salt::from([0u8; SALT_SIZE]);
        let params = PasswordParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            PasswordKek::derive(b"pw", &salt, params),
            Err(PasswordError::Params(_))
        ));
    }

    #[test]
    fn test_memory_cost_is_bounded() {
        let salt = Salt::from([0u8; SALT_SIZE]);
        let params = PasswordParams {
            memory_kib: MAX_MEMORY_KIB + 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            PasswordKek::derive(b"pw", &salt, params),
            Err(PasswordError::Params(_))
        ));
    }

    #[test]
    fn test_iterations_are_bounded() {
        let salt = Salt::from([0u8; SALT_SIZE]);
        let params = PasswordParams {
            memory_kib: 64,
            iterations: MAX_ITERATIONS + 1,
            parallelism: 1,
        };
        assert!(matches!(
            PasswordKek::derive(b"pw", &salt, params),
            Err(PasswordError::Params(_))
        ));

        let params = PasswordParams {
            iterations: u32::MAX,
            ..params
        };
        assert!(matches!(
            PasswordKek::derive(b"pw", &salt, params),
            Err(PasswordError::Params(_))
        ));
    }

    #[test]
    fn test_parallelism_is_bounded() {
        let salt = Salt::from([0u8; SALT_SIZE]);
        let params = PasswordParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: MAX_PARALLELISM + 1,
        };
        assert!(matches!(
            PasswordKek::derive(b"pw", &salt, params),
            Err(PasswordError::Params(_))
        ));
    }

    #[test]
    fn test_total_work_is_bounded() {
        let salt = Salt::from([0u8; SALT_SIZE]);
        // Each limit holds on its own, their product does not
        let params = PasswordParams {
            memory_kib: MAX_MEMORY_KIB,
            iterations: MAX_ITERATIONS,
            parallelism: 1,
        };
        assert!(matches!(
            PasswordKek::derive(b"pw", &salt, params),
            Err(PasswordError::Params(_))
        ));
    }
}
