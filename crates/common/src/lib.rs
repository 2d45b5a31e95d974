/**
 * Cryptographic types and operations.
 *  - RSA key pairs and PEM framing
 *  - Symmetric keys, nonces and tags
 *  - Key wrapping, stream cipher and MAC primitives
 */
pub mod crypto;
/**
 * The sealed bundle and its binary
 *  container format.
 */
pub mod bundle;
/**
 * Sealing and opening payloads: the
 *  generate / encrypt / tag / wrap pipeline
 *  and its verify-before-decrypt inverse.
 */
pub mod seal;

pub mod prelude {
    pub use crate::bundle::{BundleError, KeyWrap, SealedBundle};
    pub use crate::crypto::{generate_key_pair, KeyPair, PasswordParams, PrivateKey, PublicKey};
    pub use crate::seal::{open, open_with_password, seal, seal_with_password, SealError};
}
