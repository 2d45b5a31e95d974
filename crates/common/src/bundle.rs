//! Sealed bundle and its container format
//!
//! A [`SealedBundle`] holds everything a receiver needs to attempt `open`:
//! the two wrapped symmetric keys, the nonce, the tag and the ciphertext.
//! It is serialized as one length-prefixed, big-endian container so the
//! fields cannot drift apart in transit.
//!
//! # Wire Format
//!
//! ```text
//! [ magic: "PXSL" ][ version: u8 ][ mode: u8 ][ nonce: 16 ][ tag: 32 ]
//! mode 0x01 (rsa-oaep-sha256):
//!   [ len: u16 ][ wrapped data key ][ len: u16 ][ wrapped auth key ]
//! mode 0x02 (argon2id-aes-kw):
//!   [ salt: 16 ][ m_cost: u32 ][ t_cost: u32 ][ p_cost: u32 ]
//!   [ len: u16 ][ wrapped data key ][ len: u16 ][ wrapped auth key ]
//! [ ciphertext len: u64 ][ ciphertext ]
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::crypto::password::SALT_SIZE;
use crate::crypto::{Nonce, PasswordParams, Salt, Tag, WrappedKey, NONCE_SIZE, TAG_SIZE};

pub const MAGIC: &[u8; 4] = b"PXSL";
pub const FORMAT_VERSION: u8 = 1;

const MODE_RSA: u8 = 0x01;
const MODE_PASSWORD: u8 = 0x02;

/// Fixed prefix: magic, version, mode, nonce, tag
const HEADER_SIZE: usize = MAGIC.len() + 2 + NONCE_SIZE + TAG_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("not a sealed bundle (bad magic)")]
    BadMagic,
    #[error("unsupported bundle version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown key wrap mode {0:#04x}")]
    UnknownMode(u8),
    #[error("bundle truncated while reading {0}")]
    Truncated(&'static str),
    #[error("bundle field {0} is empty")]
    EmptyField(&'static str),
    #[error("bundle field {field} is {len} bytes, larger than the format allows")]
    Oversized { field: &'static str, len: usize },
    #[error("invalid {field}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{0} unexpected bytes after the ciphertext")]
    TrailingBytes(usize),
    #[error("bundle carries unusable argon2 parameters: {0}")]
    KdfParams(String),
}

/// How the symmetric keys of a bundle are protected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyWrap {
    /// Both keys encrypted under the recipient's RSA public key
    Rsa {
        data_key: WrappedKey,
        auth_key: WrappedKey,
    },
    /// Both keys wrapped with a KEK derived from a password
    Password {
        salt: Salt,
        params: PasswordParams,
        data_key: WrappedKey,
        auth_key: WrappedKey,
    },
}

impl KeyWrap {
    pub fn mode_name(&self) -> &'static str {
        match self {
            KeyWrap::Rsa { .. } => "rsa-oaep-sha256",
            KeyWrap::Password { .. } => "argon2id-aes-kw",
        }
    }

    pub fn wrapped_keys(&self) -> (&WrappedKey, &WrappedKey) {
        match self {
            KeyWrap::Rsa { data_key, auth_key } => (data_key, auth_key),
            KeyWrap::Password {
                data_key, auth_key, ..
            } => (data_key, auth_key),
        }
    }

    fn mode(&self) -> u8 {
        match self {
            KeyWrap::Rsa { .. } => MODE_RSA,
            KeyWrap::Password { .. } => MODE_PASSWORD,
        }
    }
}

/// The five fields of a sealed payload, treated as one immutable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBundle {
    key_wrap: KeyWrap,
    nonce: Nonce,
    tag: Tag,
    ciphertext: Vec<u8>,
}

impl SealedBundle {
    /// Assemble a bundle from its fields
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::EmptyField`] for an empty wrapped key and
    /// [`BundleError::Oversized`] for a wrapped key that does not fit a u16
    /// length prefix.
    pub fn new(
        key_wrap: KeyWrap,
        nonce: Nonce,
        tag: Tag,
        ciphertext: Vec<u8>,
    ) -> Result<Self, BundleError> {
        let (data_key, auth_key) = key_wrap.wrapped_keys();
        check_wrapped("wrapped data key", data_key)?;
        check_wrapped("wrapped auth key", auth_key)?;
        Ok(Self {
            key_wrap,
            nonce,
            tag,
            ciphertext,
        })
    }

    /// Assemble an RSA bundle from loose artifacts: ciphertext, the two
    /// wrapped keys, and raw nonce and tag bytes
    pub fn from_artifacts(
        ciphertext: Vec<u8>,
        wrapped_data_key: &[u8],
        wrapped_auth_key: &[u8],
        nonce: &[u8],
        tag: &[u8],
    ) -> Result<Self, BundleError> {
        let nonce = Nonce::from_slice(nonce).map_err(|_| BundleError::InvalidLength {
            field: "nonce",
            expected: NONCE_SIZE,
            actual: nonce.len(),
        })?;
        let tag = Tag::from_slice(tag).map_err(|_| BundleError::InvalidLength {
            field: "tag",
            expected: TAG_SIZE,
            actual: tag.len(),
        })?;
        let key_wrap = KeyWrap::Rsa {
            data_key: wrapped_data_key.into(),
            auth_key: wrapped_auth_key.into(),
        };
        Self::new(key_wrap, nonce, tag, ciphertext)
    }

    pub fn key_wrap(&self) -> &KeyWrap {
        &self.key_wrap
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Exact size of [`SealedBundle::to_bytes`] output
    pub fn encoded_len(&self) -> usize {
        let (data_key, auth_key) = self.key_wrap.wrapped_keys();
        let params = match self.key_wrap {
            KeyWrap::Rsa { .. } => 0,
            KeyWrap::Password { .. } => SALT_SIZE + 12,
        };
        HEADER_SIZE + params + 2 + data_key.len() + 2 + auth_key.len() + 8 + self.ciphertext.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(MAGIC);
        buf.put_u8(FORMAT_VERSION);
        buf.put_u8(self.key_wrap.mode());
        buf.put_slice(self.nonce.as_bytes());
        buf.put_slice(self.tag.as_bytes());

        if let KeyWrap::Password { salt, params, .. } = &self.key_wrap {
            buf.put_slice(salt.as_bytes());
            buf.put_u32(params.memory_kib);
            buf.put_u32(params.iterations);
            buf.put_u32(params.parallelism);
        }
        let (data_key, auth_key) = self.key_wrap.wrapped_keys();
        for key in [data_key, auth_key] {
            // lengths were bounded by `new`
            buf.put_u16(key.len() as u16);
            buf.put_slice(key);
        }

        buf.put_u64(self.ciphertext.len() as u64);
        buf.put_slice(&self.ciphertext);
        buf.to_vec()
    }

    /// Decode a container produced by [`SealedBundle::to_bytes`]
    ///
    /// # Errors
    ///
    /// Returns a [`BundleError`] on bad magic, an unknown version or mode,
    /// any missing or truncated field, or trailing bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, BundleError> {
        let mut buf = data;

        if take(&mut buf, MAGIC.len(), "magic")? != MAGIC {
            return Err(BundleError::BadMagic);
        }
        let version = take(&mut buf, 1, "version")?[0];
        if version != FORMAT_VERSION {
            return Err(BundleError::UnsupportedVersion(version));
        }
        let mode = take(&mut buf, 1, "mode")?[0];
        if mode != MODE_RSA && mode != MODE_PASSWORD {
            return Err(BundleError::UnknownMode(mode));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(take(&mut buf, NONCE_SIZE, "nonce")?);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(take(&mut buf, TAG_SIZE, "tag")?);

        let key_wrap = if mode == MODE_PASSWORD {
            let mut salt = [0u8; SALT_SIZE];
            salt.copy_from_slice(take(&mut buf, SALT_SIZE, "salt")?);
            let params = PasswordParams {
                memory_kib: take_u32(&mut buf, "argon2 memory cost")?,
                iterations: take_u32(&mut buf, "argon2 time cost")?,
                parallelism: take_u32(&mut buf, "argon2 parallelism")?,
            };
            KeyWrap::Password {
                salt: Salt::from(salt),
                params,
                data_key: take_wrapped(&mut buf, "wrapped data key")?,
                auth_key: take_wrapped(&mut buf, "wrapped auth key")?,
            }
        } else {
            KeyWrap::Rsa {
                data_key: take_wrapped(&mut buf, "wrapped data key")?,
                auth_key: take_wrapped(&mut buf, "wrapped auth key")?,
            }
        };

        if buf.remaining() < 8 {
            return Err(BundleError::Truncated("ciphertext length"));
        }
        let len = buf.get_u64();
        let len = usize::try_from(len).map_err(|_| BundleError::Truncated("ciphertext"))?;
        let ciphertext = take(&mut buf, len, "ciphertext")?.to_vec();

        if buf.has_remaining() {
            return Err(BundleError::TrailingBytes(buf.remaining()));
        }

        Self::new(key_wrap, Nonce::from(nonce), Tag::from(tag), ciphertext)
    }
}

fn check_wrapped(field: &'static str, key: &WrappedKey) -> Result<(), BundleError> {
    if key.is_empty() {
        return Err(BundleError::EmptyField(field));
    }
    if key.len() > u16::MAX as usize {
        return Err(BundleError::Oversized {
            field,
            len: key.len(),
        });
    }
    Ok(())
}

fn take<'a>(buf: &mut &'a [u8], n: usize, field: &'static str) -> Result<&'a [u8], BundleError> {
    if buf.remaining() < n {
        return Err(BundleError::Truncated(field));
    }
    let (head, rest) = buf.split_at(n);
    *buf = rest;
    Ok(head)
}

fn take_u32(buf: &mut &[u8], field: &'static str) -> Result<u32, BundleError> {
    if buf.remaining() < 4 {
        return Err(BundleError::Truncated(field));
    }
    Ok(buf.get_u32())
}

fn take_wrapped(buf: &mut &[u8], field: &'static str) -> Result<WrappedKey, BundleError> {
    if buf.remaining() < 2 {
        return Err(BundleError::Truncated(field));
    }
    let len = buf.get_u16() as usize;
    if len == 0 {
        return Err(BundleError::EmptyField(field));
    }
    Ok(take(buf, len, field)?.into())
}
