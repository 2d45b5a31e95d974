//! What a seal or open runs against: a key pair or a password

use std::io::{self, BufRead};
use std::path::PathBuf;

use common::bundle::SealedBundle;
use common::crypto::{PasswordParams, PrivateKey, PublicKey};
use common::seal::{self, SealError};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::state::{AppState, StateError};

pub enum SealFor {
    Recipient(PublicKey),
    Password {
        password: Zeroizing<Vec<u8>>,
        params: PasswordParams,
    },
}

impl SealFor {
    pub fn seal(&self, payload: &[u8]) -> Result<SealedBundle, SealError> {
        match self {
            SealFor::Recipient(public) => seal::seal(payload, public),
            SealFor::Password { password, params } => {
                seal::seal_with_password(payload, password, *params, &mut OsRng)
            }
        }
    }
}

pub enum OpenWith {
    PrivateKey(PrivateKey),
    Password(Zeroizing<Vec<u8>>),
}

impl OpenWith {
    pub fn open(&self, bundle: &SealedBundle) -> Result<Vec<u8>, SealError> {
        match self {
            OpenWith::PrivateKey(private) => seal::open(bundle, private),
            OpenWith::Password(password) => seal::open_with_password(bundle, password),
        }
    }
}

/// Read a password from the first line of `reader`
///
/// The line ending is stripped; an empty password is rejected.
pub fn read_password<R: BufRead>(mut reader: R) -> io::Result<Zeroizing<Vec<u8>>> {
    let mut line = Zeroizing::new(String::new());
    reader.read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no password on stdin",
        ));
    }
    Ok(Zeroizing::new(password.as_bytes().to_vec()))
}

/// Argon2 cost from the state directory, or the defaults if there is none
pub fn password_params(config_path: Option<PathBuf>) -> Result<PasswordParams, StateError> {
    match AppState::load(config_path) {
        Ok(state) => Ok(state.config.argon2.into()),
        Err(StateError::NotInitialized) => Ok(PasswordParams::default()),
        Err(e) => Err(e),
    }
}
