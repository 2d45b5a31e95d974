use std::io::{self, Write};
use std::{fs, path::Path, path::PathBuf};

use common::crypto::{KeyPair, PasswordParams, PrivateKey, PublicKey, DEFAULT_KEY_BITS};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "pixseal";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const PUBLIC_KEY_FILE_NAME: &str = "public.pem";
pub const PRIVATE_KEY_FILE_NAME: &str = "private.pem";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// RSA modulus size for generated key pairs
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
    /// Argon2id cost for password-sealed bundles
    #[serde(default)]
    pub argon2: Argon2Config,
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key_bits: default_key_bits(),
            argon2: Argon2Config::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        PasswordParams::default().into()
    }
}

impl From<PasswordParams> for Argon2Config {
    fn from(params: PasswordParams) -> Self {
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

impl From<Argon2Config> for PasswordParams {
    fn from(config: Argon2Config) -> Self {
        Self {
            memory_kib: config.memory_kib,
            iterations: config.iterations,
            parallelism: config.parallelism,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the pixseal directory (~/.pixseal)
    pub pixseal_dir: PathBuf,
    /// Path to the recipient public key
    pub public_key_path: PathBuf,
    /// Path to the private key
    pub private_key_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the pixseal directory path (custom or default ~/.pixseal)
    pub fn pixseal_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory with a fresh key pair
    ///
    /// Key generation is CPU bound; async callers should run this on a
    /// blocking thread.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let pixseal_dir = Self::pixseal_dir(custom_path)?;

        if pixseal_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        let config = config.unwrap_or_default();
        let pair = common::crypto::generate_key_pair(config.key_bits)
            .map_err(|e| StateError::InvalidKey(e.to_string()))?;

        fs::create_dir_all(&pixseal_dir)?;

        let (public_key_path, private_key_path) = write_key_pair(&pixseal_dir, &pair, false)?;

        let config_path = pixseal_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        tracing::info!(
            dir = %pixseal_dir.display(),
            fingerprint = %pair.public.fingerprint(),
            "initialized state directory"
        );

        Ok(Self {
            pixseal_dir,
            public_key_path,
            private_key_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the pixseal directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let pixseal_dir = Self::pixseal_dir(custom_path)?;

        if !pixseal_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let public_key_path = pixseal_dir.join(PUBLIC_KEY_FILE_NAME);
        let private_key_path = pixseal_dir.join(PRIVATE_KEY_FILE_NAME);
        let config_path = pixseal_dir.join(CONFIG_FILE_NAME);

        for path in [&public_key_path, &private_key_path, &config_path] {
            if !path.exists() {
                return Err(StateError::MissingFile(path.display().to_string()));
            }
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            pixseal_dir,
            public_key_path,
            private_key_path,
            config_path,
            config,
        })
    }

    pub fn load_public_key(&self) -> Result<PublicKey, StateError> {
        read_public_key(&self.public_key_path)
    }

    pub fn load_private_key(&self) -> Result<PrivateKey, StateError> {
        read_private_key(&self.private_key_path)
    }
}

/// Write `public.pem` and `private.pem` into `dir`, returning their paths
///
/// Existing files are an error unless `overwrite` is set. On unix the
/// private key file is created owner-readable only, it is never visible
/// with wider permissions.
pub fn write_key_pair(
    dir: &Path,
    pair: &KeyPair,
    overwrite: bool,
) -> Result<(PathBuf, PathBuf), StateError> {
    let public_pem = pair
        .public
        .to_pem()
        .map_err(|e| StateError::InvalidKey(e.to_string()))?;
    let private_pem = pair
        .private
        .to_pem()
        .map_err(|e| StateError::InvalidKey(e.to_string()))?;

    let public_key_path = dir.join(PUBLIC_KEY_FILE_NAME);
    create_key_file(&public_key_path, public_pem.as_bytes(), 0o644, overwrite)?;

    let private_key_path = dir.join(PRIVATE_KEY_FILE_NAME);
    create_key_file(&private_key_path, private_pem.as_bytes(), 0o600, overwrite)?;

    Ok((public_key_path, private_key_path))
}

/// Create `path` with `mode` already applied and write `contents`
fn create_key_file(path: &Path, contents: &[u8], mode: u32, overwrite: bool) -> io::Result<()> {
    if overwrite {
        // A replaced file would keep its old permissions
        match fs::remove_file(path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
            _ => {}
        }
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

pub fn read_public_key(path: &Path) -> Result<PublicKey, StateError> {
    let pem = fs::read_to_string(path)?;
    PublicKey::from_pem(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))
}

pub fn read_private_key(path: &Path) -> Result<PrivateKey, StateError> {
    let pem = zeroize::Zeroizing::new(fs::read_to_string(path)?);
    PrivateKey::from_pem(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("pixseal directory not initialized. Run 'pixseal init' first")]
    NotInitialized,

    #[error("pixseal directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
