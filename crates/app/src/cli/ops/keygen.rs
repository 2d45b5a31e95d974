use std::path::PathBuf;

use clap::Args;
use common::crypto::DEFAULT_KEY_BITS;

use crate::cli::op::ExitStatus;
use crate::state::{self, AppState, StateError, PRIVATE_KEY_FILE_NAME, PUBLIC_KEY_FILE_NAME};

#[derive(Args, Debug, Clone)]
pub struct Keygen {
    /// RSA modulus size, 2048 to 4096 (defaults to key_bits from config.toml, else 2048)
    #[arg(long)]
    pub bits: Option<usize>,

    /// Directory to write public.pem and private.pem into
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Overwrite existing key files
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("key generation failed: {0}")]
    Generation(#[from] common::crypto::KeyError),

    #[error("refusing to overwrite {0} (use --force)")]
    Exists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keygen task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExitStatus for KeygenError {}

impl Keygen {
    fn bits(&self, config_path: Option<PathBuf>) -> usize {
        self.bits.unwrap_or_else(|| {
            AppState::load(config_path)
                .map(|state| state.config.key_bits)
                .unwrap_or(DEFAULT_KEY_BITS)
        })
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Keygen {
    type Error = KeygenError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        if !self.force {
            for name in [PUBLIC_KEY_FILE_NAME, PRIVATE_KEY_FILE_NAME] {
                let path = self.out_dir.join(name);
                if path.exists() {
                    return Err(KeygenError::Exists(path));
                }
            }
        }

        let bits = self.bits(ctx.config_path.clone());
        let pair =
            tokio::task::spawn_blocking(move || common::crypto::generate_key_pair(bits)).await??;

        std::fs::create_dir_all(&self.out_dir)?;
        let (public_path, private_path) =
            state::write_key_pair(&self.out_dir, &pair, self.force)?;

        Ok(format!(
            "Generated {}-bit key pair\n\
             - Public key: {}\n\
             - Private key: {}\n\
             - Fingerprint: {}",
            pair.public.bits(),
            public_path.display(),
            private_path.display(),
            pair.public.fingerprint()
        ))
    }
}
