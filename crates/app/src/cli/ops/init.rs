use clap::Args;

use crate::cli::op::ExitStatus;
use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// RSA modulus size for the generated key pair (default: 2048)
    #[arg(long)]
    pub bits: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),

    #[error("init task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExitStatus for InitError {}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(bits) = self.bits {
            config.key_bits = bits;
        }

        let config_path = ctx.config_path.clone();
        let state =
            tokio::task::spawn_blocking(move || AppState::init(config_path, Some(config)))
                .await??;
        let fingerprint = state
            .load_public_key()
            .map(|key| key.fingerprint())
            .unwrap_or_default();

        let output = format!(
            "Initialized pixseal directory at: {}\n\
             - Public key: {}\n\
             - Private key: {}\n\
             - Config: {}\n\
             - Key size: {} bits\n\
             - Fingerprint: {}",
            state.pixseal_dir.display(),
            state.public_key_path.display(),
            state.private_key_path.display(),
            state.config_path.display(),
            state.config.key_bits,
            fingerprint
        );

        Ok(output)
    }
}
