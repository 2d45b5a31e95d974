use std::fs;
use std::path::PathBuf;

use clap::Args;
use common::bundle::SealedBundle;
use common::seal::SealError;

use super::credential::{self, OpenWith};
use crate::carrier::{self, Carrier, CarrierError};
use crate::cli::op::ExitStatus;
use crate::state::{self, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Open {
    /// Sealed container to open
    pub bundle: PathBuf,

    /// Private key PEM (defaults to private.pem in the state directory)
    #[arg(long, conflicts_with = "password_stdin")]
    pub key: Option<PathBuf>,

    /// Open with a password read from stdin instead of a private key
    #[arg(long)]
    pub password_stdin: bool,

    /// Where to write the recovered image or file
    #[arg(long, short)]
    pub output: PathBuf,

    /// Image supplying dimensions and alpha: the original or the ciphertext image
    #[arg(long, required_unless_present = "raw", conflicts_with = "raw")]
    pub carrier: Option<PathBuf>,

    /// Write the recovered bytes as-is instead of rebuilding an image
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenOpError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Carrier(#[from] CarrierError),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error("open task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExitStatus for OpenOpError {
    fn exit_code(&self) -> i32 {
        match self {
            OpenOpError::Seal(err) => err.exit_code(),
            _ => crate::cli::op::EXIT_FAILURE,
        }
    }
}

impl Open {
    fn credential(&self, config_path: Option<PathBuf>) -> Result<OpenWith, OpenOpError> {
        if self.password_stdin {
            return Ok(OpenWith::Password(credential::read_password(
                std::io::stdin().lock(),
            )?));
        }
        let private = match &self.key {
            Some(path) => state::read_private_key(path)?,
            None => AppState::load(config_path)?.load_private_key()?,
        };
        Ok(OpenWith::PrivateKey(private))
    }

    pub(crate) async fn open_with(&self, credential: OpenWith) -> Result<String, OpenOpError> {
        let bytes = fs::read(&self.bundle)?;
        let bundle = SealedBundle::from_bytes(&bytes).map_err(SealError::from)?;

        let carrier = match &self.carrier {
            Some(path) if !self.raw => Some(Carrier::open(path)?.0),
            _ => None,
        };
        if let Some(carrier) = &carrier {
            // Fail before the expensive unwrap if the image cannot hold the payload
            if carrier.rgb_len() != bundle.ciphertext().len() {
                return Err(CarrierError::SizeMismatch {
                    width: carrier.width(),
                    height: carrier.height(),
                    expected: carrier.rgb_len(),
                    actual: bundle.ciphertext().len(),
                }
                .into());
            }
        }

        let payload = tokio::task::spawn_blocking(move || credential.open(&bundle)).await??;

        match carrier {
            Some(carrier) => carrier::save_png(&carrier.rebuild(&payload)?, &self.output)?,
            None => fs::write(&self.output, &payload)?,
        }

        Ok(format!(
            "Opened {} bytes into {}",
            payload.len(),
            self.output.display()
        ))
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Open {
    type Error = OpenOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let credential = self.credential(ctx.config_path.clone())?;
        self.open_with(credential).await
    }
}
