use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use common::seal::SealError;

use super::credential::{self, SealFor};
use crate::carrier::{self, Carrier, CarrierError};
use crate::cli::op::ExitStatus;
use crate::state::{self, AppState, StateError};

pub const BUNDLE_EXTENSION: &str = "pxsl";

#[derive(Args, Debug, Clone)]
pub struct Seal {
    /// Image to seal (with --raw, any file)
    pub input: PathBuf,

    /// Recipient public key PEM (defaults to public.pem in the state directory)
    #[arg(long, conflicts_with = "password_stdin")]
    pub recipient: Option<PathBuf>,

    /// Seal under a password read from stdin instead of a public key
    #[arg(long)]
    pub password_stdin: bool,

    /// Where to write the sealed container (defaults to <input>.pxsl)
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Where to write the ciphertext image (defaults to <input stem>.sealed.png)
    #[arg(long, conflicts_with = "raw")]
    pub output: Option<PathBuf>,

    /// Seal the file's bytes instead of an image's RGB channels
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SealOpError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Carrier(#[from] CarrierError),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error("seal task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExitStatus for SealOpError {
    fn exit_code(&self) -> i32 {
        match self {
            SealOpError::Seal(err) => err.exit_code(),
            _ => crate::cli::op::EXIT_FAILURE,
        }
    }
}

/// `<path>.<ext>`, keeping any extension `path` already has
pub fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

impl Seal {
    fn credential(&self, config_path: Option<PathBuf>) -> Result<SealFor, SealOpError> {
        if self.password_stdin {
            let params = credential::password_params(config_path)?;
            let password = credential::read_password(std::io::stdin().lock())?;
            return Ok(SealFor::Password { password, params });
        }
        let public = match &self.recipient {
            Some(path) => state::read_public_key(path)?,
            None => AppState::load(config_path)?.load_public_key()?,
        };
        tracing::debug!(recipient = %public.fingerprint(), "sealing for recipient");
        Ok(SealFor::Recipient(public))
    }

    fn bundle_path(&self) -> PathBuf {
        self.bundle
            .clone()
            .unwrap_or_else(|| with_appended_extension(&self.input, BUNDLE_EXTENSION))
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("sealed.png"))
    }

    pub(crate) async fn seal_with(&self, credential: SealFor) -> Result<String, SealOpError> {
        let (carrier, payload) = if self.raw {
            (None, fs::read(&self.input)?)
        } else {
            let (carrier, rgb) = Carrier::open(&self.input)?;
            tracing::debug!(
                width = carrier.width(),
                height = carrier.height(),
                alpha = carrier.has_alpha(),
                "extracted image pixels"
            );
            (Some(carrier), rgb)
        };
        let len = payload.len();

        let bundle = tokio::task::spawn_blocking(move || credential.seal(&payload)).await??;

        // The bundle is only written once the image is on disk
        let image_path = match carrier {
            Some(carrier) => {
                let image = carrier.rebuild(bundle.ciphertext())?;
                let output_path = self.output_path();
                carrier::save_png(&image, &output_path)?;
                Some(output_path)
            }
            None => None,
        };

        let bundle_path = self.bundle_path();
        fs::write(&bundle_path, bundle.to_bytes())?;

        let mut output = format!(
            "Sealed {} bytes ({}) into {}",
            len,
            bundle.key_wrap().mode_name(),
            bundle_path.display()
        );
        if let Some(image_path) = image_path {
            output.push_str(&format!("\nCiphertext image: {}", image_path.display()));
        }

        Ok(output)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Seal {
    type Error = SealOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let credential = self.credential(ctx.config_path.clone())?;
        self.seal_with(credential).await
    }
}
