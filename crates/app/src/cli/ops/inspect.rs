use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use common::bundle::{BundleError, KeyWrap, SealedBundle};

use crate::cli::op::ExitStatus;

#[derive(Args, Debug, Clone)]
pub struct Inspect {
    /// Sealed container to describe
    pub bundle: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed bundle: {0}")]
    Bundle(#[from] BundleError),
}

impl ExitStatus for InspectError {}

/// Human readable summary of a bundle's public fields
pub fn describe(bundle: &SealedBundle) -> String {
    let key_wrap = bundle.key_wrap();
    let (data_key, auth_key) = key_wrap.wrapped_keys();

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "mode:             {}", key_wrap.mode_name());
    if let KeyWrap::Password { salt, params, .. } = key_wrap {
        let _ = writeln!(out, "salt:             {}", hex::encode(salt.as_bytes()));
        let _ = writeln!(
            out,
            "argon2id:         m={} KiB, t={}, p={}",
            params.memory_kib, params.iterations, params.parallelism
        );
    }
    let _ = writeln!(out, "nonce:            {}", bundle.nonce().to_hex());
    let _ = writeln!(out, "tag:              {}", bundle.tag().to_hex());
    let _ = writeln!(out, "wrapped data key: {} bytes", data_key.len());
    let _ = writeln!(out, "wrapped auth key: {} bytes", auth_key.len());
    let _ = write!(out, "ciphertext:       {} bytes", bundle.ciphertext().len());
    out
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Inspect {
    type Error = InspectError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let bytes = fs::read(&self.bundle)?;
        let bundle = SealedBundle::from_bytes(&bytes)?;
        Ok(describe(&bundle))
    }
}
