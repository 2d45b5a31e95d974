// CLI modules
mod cli;

// Image adapter and on-disk state
mod carrier;
mod state;
mod version;

use clap::{Parser, Subcommand};
use cli::op::{ExitStatus, Op, OpContext, EXIT_FAILURE, EXIT_SUCCESS};
use cli::{args::Args, Init, Inspect, Keygen, Open, Seal, Version};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

command_enum! {
    (Init, Init),
    (Keygen, Keygen),
    (Seal, Seal),
    (Open, Open),
    (Inspect, Inspect),
    (Version, Version),
}

fn init_tracing(log_level: &str) -> WorkerGuard {
    // stdout carries command output, so logs go to stderr
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let log_level: tracing::Level = log_level.parse().unwrap_or(tracing::Level::WARN);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();
    guard
}

async fn run(args: Args) -> i32 {
    let _guard = init_tracing(&args.log_level);
    let ctx = OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            EXIT_SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version are not failures; everything else is usage
            let code = if e.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let code = run(args).await;
    std::process::exit(code);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    use common::crypto::PasswordParams;
    use image::{DynamicImage, Rgba, RgbaImage};
    use tempfile::TempDir;
    use zeroize::Zeroizing;

    use crate::carrier::{self, Carrier};
    use crate::cli::ops::credential::{OpenWith, SealFor};

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("pixseal").chain(args.iter().copied()))
    }

    async fn init_state(temp: &TempDir) -> OpContext {
        let ctx = OpContext::new(Some(temp.path().join("state")));
        Init { bits: None }.execute(&ctx).await.unwrap();
        ctx
    }

    fn seal_raw(input: &Path) -> Seal {
        Seal {
            input: input.to_path_buf(),
            recipient: None,
            password_stdin: false,
            bundle: None,
            output: None,
            raw: true,
        }
    }

    fn open_raw(bundle: &Path, output: &Path) -> Open {
        Open {
            bundle: bundle.to_path_buf(),
            key: None,
            password_stdin: false,
            output: output.to_path_buf(),
            carrier: None,
            raw: true,
        }
    }

    fn bundle_of(input: &Path) -> PathBuf {
        cli::ops::seal::with_appended_extension(input, "pxsl")
    }

    #[test]
    fn test_parse_seal_and_open() {
        let args = parse(&[
            "--config-path",
            "/tmp/state",
            "seal",
            "photo.png",
            "--recipient",
            "bob.pem",
        ])
        .unwrap();
        assert_eq!(args.config_path, Some(PathBuf::from("/tmp/state")));
        assert_eq!(args.log_level, "warn");
        match args.command {
            Command::Seal(op) => {
                assert_eq!(op.input, PathBuf::from("photo.png"));
                assert_eq!(op.recipient, Some(PathBuf::from("bob.pem")));
                assert!(!op.raw);
            }
            other => panic!("expected seal, got {:?}", other),
        }

        let args = parse(&["open", "photo.png.pxsl", "-o", "out.bin", "--raw"]).unwrap();
        assert!(matches!(args.command, Command::Open(Open { raw: true, .. })));
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        // open in image mode needs a carrier
        assert!(parse(&["open", "b.pxsl", "-o", "out.png"]).is_err());
        assert!(parse(&["seal", "in.png", "--recipient", "k.pem", "--password-stdin"]).is_err());
        assert!(parse(&["seal", "in.bin", "--raw", "--output", "x.png"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());

        let err = parse(&["seal"]).unwrap_err();
        assert!(err.use_stderr());
        assert!(!parse(&["--help"]).unwrap_err().use_stderr());
    }

    #[tokio::test]
    async fn test_raw_seal_open_round_trip() {
        let temp = TempDir::new().unwrap();
        let ctx = init_state(&temp).await;

        let input = temp.path().join("notes.txt");
        fs::write(&input, b"meet at the usual place").unwrap();
        let out = seal_raw(&input).execute(&ctx).await.unwrap();
        assert!(out.contains("rsa-oaep-sha256"));

        let bundle = bundle_of(&input);
        let described = Inspect {
            bundle: bundle.clone(),
        }
        .execute(&ctx)
        .await
        .unwrap();
        assert!(described.contains("ciphertext:       23 bytes"));

        let recovered = temp.path().join("recovered.txt");
        open_raw(&bundle, &recovered).execute(&ctx).await.unwrap();
        assert_eq!(fs::read(&recovered).unwrap(), b"meet at the usual place");
    }

    #[tokio::test]
    async fn test_tampered_bundle_exits_with_two() {
        let temp = TempDir::new().unwrap();
        let ctx = init_state(&temp).await;

        let input = temp.path().join("payload.bin");
        fs::write(&input, vec![0x42u8; 300]).unwrap();
        seal_raw(&input).execute(&ctx).await.unwrap();

        let bundle = bundle_of(&input);
        let mut bytes = fs::read(&bundle).unwrap();
        let ciphertext_at = bytes.len() - 300;
        bytes[ciphertext_at + 150] ^= 0xFF;
        fs::write(&bundle, &bytes).unwrap();

        let recovered = temp.path().join("recovered.bin");
        let err = Command::Open(open_raw(&bundle, &recovered))
            .execute(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), cli::op::EXIT_TAMPERED);
        assert!(!recovered.exists());

        // Structural damage is an ordinary failure
        fs::write(&bundle, &bytes[..40]).unwrap();
        let err = Command::Open(open_raw(&bundle, &recovered))
            .execute(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[tokio::test]
    async fn test_missing_state_is_exit_one() {
        let temp = TempDir::new().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("missing")));
        let input = temp.path().join("in.bin");
        fs::write(&input, b"x").unwrap();

        let err = Command::Seal(seal_raw(&input))
            .execute(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[tokio::test]
    async fn test_image_seal_open_preserves_alpha() {
        let temp = TempDir::new().unwrap();
        let ctx = init_state(&temp).await;

        let mut img = RgbaImage::new(8, 5);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([x as u8 * 30, y as u8 * 40, 200, 255 - x as u8]);
        }
        let original = DynamicImage::ImageRgba8(img);
        let input = temp.path().join("original.png");
        carrier::save_png(&original, &input).unwrap();

        let sealed_png = temp.path().join("encrypted.png");
        Seal {
            input: input.clone(),
            recipient: None,
            password_stdin: false,
            bundle: None,
            output: Some(sealed_png.clone()),
            raw: false,
        }
        .execute(&ctx)
        .await
        .unwrap();

        // The ciphertext image keeps the original alpha but not its colors
        let (sealed_carrier, sealed_rgb) = Carrier::open(&sealed_png).unwrap();
        let (original_carrier, original_rgb) = Carrier::extract(&original);
        assert_eq!(sealed_carrier, original_carrier);
        assert_ne!(sealed_rgb, original_rgb);

        let decrypted = temp.path().join("decrypted.png");
        Open {
            bundle: bundle_of(&input),
            key: None,
            password_stdin: false,
            output: decrypted.clone(),
            carrier: Some(sealed_png),
            raw: false,
        }
        .execute(&ctx)
        .await
        .unwrap();
        assert_eq!(image::open(&decrypted).unwrap().to_rgba8(), original.to_rgba8());
    }

    #[tokio::test]
    async fn test_password_mode_through_ops() {
        let temp = TempDir::new().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("no-state")));
        let params = PasswordParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        };

        let input = temp.path().join("secret.bin");
        fs::write(&input, b"password sealed").unwrap();
        seal_raw(&input)
            .seal_with(SealFor::Password {
                password: Zeroizing::new(b"hunter2".to_vec()),
                params,
            })
            .await
            .unwrap();

        let bundle = bundle_of(&input);
        let described = Inspect {
            bundle: bundle.clone(),
        }
        .execute(&ctx)
        .await
        .unwrap();
        assert!(described.contains("argon2id:         m=256 KiB, t=1, p=1"));

        let recovered = temp.path().join("recovered.bin");
        let op = open_raw(&bundle, &recovered);
        let err = op
            .open_with(OpenWith::Password(Zeroizing::new(b"hunter3".to_vec())))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_FAILURE);

        op.open_with(OpenWith::Password(Zeroizing::new(b"hunter2".to_vec())))
            .await
            .unwrap();
        assert_eq!(fs::read(&recovered).unwrap(), b"password sealed");
    }

    #[tokio::test]
    async fn test_keygen_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("no-state")));
        let keygen = Keygen {
            bits: Some(2048),
            out_dir: temp.path().join("keys"),
            force: false,
        };

        let out = keygen.execute(&ctx).await.unwrap();
        assert!(out.contains("2048-bit"));
        let public = state::read_public_key(&temp.path().join("keys/public.pem")).unwrap();
        let private = state::read_private_key(&temp.path().join("keys/private.pem")).unwrap();
        assert_eq!(private.public(), public);

        assert!(matches!(
            keygen.execute(&ctx).await,
            Err(cli::ops::keygen::KeygenError::Exists(_))
        ));
        assert!(Keygen {
            bits: Some(1024),
            out_dir: temp.path().join("small"),
            force: false,
        }
        .execute(&ctx)
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_version_reports_package() {
        let out = Version.execute(&OpContext::default()).await.unwrap();
        assert!(out.starts_with(&format!("pixseal {}", env!("CARGO_PKG_VERSION"))));
    }
}
