//! `fieldcrypt`: operator binary for the field encryption subsystem.
//!
//! Startup sequence:
//! 1. Parse the command line.
//! 2. Load and validate [`EncryptionSettings`] from environment variables
//!    (every command except `keygen`).
//! 3. Initialise telemetry (JSON logs on stderr) at the settings' log level,
//!    unless `--log-level` overrides it.
//! 4. Build the [`CryptoContext`]: key pair, symmetric cipher, column registry.
//! 5. Run the command.
//!
//! Exit codes: `0` success, `78` fatal (settings or keys), `65` a row was
//! rejected as invalid, `66` a stored row could not be decrypted.

mod rows;
mod telemetry;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::protocol::ErrorResponse;
use common::{Disposition, FieldError};
use fieldcrypt::keys::{self, KeyGenOptions};
use fieldcrypt::{CryptoContext, EncryptionSettings, KeyMaterial, RsaEngine};
use serde_json::json;
use tracing::info;
use zeroize::Zeroizing;

use rows::Direction;

const EXIT_FATAL: u8 = 78;
const EXIT_VALIDATION: u8 = 65;
const EXIT_INTEGRITY: u8 = 66;

#[derive(Parser)]
#[command(
    name = "fieldcrypt",
    version,
    about = "Field-level encryption for sensitive ledger columns",
    long_about = "Seals and opens entity rows as JSON lines using the configured \
                  RSA key pair and AES-256-GCM-SIV key. Settings are read from \
                  PRIVATE_KEY_PATH, PUBLIC_KEY_PATH, PRIVATE_KEY_PASSWORD, \
                  SYMMETRIC_KEY, SYMMETRIC_IV, SCHEMA_PATH and LOG_LEVEL."
)]
struct Cli {
    /// Log filter, overriding LOG_LEVEL; RUST_LOG overrides both
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a PEM key pair
    Keygen {
        /// Directory for public.pem and private.pem
        #[arg(long)]
        out_dir: PathBuf,
        /// Modulus size in bits
        #[arg(long, default_value_t = 2048)]
        bits: usize,
        /// Name of the environment variable holding the private key passphrase
        #[arg(long)]
        passphrase_env: Option<String>,
    },

    /// Load settings, keys and schema, then print a summary
    Check,

    /// Encrypt registered columns of JSON rows read from stdin
    Seal,

    /// Decrypt registered columns of JSON rows read from stdin
    Open,
}

impl Commands {
    /// `keygen` runs before any key or settings exist.
    fn needs_settings(&self) -> bool {
        !matches!(self, Commands::Keygen { .. })
    }
}

fn main() -> ExitCode {
    // -----------------------------------------------------------------------
    // 1. Command line
    // -----------------------------------------------------------------------
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let settings = if cli.command.needs_settings() {
        match EncryptionSettings::from_env() {
            Ok(settings) => Some(settings),
            Err(e) => {
                // Telemetry is not up; write to stderr directly.
                let err = FieldError::from(e);
                report(&ErrorResponse::new(
                    err.code(),
                    format!("configuration invalid: {err}"),
                ));
                return ExitCode::from(EXIT_FATAL);
            }
        }
    } else {
        None
    };

    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    let configured = settings.as_ref().map(|s| s.log_level.as_str());
    let log_level = telemetry::log_level(cli.log_level.as_deref(), configured);
    if let Err(e) = telemetry::init(log_level) {
        eprintln!("ERROR: {e:#}");
        return ExitCode::from(EXIT_FATAL);
    }
    info!(version = env!("CARGO_PKG_VERSION"), log_level, "fieldcrypt starting");

    match run(cli.command, settings.as_ref()) {
        Ok(code) => code,
        Err(err) => {
            let response = match err.downcast_ref::<FieldError>() {
                Some(field) => ErrorResponse::new(field.code(), format!("{err:#}")),
                None => ErrorResponse::new("fatal", format!("{err:#}")),
            };
            report(&response);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(command: Commands, settings: Option<&EncryptionSettings>) -> Result<ExitCode> {
    match (command, settings) {
        (
            Commands::Keygen {
                out_dir,
                bits,
                passphrase_env,
            },
            _,
        ) => keygen(out_dir, bits, passphrase_env),
        (Commands::Check, Some(settings)) => check(settings),
        (Commands::Seal, Some(settings)) => transform(settings, Direction::Seal),
        (Commands::Open, Some(settings)) => transform(settings, Direction::Open),
        (_, None) => anyhow::bail!("settings were not loaded"),
    }
}

fn keygen(out_dir: PathBuf, bits: usize, passphrase_env: Option<String>) -> Result<ExitCode> {
    let passphrase = match passphrase_env {
        Some(var) => Some(Zeroizing::new(
            std::env::var(&var).with_context(|| format!("passphrase variable {var} is not set"))?,
        )),
        None => None,
    };

    let opts = KeyGenOptions {
        bits,
        passphrase: passphrase.as_deref().cloned(),
        ..KeyGenOptions::default()
    };
    let pair = keys::generate(&opts).map_err(FieldError::from)?;

    // Re-import to prove the pair loads the way the service will load it.
    let engine = KeyMaterial::from_pem(
        &pair.public_pem,
        &pair.private_pem,
        passphrase.as_deref().map(String::as_str),
    )
    .map(RsaEngine::new)
    .map_err(FieldError::from)?;

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let (public_path, private_path) = pair.write_to(&out_dir).map_err(FieldError::from)?;

    println!(
        "{}",
        json!({
            "public_key_path": public_path,
            "private_key_path": private_path,
            "fingerprint": engine.fingerprint(),
            "max_plaintext_len": engine.max_plaintext_len(),
        })
    );
    Ok(ExitCode::SUCCESS)
}

// -----------------------------------------------------------------------
// 4. Crypto context
// -----------------------------------------------------------------------

fn context(settings: &EncryptionSettings) -> Result<CryptoContext> {
    let ctx = CryptoContext::init(settings).context("crypto context initialisation failed")?;
    Ok(ctx)
}

fn check(settings: &EncryptionSettings) -> Result<ExitCode> {
    let ctx = context(settings)?;
    let registry = ctx.registry();
    let entities: serde_json::Map<String, serde_json::Value> = registry
        .entities()
        .into_iter()
        .map(|entity| (entity.to_owned(), json!(registry.columns(entity))))
        .collect();

    println!(
        "{}",
        json!({
            "fingerprint": ctx.engine().fingerprint(),
            "max_plaintext_len": ctx.engine().max_plaintext_len(),
            "entities": entities,
        })
    );
    Ok(ExitCode::SUCCESS)
}

fn transform(settings: &EncryptionSettings, direction: Direction) -> Result<ExitCode> {
    let ctx = context(settings)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    let summary = rows::process(
        ctx.registry(),
        direction,
        stdin.lock(),
        &mut stdout.lock(),
        &mut stderr.lock(),
    )
    .context("row stream failed")?;

    info!(
        ?direction,
        processed = summary.processed,
        failed = summary.failed,
        "row stream finished"
    );
    Ok(ExitCode::from(exit_code(summary.worst)))
}

fn exit_code(worst: Option<Disposition>) -> u8 {
    match worst {
        None => 0,
        Some(Disposition::Validation) => EXIT_VALIDATION,
        Some(Disposition::Integrity) => EXIT_INTEGRITY,
        Some(Disposition::Fatal) => EXIT_FATAL,
    }
}

fn report(response: &ErrorResponse) {
    match serde_json::to_string(response) {
        Ok(line) => eprintln!("{line}"),
        Err(_) => eprintln!("ERROR: {}", response.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn keygen_arguments_parse() {
        let cli = Cli::parse_from([
            "fieldcrypt",
            "keygen",
            "--out-dir",
            "/tmp/keys",
            "--bits",
            "3072",
            "--passphrase-env",
            "KEY_PASS",
        ]);
        match cli.command {
            Commands::Keygen {
                out_dir,
                bits,
                passphrase_env,
            } => {
                assert_eq!(out_dir, PathBuf::from("/tmp/keys"));
                assert_eq!(bits, 3072);
                assert_eq!(passphrase_env.as_deref(), Some("KEY_PASS"));
            }
            _ => panic!("expected keygen"),
        }
    }

    #[test]
    fn log_level_flag_is_optional() {
        let cli = Cli::parse_from(["fieldcrypt", "check"]);
        assert!(cli.log_level.is_none());
        assert!(cli.command.needs_settings());

        let cli = Cli::parse_from(["fieldcrypt", "seal", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn keygen_runs_without_settings() {
        let cli = Cli::parse_from(["fieldcrypt", "keygen", "--out-dir", "/tmp/keys"]);
        assert!(!cli.command.needs_settings());
    }

    #[test]
    fn settings_commands_refuse_to_run_without_settings() {
        assert!(run(Commands::Check, None).is_err());
        assert!(run(Commands::Open, None).is_err());
    }

    #[test]
    fn dispositions_map_to_exit_codes() {
        assert_eq!(exit_code(None), 0);
        assert_eq!(exit_code(Some(Disposition::Validation)), 65);
        assert_eq!(exit_code(Some(Disposition::Integrity)), 66);
        assert_eq!(exit_code(Some(Disposition::Fatal)), 78);
    }
}
