//! Encryption settings loading and validation.
//!
//! All values are read from environment variables once at startup. There is no
//! reload: the key pair and symmetric material are part of the storage schema
//! for the lifetime of the data.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::cipher::{KEY_LEN, NONCE_LEN};

/// Errors produced while building [`EncryptionSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The configuration source could not be read or deserialised.
    #[error("failed to load settings: {0}")]
    Source(#[from] config::ConfigError),

    /// A value was present but unusable.
    #[error("{0}")]
    Invalid(String),
}

/// Byte string that never prints and is zeroed on drop.
///
/// Deserialises from standard Base64 text.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBytes([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for SecretBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut encoded = String::deserialize(deserializer)?;
        let decoded = STANDARD.decode(encoded.trim());
        encoded.zeroize();
        decoded
            .map(SecretBytes)
            .map_err(|_| serde::de::Error::custom("expected standard base64 text"))
    }
}

/// Passphrase text that never prints and is zeroed on drop.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

/// Validated encryption settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionSettings {
    /// PEM file holding the RSA private key. **Required.**
    pub private_key_path: PathBuf,

    /// PEM file holding the RSA public key. **Required.**
    pub public_key_path: PathBuf,

    /// Passphrase of a PKCS#8-encrypted private key. Set iff the key file is encrypted.
    #[serde(default)]
    pub private_key_password: Option<SecretString>,

    /// Base64 AES-256-GCM-SIV key (32 bytes). **Required.**
    pub symmetric_key: SecretBytes,

    /// Base64 AES-256-GCM-SIV nonce (12 bytes). **Required.**
    pub symmetric_iv: SecretBytes,

    /// YAML or JSON document declaring the encrypted entity columns.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl EncryptionSettings {
    /// Load and validate settings from process environment variables
    /// (`PRIVATE_KEY_PATH`, `PUBLIC_KEY_PATH`, `SYMMETRIC_KEY`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_environment(config::Environment::default())
    }

    /// Load and validate settings from an explicit environment source.
    pub fn from_environment(env: config::Environment) -> Result<Self, SettingsError> {
        let cfg = config::Config::builder().add_source(env).build()?;
        let settings: EncryptionSettings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The private key passphrase, treating an empty value as absent.
    pub fn private_key_password(&self) -> Option<&str> {
        self.private_key_password
            .as_ref()
            .map(SecretString::expose)
            .filter(|p| !p.is_empty())
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<(), SettingsError> {
        ensure_non_empty(&self.private_key_path, "PRIVATE_KEY_PATH")?;
        ensure_non_empty(&self.public_key_path, "PUBLIC_KEY_PATH")?;

        if self.private_key_path == self.public_key_path {
            return Err(SettingsError::Invalid(
                "PRIVATE_KEY_PATH and PUBLIC_KEY_PATH must name different files".into(),
            ));
        }
        if self.symmetric_key.len() != KEY_LEN {
            return Err(SettingsError::Invalid(format!(
                "SYMMETRIC_KEY must decode to {KEY_LEN} bytes, got {}",
                self.symmetric_key.len()
            )));
        }
        if self.symmetric_iv.len() != NONCE_LEN {
            return Err(SettingsError::Invalid(format!(
                "SYMMETRIC_IV must decode to {NONCE_LEN} bytes, got {}",
                self.symmetric_iv.len()
            )));
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &std::path::Path, name: &str) -> Result<(), SettingsError> {
    if value.as_os_str().is_empty() {
        return Err(SettingsError::Invalid(format!(
            "{name} is required and must not be empty"
        )));
    }
    Ok(())
}
