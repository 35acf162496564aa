//! RSA key material: loading from PEM files and key-pair generation.
//!
//! # Lifecycle
//!
//! 1. At startup the composition root calls [`KeyMaterial::load`] exactly once.
//! 2. The loaded pair is moved into a [`crate::crypto::RsaEngine`] and shared
//!    read-only behind an `Arc` by every asymmetric codec.
//! 3. There is no rotation; the pair lives until the process exits.
//!
//! # Security invariants
//!
//! - Key bytes and passphrases are **never** logged or included in errors.
//! - A load failure is fatal: there is no degraded mode.

pub mod generate;

pub use generate::{generate, GeneratedKeyPair, KeyGenError, KeyGenOptions};

use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use crate::config::EncryptionSettings;

const PKCS8_LABEL: &str = "PRIVATE KEY";
const PKCS8_ENCRYPTED_LABEL: &str = "ENCRYPTED PRIVATE KEY";
const PKCS1_PRIVATE_LABEL: &str = "RSA PRIVATE KEY";
const SPKI_LABEL: &str = "PUBLIC KEY";
const PKCS1_PUBLIC_LABEL: &str = "RSA PUBLIC KEY";

/// Smallest modulus accepted at load time.
pub const MIN_MODULUS_BITS: usize = 1024;

/// Errors produced while loading the key pair.
#[derive(Debug, Error)]
pub enum KeyLoadError {
    /// The key file is missing or unreadable.
    #[error("failed to read key file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a PEM-encoded RSA key of a supported kind.
    #[error("malformed PEM in {}: {reason}", path.display())]
    MalformedPem { path: PathBuf, reason: String },

    /// The passphrase is wrong, or does not match how the key file is stored.
    #[error("cannot unlock private key {}: {reason}", path.display())]
    Passphrase { path: PathBuf, reason: &'static str },

    /// The public key is not the pair of the private key.
    #[error("public key does not belong to the private key")]
    Mismatch,

    #[error("{bits}-bit modulus is below the {MIN_MODULUS_BITS}-bit minimum")]
    TooSmall { bits: usize },
}

/// An RSA key pair: the public half encrypts, the private half decrypts.
pub struct KeyMaterial {
    public: RsaPublicKey,
    private: RsaPrivateKey,
    fingerprint: String,
}

impl KeyMaterial {
    /// Read and import the key pair named by `settings`.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyLoadError`] when a file cannot be read, the PEM is
    /// malformed, the passphrase is wrong, or the halves do not match.
    pub fn load(settings: &EncryptionSettings) -> Result<Self, KeyLoadError> {
        let public_pem = read_pem(&settings.public_key_path)?;
        let private_pem = Zeroizing::new(read_pem(&settings.private_key_path)?);

        let public = parse_public(&public_pem, &settings.public_key_path)?;
        let private = parse_private(
            &private_pem,
            settings.private_key_password(),
            &settings.private_key_path,
        )?;

        let keys = Self::from_keys(public, private)?;
        info!(
            public_key = %settings.public_key_path.display(),
            private_key = %settings.private_key_path.display(),
            encrypted = settings.private_key_password().is_some(),
            modulus_bits = keys.modulus_len() * 8,
            fingerprint = %keys.fingerprint,
            "RSA key pair loaded"
        );
        Ok(keys)
    }

    /// Import a key pair from in-memory PEM text.
    pub fn from_pem(
        public_pem: &str,
        private_pem: &str,
        password: Option<&str>,
    ) -> Result<Self, KeyLoadError> {
        let origin = Path::new("<memory>");
        let public = parse_public(public_pem, origin)?;
        let private = parse_private(private_pem, password, origin)?;
        Self::from_keys(public, private)
    }

    fn from_keys(public: RsaPublicKey, private: RsaPrivateKey) -> Result<Self, KeyLoadError> {
        if RsaPublicKey::from(&private) != public {
            return Err(KeyLoadError::Mismatch);
        }
        check_modulus(public.n().bits())?;
        let fingerprint = fingerprint(&public)?;
        Ok(Self {
            public,
            private,
            fingerprint,
        })
    }

    /// Modulus size `k` in bytes.
    pub fn modulus_len(&self) -> usize {
        self.public.size()
    }

    /// First 8 bytes of the SHA-256 of the public key's SPKI DER, in hex.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("modulus_bits", &(self.modulus_len() * 8))
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

fn check_modulus(bits: usize) -> Result<(), KeyLoadError> {
    if bits < MIN_MODULUS_BITS {
        return Err(KeyLoadError::TooSmall { bits });
    }
    Ok(())
}

fn read_pem(path: &Path) -> Result<String, KeyLoadError> {
    std::fs::read_to_string(path).map_err(|source| KeyLoadError::Read {
        path: path.to_owned(),
        source,
    })
}

fn pem_label<'a>(pem: &'a str, path: &Path) -> Result<&'a str, KeyLoadError> {
    pkcs8::der::pem::decode_label(pem.as_bytes()).map_err(|e| KeyLoadError::MalformedPem {
        path: path.to_owned(),
        reason: e.to_string(),
    })
}

fn parse_public(pem: &str, path: &Path) -> Result<RsaPublicKey, KeyLoadError> {
    let malformed = |reason: String| KeyLoadError::MalformedPem {
        path: path.to_owned(),
        reason,
    };
    match pem_label(pem, path)? {
        SPKI_LABEL => RsaPublicKey::from_public_key_pem(pem).map_err(|e| malformed(e.to_string())),
        PKCS1_PUBLIC_LABEL => {
            RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| malformed(e.to_string()))
        }
        other => Err(malformed(format!("unexpected PEM label {other:?} for a public key"))),
    }
}

fn parse_private(
    pem: &str,
    password: Option<&str>,
    path: &Path,
) -> Result<RsaPrivateKey, KeyLoadError> {
    let malformed = |reason: String| KeyLoadError::MalformedPem {
        path: path.to_owned(),
        reason,
    };
    let passphrase = |reason: &'static str| KeyLoadError::Passphrase {
        path: path.to_owned(),
        reason,
    };

    let label = pem_label(pem, path)?;
    let key = match (label, password) {
        (PKCS8_ENCRYPTED_LABEL, Some(password)) => {
            // A wrong passphrase surfaces as either a padding or a DER error.
            RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password)
                .map_err(|_| passphrase("wrong passphrase"))?
        }
        (PKCS8_ENCRYPTED_LABEL, None) => {
            return Err(passphrase("key is encrypted but no password is configured"))
        }
        (PKCS8_LABEL | PKCS1_PRIVATE_LABEL, Some(_)) => {
            return Err(passphrase("a password is configured but the key is not encrypted"))
        }
        (PKCS8_LABEL, None) => {
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| malformed(e.to_string()))?
        }
        (PKCS1_PRIVATE_LABEL, None) => {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| malformed(e.to_string()))?
        }
        (other, _) => {
            return Err(malformed(format!(
                "unexpected PEM label {other:?} for a private key"
            )))
        }
    };

    key.validate().map_err(|e| malformed(e.to_string()))?;
    Ok(key)
}

fn fingerprint(public: &RsaPublicKey) -> Result<String, KeyLoadError> {
    let der = public
        .to_public_key_der()
        .map_err(|e| KeyLoadError::MalformedPem {
            path: PathBuf::from("<public key>"),
            reason: e.to_string(),
        })?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(digest[..8].iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SecretBytes, SecretString};
    use crate::crypto::cipher::{KEY_LEN, NONCE_LEN};
    use crate::testing;

    fn settings_for(dir: &Path, password: Option<&str>) -> EncryptionSettings {
        EncryptionSettings {
            private_key_path: dir.join("private.pem"),
            public_key_path: dir.join("public.pem"),
            private_key_password: password.map(SecretString::new),
            symmetric_key: SecretBytes::new(vec![0u8; KEY_LEN]),
            symmetric_iv: SecretBytes::new(vec![0u8; NONCE_LEN]),
            schema_path: None,
            log_level: "info".into(),
        }
    }

    #[test]
    fn loads_plain_pair_from_files() {
        let dir = tempfile::tempdir().unwrap();
        testing::plain_pair().write_to(dir.path()).unwrap();
        let keys = KeyMaterial::load(&settings_for(dir.path(), None)).unwrap();
        assert_eq!(keys.modulus_len(), 128);
        assert_eq!(keys.fingerprint().len(), 16);
    }

    #[test]
    fn loads_encrypted_pair_with_correct_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        testing::encrypted_pair().write_to(dir.path()).unwrap();
        let keys =
            KeyMaterial::load(&settings_for(dir.path(), Some(testing::PASSPHRASE))).unwrap();
        assert_eq!(keys.modulus_len(), 128);
    }

    #[test]
    fn wrong_passphrase_is_key_load_error() {
        let dir = tempfile::tempdir().unwrap();
        testing::encrypted_pair().write_to(dir.path()).unwrap();
        let err = KeyMaterial::load(&settings_for(dir.path(), Some("not it"))).unwrap_err();
        assert!(matches!(err, KeyLoadError::Passphrase { .. }), "{err}");
    }

    #[test]
    fn encrypted_key_without_passphrase_fails() {
        let dir = tempfile::tempdir().unwrap();
        testing::encrypted_pair().write_to(dir.path()).unwrap();
        let err = KeyMaterial::load(&settings_for(dir.path(), None)).unwrap_err();
        assert!(matches!(err, KeyLoadError::Passphrase { .. }));
    }

    #[test]
    fn passphrase_for_plain_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        testing::plain_pair().write_to(dir.path()).unwrap();
        let err = KeyMaterial::load(&settings_for(dir.path(), Some("extra"))).unwrap_err();
        assert!(matches!(err, KeyLoadError::Passphrase { .. }));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KeyMaterial::load(&settings_for(dir.path(), None)).unwrap_err();
        assert!(matches!(err, KeyLoadError::Read { .. }));
    }

    #[test]
    fn garbage_pem_is_malformed() {
        let pair = testing::plain_pair();
        let err = KeyMaterial::from_pem("not a pem", &pair.private_pem, None).unwrap_err();
        assert!(matches!(err, KeyLoadError::MalformedPem { .. }));
    }

    #[test]
    fn swapped_files_are_rejected() {
        let pair = testing::plain_pair();
        let err = KeyMaterial::from_pem(&pair.private_pem, &pair.public_pem, None).unwrap_err();
        assert!(matches!(err, KeyLoadError::MalformedPem { .. }));
    }

    #[test]
    fn halves_of_different_pairs_are_rejected() {
        let a = testing::plain_pair();
        let b = testing::other_pair();
        let err = KeyMaterial::from_pem(&a.public_pem, &b.private_pem, None).unwrap_err();
        assert!(matches!(err, KeyLoadError::Mismatch));
    }

    #[test]
    fn small_modulus_rejected() {
        assert!(matches!(
            check_modulus(512),
            Err(KeyLoadError::TooSmall { bits: 512 })
        ));
        assert!(matches!(check_modulus(64), Err(KeyLoadError::TooSmall { .. })));
        assert!(check_modulus(MIN_MODULUS_BITS).is_ok());
        assert!(check_modulus(4096).is_ok());

        let pair = testing::plain_pair();
        let keys = KeyMaterial::from_pem(&pair.public_pem, &pair.private_pem, None).unwrap();
        assert_eq!(keys.modulus_len() * 8, MIN_MODULUS_BITS);
    }

    #[test]
    fn debug_never_prints_key() {
        let pair = testing::plain_pair();
        let keys = KeyMaterial::from_pem(&pair.public_pem, &pair.private_pem, None).unwrap();
        let dbg = format!("{keys:?}");
        assert!(dbg.contains("fingerprint"));
        assert!(!dbg.contains("BEGIN"));
    }
}
