//! RSA PKCS#1 v1.5 encryption shared by every asymmetric column codec.
//!
//! Ciphertext is randomized by the padding: encrypting the same plaintext twice
//! yields different Base64 text, and both decrypt to the same bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rsa::Pkcs1v15Encrypt;
use thiserror::Error;

use crate::keys::KeyMaterial;

/// Bytes of a PKCS#1 v1.5 block taken by padding (`0x00 0x02 PS 0x00`, `|PS| >= 8`).
pub const PKCS1_V15_OVERHEAD: usize = 11;

/// Errors produced by the RSA engine.
#[derive(Debug, Error)]
pub enum RsaError {
    /// The plaintext does not fit in one PKCS#1 v1.5 block.
    #[error("plaintext is {len} bytes; the key allows at most {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// The RSA primitive failed while encrypting.
    #[error("rsa encryption failed")]
    Encryption,

    /// The stored value is not valid Base64.
    #[error("stored value is not valid base64")]
    InvalidBase64,

    /// Padding validation failed: corrupted ciphertext or a different key pair.
    #[error("rsa decryption failed")]
    Decryption,
}

/// Encrypt-with-public / decrypt-with-private over one [`KeyMaterial`].
#[derive(Debug)]
pub struct RsaEngine {
    keys: KeyMaterial,
}

impl RsaEngine {
    pub fn new(keys: KeyMaterial) -> Self {
        Self { keys }
    }

    /// Largest plaintext, in bytes, one call to [`RsaEngine::encrypt`] accepts (`k - 11`).
    pub fn max_plaintext_len(&self) -> usize {
        self.keys.modulus_len().saturating_sub(PKCS1_V15_OVERHEAD)
    }

    pub fn fingerprint(&self) -> &str {
        self.keys.fingerprint()
    }

    /// Encrypt `plaintext` with the public key and return standard Base64.
    ///
    /// # Errors
    ///
    /// Returns [`RsaError::PayloadTooLarge`] when `plaintext` exceeds
    /// [`RsaEngine::max_plaintext_len`].
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, RsaError> {
        let max = self.max_plaintext_len();
        if plaintext.len() > max {
            return Err(RsaError::PayloadTooLarge {
                len: plaintext.len(),
                max,
            });
        }
        let ciphertext = self
            .keys
            .public_key()
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|_| RsaError::Encryption)?;
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decode Base64 `stored` and decrypt it with the private key.
    pub fn decrypt(&self, stored: &str) -> Result<Vec<u8>, RsaError> {
        let ciphertext = STANDARD
            .decode(stored)
            .map_err(|_| RsaError::InvalidBase64)?;
        self.keys
            .private_key()
            .decrypt(Pkcs1v15Encrypt, &ciphertext)
            .map_err(|_| RsaError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn round_trip_bytes() {
        let engine = testing::engine();
        let stored = engine.encrypt(b"alice@example.com").unwrap();
        assert_eq!(engine.decrypt(&stored).unwrap(), b"alice@example.com");
    }

    #[test]
    fn ciphertext_is_randomized() {
        let engine = testing::engine();
        let a = engine.encrypt(b"same").unwrap();
        let b = engine.encrypt(b"same").unwrap();
        assert_ne!(a, b);
        assert_eq!(engine.decrypt(&a).unwrap(), engine.decrypt(&b).unwrap());
    }

    #[test]
    fn boundary_is_k_minus_11() {
        let engine = testing::engine();
        assert_eq!(engine.max_plaintext_len(), 128 - 11);

        let exact = vec![b'a'; engine.max_plaintext_len()];
        let stored = engine.encrypt(&exact).unwrap();
        assert_eq!(engine.decrypt(&stored).unwrap(), exact);

        let over = vec![b'a'; engine.max_plaintext_len() + 1];
        assert!(matches!(
            engine.encrypt(&over),
            Err(RsaError::PayloadTooLarge { len: 118, max: 117 })
        ));
    }

    #[test]
    fn wider_key_allows_245_bytes() {
        let engine = testing::wide_engine();
        assert_eq!(engine.max_plaintext_len(), 245);
        assert!(engine.encrypt(&[b'z'; 245]).is_ok());
        assert!(matches!(
            engine.encrypt(&[b'z'; 246]),
            Err(RsaError::PayloadTooLarge { len: 246, max: 245 })
        ));
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let engine = testing::engine();
        let stored = engine.encrypt(b"").unwrap();
        assert!(engine.decrypt(&stored).unwrap().is_empty());
    }

    #[test]
    fn other_key_pair_cannot_decrypt() {
        let stored = testing::engine().encrypt(b"secret").unwrap();
        assert!(matches!(
            testing::other_engine().decrypt(&stored),
            Err(RsaError::Decryption)
        ));
    }

    #[test]
    fn bad_base64_rejected() {
        assert!(matches!(
            testing::engine().decrypt("not*base64"),
            Err(RsaError::InvalidBase64)
        ));
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let engine = testing::engine();
        let stored = engine.encrypt(b"secret").unwrap();
        let mut raw = STANDARD.decode(stored).unwrap();
        raw.truncate(raw.len() - 1);
        assert!(engine.decrypt(&STANDARD.encode(raw)).is_err());
    }
}
