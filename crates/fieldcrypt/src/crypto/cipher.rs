//! AES-256-GCM-SIV encryption of annotated string columns.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant.
//! The configured IV is used as a fixed nonce, so identical plaintext always
//! produces identical ciphertext. That is what lets storage-level equality and
//! uniqueness work on symmetric columns.
//!
//! **Do NOT substitute plain AES-256-GCM with this fixed nonce.** GCM nonce reuse
//! is catastrophic: it breaks both confidentiality and authentication.

use aes_gcm_siv::{
    aead::{Aead, KeyInit},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Errors produced by the symmetric cipher.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid symmetric key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// The IV is the wrong length (must be [`NONCE_LEN`] bytes).
    #[error("invalid symmetric IV length: expected {NONCE_LEN} bytes, got {0}")]
    InvalidIvLength(usize),

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The stored value is not valid Base64.
    #[error("stored value is not valid base64")]
    InvalidFormat,

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Deterministic AES-256-GCM-SIV cipher bound to one key and nonce.
pub struct SymmetricCipher {
    cipher: Aes256GcmSiv,
    nonce: [u8; NONCE_LEN],
}

impl SymmetricCipher {
    /// Build a cipher from raw key and IV bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] or [`CipherError::InvalidIvLength`]
    /// if either slice does not match the cipher's sizes.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        if iv.len() != NONCE_LEN {
            return Err(CipherError::InvalidIvLength(iv.len()));
        }
        let cipher = Aes256GcmSiv::new_from_slice(key)
            .map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(iv);
        Ok(Self { cipher, nonce })
    }

    /// Encrypt a string, returning Base64 of ciphertext + tag.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, CipherError> {
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&self.nonce), plaintext.as_bytes())
            .map_err(|_| CipherError::AeadFailure)?;
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt a value produced by [`SymmetricCipher::encrypt_str`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key or
    /// tampered data).
    pub fn decrypt_str(&self, stored: &str) -> Result<String, CipherError> {
        let ciphertext = STANDARD
            .decode(stored)
            .map_err(|_| CipherError::InvalidFormat)?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext.as_ref())
            .map_err(|_| CipherError::AeadFailure)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl std::fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricCipher([REDACTED])")
    }
}
