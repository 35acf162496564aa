//! Cross-crate error classification.

use thiserror::Error;

/// How a caller is expected to react to a [`FieldError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The process cannot run: bad settings or unusable key material.
    Fatal,
    /// The caller supplied a value the write path must reject.
    Validation,
    /// Stored data cannot be read back: corrupted storage or key mismatch.
    Integrity,
}

/// Top-level field encryption error as seen by the persistence layer.
///
/// Variants map to a [`Disposition`]:
/// - [`FieldError::Settings`] and [`FieldError::KeyLoad`] → fatal
/// - [`FieldError::PayloadTooLarge`], [`FieldError::InvalidValue`] and
///   [`FieldError::Duplicate`] → validation
/// - [`FieldError::Decryption`] → integrity
#[derive(Debug, Error)]
pub enum FieldError {
    /// Settings were missing or malformed.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// The RSA key pair could not be loaded.
    #[error("key load failed: {0}")]
    KeyLoad(String),

    /// The canonical plaintext exceeds what the RSA key can encrypt.
    #[error("payload too large: {len} bytes, at most {max} allowed")]
    PayloadTooLarge { len: usize, max: usize },

    /// The value does not have the shape the column codec expects.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A uniqueness constraint over decrypted values was violated.
    #[error("duplicate value for unique columns {0}")]
    Duplicate(String),

    /// A stored value could not be decrypted or parsed.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

impl FieldError {
    /// Returns the expected caller reaction for this error.
    pub fn disposition(&self) -> Disposition {
        match self {
            FieldError::Settings(_) | FieldError::KeyLoad(_) => Disposition::Fatal,
            FieldError::PayloadTooLarge { .. }
            | FieldError::InvalidValue(_)
            | FieldError::Duplicate(_) => Disposition::Validation,
            FieldError::Decryption(_) => Disposition::Integrity,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            FieldError::Settings(_) => "invalid_settings",
            FieldError::KeyLoad(_) => "key_load_failed",
            FieldError::PayloadTooLarge { .. } => "payload_too_large",
            FieldError::InvalidValue(_) => "invalid_value",
            FieldError::Duplicate(_) => "duplicate",
            FieldError::Decryption(_) => "decryption_failed",
        }
    }

    /// Every failure in this subsystem is deterministic; nothing is retried.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispositions() {
        assert_eq!(FieldError::KeyLoad("x".into()).disposition(), Disposition::Fatal);
        assert_eq!(FieldError::Settings("x".into()).disposition(), Disposition::Fatal);
        assert_eq!(
            FieldError::PayloadTooLarge { len: 300, max: 245 }.disposition(),
            Disposition::Validation
        );
        assert_eq!(
            FieldError::Duplicate("email".into()).disposition(),
            Disposition::Validation
        );
        assert_eq!(
            FieldError::Decryption("x".into()).disposition(),
            Disposition::Integrity
        );
    }

    #[test]
    fn nothing_is_retryable() {
        assert!(!FieldError::Decryption("x".into()).is_retryable());
        assert!(!FieldError::KeyLoad("x".into()).is_retryable());
    }

    #[test]
    fn display_includes_bounds() {
        let e = FieldError::PayloadTooLarge { len: 246, max: 245 };
        let s = e.to_string();
        assert!(s.contains("246") && s.contains("245"), "{s}");
        assert_eq!(e.code(), "payload_too_large");
    }
}
