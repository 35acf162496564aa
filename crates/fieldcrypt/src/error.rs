//! Conversions from module errors into the shared [`FieldError`].
//!
//! Messages are built from the module errors' `Display`, which never includes
//! plaintext, key bytes or passphrases.

use common::FieldError;

use crate::codec::CodecError;
use crate::config::SettingsError;
use crate::crypto::CipherError;
use crate::keys::{KeyGenError, KeyLoadError};
use crate::registry::RegistryError;
use crate::schema::SchemaError;

impl From<SettingsError> for FieldError {
    fn from(err: SettingsError) -> Self {
        FieldError::Settings(err.to_string())
    }
}

impl From<KeyLoadError> for FieldError {
    fn from(err: KeyLoadError) -> Self {
        FieldError::KeyLoad(err.to_string())
    }
}

impl From<KeyGenError> for FieldError {
    fn from(err: KeyGenError) -> Self {
        FieldError::KeyLoad(err.to_string())
    }
}

impl From<SchemaError> for FieldError {
    fn from(err: SchemaError) -> Self {
        FieldError::Settings(err.to_string())
    }
}

/// Only construction errors reach this path; per-value failures are
/// [`CodecError`]s.
impl From<CipherError> for FieldError {
    fn from(err: CipherError) -> Self {
        FieldError::Settings(err.to_string())
    }
}

impl From<CodecError> for FieldError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::PayloadTooLarge { len, max } => FieldError::PayloadTooLarge { len, max },
            CodecError::Encryption => FieldError::InvalidValue(err.to_string()),
            CodecError::Decryption(failure) => FieldError::Decryption(failure.to_string()),
            CodecError::InvalidValue(_) => FieldError::InvalidValue(err.to_string()),
        }
    }
}

impl From<RegistryError> for FieldError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Column {
                entity,
                column,
                source,
            } => match FieldError::from(source) {
                FieldError::Decryption(msg) => {
                    FieldError::Decryption(format!("{entity}.{column}: {msg}"))
                }
                FieldError::InvalidValue(msg) => {
                    FieldError::InvalidValue(format!("{entity}.{column}: {msg}"))
                }
                other => other,
            },
            RegistryError::Duplicate { entity, columns } => {
                FieldError::Duplicate(format!("{entity}({columns})"))
            }
            RegistryError::AlreadyRegistered { .. } | RegistryError::InvalidConstraint { .. } => {
                FieldError::Settings(err.to_string())
            }
            RegistryError::UnknownEntity(_) | RegistryError::NotAnObject(_) => {
                FieldError::InvalidValue(err.to_string())
            }
        }
    }
}
