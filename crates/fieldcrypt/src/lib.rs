//! Transparent field-level encryption for sensitive ledger columns.
//!
//! Two independent paths protect entity properties at rest:
//!
//! - **Asymmetric** ([`codec`]): typed values are projected to a canonical
//!   string and encrypted with RSA PKCS#1 v1.5 under one process-wide key pair.
//!   Ciphertext is randomized.
//! - **Symmetric** ([`crypto::SymmetricCipher`]): annotated string columns are
//!   encrypted with AES-256-GCM-SIV under a fixed nonce. Ciphertext is
//!   deterministic.
//!
//! The [`registry::ColumnRegistry`] assigns exactly one path per property and
//! seals or opens whole rows for the persistence layer.

pub mod codec;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod registry;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{AsymmetricCodec, CanonicalForm, CodecError, CodecKind, CodecSet};
pub use config::EncryptionSettings;
pub use context::CryptoContext;
pub use crypto::{RsaEngine, SymmetricCipher};
pub use keys::KeyMaterial;
pub use registry::{ColumnCodec, ColumnRegistry, MatchMode, RegistryError};
