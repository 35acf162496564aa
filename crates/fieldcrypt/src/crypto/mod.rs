//! Field encryption primitives.
//!
//! This module is free of schema and registry dependencies. It provides the
//! two engines the column codecs are built on.
//!
//! # Stored format
//!
//! Both engines store standard, padded Base64 text with no prefix, key id, or
//! algorithm tag. The key pair and symmetric material are therefore part of the
//! storage schema.
//!
//! - [`asymmetric`]: RSA PKCS#1 v1.5, randomized, at most `k - 11` plaintext bytes.
//! - [`cipher`]: AES-256-GCM-SIV with a fixed nonce, deterministic, no size ceiling.

pub mod asymmetric;
pub mod cipher;

pub use asymmetric::{RsaEngine, RsaError};
pub use cipher::{CipherError, SymmetricCipher};
