//! Shared key fixtures for unit tests.
//!
//! RSA generation dominates test time, so each pair is generated once per test
//! binary. Most fixtures use 1024-bit keys (117-byte payload limit); the wide
//! engine uses 2048 bits for the production limit of 245 bytes.

use std::sync::{Arc, OnceLock};

use crate::crypto::{RsaEngine, SymmetricCipher};
use crate::keys::generate::{generate, GeneratedKeyPair, KeyGenOptions};
use crate::keys::KeyMaterial;

pub(crate) const PASSPHRASE: &str = "correct horse battery staple";

const TEST_BITS: usize = 1024;

fn pair(bits: usize, passphrase: Option<&str>) -> GeneratedKeyPair {
    generate(&KeyGenOptions {
        bits,
        passphrase: passphrase.map(str::to_owned),
        pbkdf2_iterations: 1_000,
    })
    .expect("key generation")
}

fn engine_from(pair: &GeneratedKeyPair) -> Arc<RsaEngine> {
    let keys = KeyMaterial::from_pem(&pair.public_pem, &pair.private_pem, None).expect("test keys");
    Arc::new(RsaEngine::new(keys))
}

pub(crate) fn plain_pair() -> &'static GeneratedKeyPair {
    static PAIR: OnceLock<GeneratedKeyPair> = OnceLock::new();
    PAIR.get_or_init(|| pair(TEST_BITS, None))
}

/// Unrelated to [`plain_pair`].
pub(crate) fn other_pair() -> &'static GeneratedKeyPair {
    static PAIR: OnceLock<GeneratedKeyPair> = OnceLock::new();
    PAIR.get_or_init(|| pair(TEST_BITS, None))
}

/// Private key protected with [`PASSPHRASE`].
pub(crate) fn encrypted_pair() -> &'static GeneratedKeyPair {
    static PAIR: OnceLock<GeneratedKeyPair> = OnceLock::new();
    PAIR.get_or_init(|| pair(TEST_BITS, Some(PASSPHRASE)))
}

pub(crate) fn engine() -> Arc<RsaEngine> {
    static ENGINE: OnceLock<Arc<RsaEngine>> = OnceLock::new();
    ENGINE.get_or_init(|| engine_from(plain_pair())).clone()
}

pub(crate) fn other_engine() -> Arc<RsaEngine> {
    static ENGINE: OnceLock<Arc<RsaEngine>> = OnceLock::new();
    ENGINE.get_or_init(|| engine_from(other_pair())).clone()
}

pub(crate) fn wide_engine() -> Arc<RsaEngine> {
    static ENGINE: OnceLock<Arc<RsaEngine>> = OnceLock::new();
    ENGINE
        .get_or_init(|| engine_from(&pair(2048, None)))
        .clone()
}

pub(crate) fn cipher() -> Arc<SymmetricCipher> {
    static CIPHER: OnceLock<Arc<SymmetricCipher>> = OnceLock::new();
    CIPHER
        .get_or_init(|| Arc::new(SymmetricCipher::new(&[7u8; 32], &[9u8; 12]).expect("cipher")))
        .clone()
}

/// Same IV as [`cipher`], different key.
pub(crate) fn other_cipher() -> Arc<SymmetricCipher> {
    static CIPHER: OnceLock<Arc<SymmetricCipher>> = OnceLock::new();
    CIPHER
        .get_or_init(|| Arc::new(SymmetricCipher::new(&[8u8; 32], &[9u8; 12]).expect("cipher")))
        .clone()
}
