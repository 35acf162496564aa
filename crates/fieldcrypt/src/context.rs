//! Composition root for the encryption subsystem.
//!
//! [`CryptoContext::init`] runs once at startup and owns everything that is
//! shared afterwards: the RSA engine, the symmetric cipher, the codec set and
//! the column registry. Every piece is immutable after construction.

use std::sync::Arc;

use common::FieldError;
use tracing::info;

use crate::codec::CodecSet;
use crate::config::EncryptionSettings;
use crate::crypto::{RsaEngine, SymmetricCipher};
use crate::keys::KeyMaterial;
use crate::registry::ColumnRegistry;
use crate::schema;

/// Loaded keys, codecs and column registry.
#[derive(Debug)]
pub struct CryptoContext {
    engine: Arc<RsaEngine>,
    symmetric: Arc<SymmetricCipher>,
    codecs: CodecSet,
    registry: ColumnRegistry,
}

impl CryptoContext {
    /// Load key material, build the ciphers, and register the columns declared
    /// by `settings.schema_path` (none when unset).
    ///
    /// # Errors
    ///
    /// Every error is fatal: the process must not serve without its keys.
    pub fn init(settings: &EncryptionSettings) -> Result<Self, FieldError> {
        let keys = KeyMaterial::load(settings)?;
        let engine = Arc::new(RsaEngine::new(keys));

        let symmetric = Arc::new(SymmetricCipher::new(
            settings.symmetric_key.expose(),
            settings.symmetric_iv.expose(),
        )?);

        let codecs = CodecSet::new(engine.clone());

        let registry = match &settings.schema_path {
            Some(path) => {
                let plan = schema::load_plan(path)?;
                ColumnRegistry::from_plan(&plan, &codecs, symmetric.clone())?
            }
            None => ColumnRegistry::new(symmetric.clone()),
        };

        info!(
            fingerprint = engine.fingerprint(),
            max_plaintext_len = engine.max_plaintext_len(),
            entities = registry.entities().len(),
            "crypto context ready"
        );

        Ok(Self {
            engine,
            symmetric,
            codecs,
            registry,
        })
    }

    /// Assemble a context from already-built parts.
    pub fn from_parts(
        engine: Arc<RsaEngine>,
        symmetric: Arc<SymmetricCipher>,
        registry: ColumnRegistry,
    ) -> Self {
        Self {
            codecs: CodecSet::new(engine.clone()),
            engine,
            symmetric,
            registry,
        }
    }

    pub fn engine(&self) -> &Arc<RsaEngine> {
        &self.engine
    }

    pub fn symmetric(&self) -> &Arc<SymmetricCipher> {
        &self.symmetric
    }

    pub fn codecs(&self) -> &CodecSet {
        &self.codecs
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    /// Mutable registry access for programmatic registration before sharing.
    pub fn registry_mut(&mut self) -> &mut ColumnRegistry {
        &mut self.registry
    }
}
