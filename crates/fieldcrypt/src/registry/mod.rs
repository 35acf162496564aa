//! Column registration and transparent row sealing.
//!
//! The persistence layer registers exactly one encryption path per entity
//! property, then calls [`ColumnRegistry::seal_row`] before every write and
//! [`ColumnRegistry::open_row`] after every read. Business code only ever sees
//! plaintext rows.
//!
//! # Module invariants
//!
//! - A property is registered at most once, so the asymmetric and symmetric
//!   paths can never both apply to it.
//! - A failure on any column fails the whole row; nothing is replaced by a
//!   default or `null`.

pub mod unique;

pub use unique::{MatchMode, UniqueConstraint};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::codec::{CodecError, CodecSet, DecryptionFailure, JsonFieldCodec};
use crate::crypto::{CipherError, SymmetricCipher};
use crate::schema::{ColumnKind, ColumnPlan};

/// Errors from the column registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The property already has an encryption path.
    #[error("column {entity}.{column} is already registered")]
    AlreadyRegistered { entity: String, column: String },

    /// No columns or constraints were registered for the entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The row is not a JSON object.
    #[error("row for {0} is not a JSON object")]
    NotAnObject(String),

    /// A unique constraint names no columns or repeats one.
    #[error("invalid unique constraint on {entity}: {reason}")]
    InvalidConstraint { entity: String, reason: String },

    /// A registered column could not be sealed or opened.
    #[error("column {entity}.{column}: {source}")]
    Column {
        entity: String,
        column: String,
        #[source]
        source: CodecError,
    },

    /// A candidate row collides with a stored row on a unique constraint.
    #[error("duplicate value for unique columns {entity}({columns})")]
    Duplicate { entity: String, columns: String },
}

/// The encryption path registered for one property.
#[derive(Debug, Clone)]
pub enum ColumnCodec {
    /// Typed RSA codec with a custom canonical projection.
    Asymmetric(Arc<dyn JsonFieldCodec>),
    /// Annotation-driven AES-256-GCM-SIV over the value's own text.
    Symmetric,
}

impl ColumnCodec {
    fn name(&self) -> &'static str {
        match self {
            ColumnCodec::Asymmetric(codec) => codec.name(),
            ColumnCodec::Symmetric => "symmetric",
        }
    }
}

#[derive(Debug, Default)]
struct EntityColumns {
    columns: BTreeMap<String, ColumnCodec>,
    unique: Vec<UniqueConstraint>,
}

/// Registry of encrypted columns, keyed by entity and property name.
///
/// Built once at startup and then shared read-only.
#[derive(Debug)]
pub struct ColumnRegistry {
    symmetric: Arc<SymmetricCipher>,
    entities: HashMap<String, EntityColumns>,
}

impl ColumnRegistry {
    /// Create an empty registry. Symmetric columns use `symmetric`.
    pub fn new(symmetric: Arc<SymmetricCipher>) -> Self {
        Self {
            symmetric,
            entities: HashMap::new(),
        }
    }

    /// Build a registry from a resolved column plan.
    pub fn from_plan(
        plan: &ColumnPlan,
        codecs: &CodecSet,
        symmetric: Arc<SymmetricCipher>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(symmetric);
        for col in &plan.columns {
            let codec = match col.kind {
                ColumnKind::Symmetric => ColumnCodec::Symmetric,
                ColumnKind::Asymmetric(kind) => ColumnCodec::Asymmetric(codecs.codec_for(kind)),
            };
            registry.register(&col.entity, &col.column, codec)?;
        }
        for unique in &plan.unique {
            let mode = if unique.case_insensitive {
                MatchMode::CaseInsensitive
            } else {
                MatchMode::Exact
            };
            registry.declare_unique(&unique.entity, unique.columns.as_slice(), mode)?;
        }
        info!(
            entities = registry.entities.len(),
            columns = registry.column_count(),
            "column registry built"
        );
        Ok(registry)
    }

    /// Register the encryption path for `entity.column`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if the column already has one.
    pub fn register(
        &mut self,
        entity: &str,
        column: &str,
        codec: ColumnCodec,
    ) -> Result<(), RegistryError> {
        let columns = &mut self.entities.entry(entity.to_owned()).or_default().columns;
        if columns.contains_key(column) {
            return Err(RegistryError::AlreadyRegistered {
                entity: entity.to_owned(),
                column: column.to_owned(),
            });
        }
        debug!(entity, column, codec = codec.name(), "column registered");
        columns.insert(column.to_owned(), codec);
        Ok(())
    }

    /// Declare that `columns` of `entity` are unique together.
    ///
    /// Enforced by [`ColumnRegistry::check_unique`] on decrypted values.
    pub fn declare_unique<S: AsRef<str>>(
        &mut self,
        entity: &str,
        columns: &[S],
        mode: MatchMode,
    ) -> Result<(), RegistryError> {
        let constraint = UniqueConstraint::new(entity, columns, mode)?;
        self.entities
            .entry(entity.to_owned())
            .or_default()
            .unique
            .push(constraint);
        Ok(())
    }

    /// The path registered for `entity.column`, if any.
    pub fn column(&self, entity: &str, column: &str) -> Option<&ColumnCodec> {
        self.entities.get(entity)?.columns.get(column)
    }

    /// Registered column names of `entity`, sorted.
    pub fn columns(&self, entity: &str) -> Vec<&str> {
        self.entities
            .get(entity)
            .map(|e| e.columns.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Registered entity names, sorted.
    pub fn entities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn column_count(&self) -> usize {
        self.entities.values().map(|e| e.columns.len()).sum()
    }

    /// Encrypt every registered column of `row` in place.
    ///
    /// Columns absent from the row are left absent.
    pub fn seal_row(&self, entity: &str, row: &mut Value) -> Result<(), RegistryError> {
        self.transform_row(entity, row, Direction::Seal)
    }

    /// Decrypt every registered column of `row` in place.
    pub fn open_row(&self, entity: &str, row: &mut Value) -> Result<(), RegistryError> {
        self.transform_row(entity, row, Direction::Open)
    }

    fn entity(&self, entity: &str) -> Result<&EntityColumns, RegistryError> {
        self.entities
            .get(entity)
            .ok_or_else(|| RegistryError::UnknownEntity(entity.to_owned()))
    }

    fn transform_row(
        &self,
        entity: &str,
        row: &mut Value,
        direction: Direction,
    ) -> Result<(), RegistryError> {
        let columns = &self.entity(entity)?.columns;
        let map = row
            .as_object_mut()
            .ok_or_else(|| RegistryError::NotAnObject(entity.to_owned()))?;

        // Nothing is written back until every column has succeeded.
        let mut transformed = Vec::with_capacity(columns.len());
        for (column, codec) in columns {
            let Some(value) = map.get(column) else {
                continue;
            };
            let value = match direction {
                Direction::Seal => self.seal_value(codec, value),
                Direction::Open => self.open_value(codec, value),
            }
            .map_err(|source| RegistryError::Column {
                entity: entity.to_owned(),
                column: column.clone(),
                source,
            })?;
            transformed.push((column, value));
        }

        for (column, value) in transformed {
            map.insert(column.clone(), value);
        }
        Ok(())
    }

    fn seal_value(&self, codec: &ColumnCodec, value: &Value) -> Result<Value, CodecError> {
        match codec {
            ColumnCodec::Asymmetric(codec) => codec.seal(value),
            ColumnCodec::Symmetric => match value {
                Value::Null => Ok(Value::Null),
                Value::String(s) => self
                    .symmetric
                    .encrypt_str(s)
                    .map(Value::String)
                    .map_err(|_| CodecError::Encryption),
                _ => Err(CodecError::InvalidValue("text")),
            },
        }
    }

    fn open_value(&self, codec: &ColumnCodec, stored: &Value) -> Result<Value, CodecError> {
        match codec {
            ColumnCodec::Asymmetric(codec) => codec.open(stored),
            ColumnCodec::Symmetric => match stored {
                Value::Null => Ok(Value::Null),
                Value::String(s) => self
                    .symmetric
                    .decrypt_str(s)
                    .map(Value::String)
                    .map_err(|e| CodecError::Decryption(symmetric_failure(e))),
                _ => Err(DecryptionFailure::NotText.into()),
            },
        }
    }
}

fn symmetric_failure(err: CipherError) -> DecryptionFailure {
    match err {
        CipherError::InvalidFormat => DecryptionFailure::InvalidBase64,
        CipherError::InvalidUtf8 => DecryptionFailure::InvalidUtf8,
        _ => DecryptionFailure::Symmetric,
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Seal,
    Open,
}
