//! Entity column schemas: which properties are encrypted, and how.
//!
//! # Responsibilities
//!
//! - Load an OpenAPI-style YAML or JSON document from disk.
//! - Walk `components.schemas` and turn property annotations into a
//!   [`ColumnPlan`] the registry is built from.
//!
//! # Annotations
//!
//! ```yaml
//! components:
//!   schemas:
//!     User:
//!       type: object
//!       x-unique: [[username, email]]
//!       x-case-insensitive: true
//!       properties:
//!         username: { type: string, x-encrypted: true }        # symmetric path
//!         email:    { type: string, x-codec: text }            # asymmetric path
//!         balance:  { type: string, x-codec: decimal, x-scale: 2 }
//! ```
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** This module never touches keys or ciphers.

pub mod resolver;

pub use resolver::resolve_columns;

use std::path::{Path, PathBuf};

use openapiv3::OpenAPI;
use thiserror::Error;
use tracing::info;

use crate::codec::CodecKind;

/// Errors from schema loading and resolution.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema file {}: not valid YAML or JSON", path.display())]
    Parse { path: PathBuf },

    /// A property or entity annotation is contradictory or unknown.
    #[error("{entity}.{column}: {reason}")]
    Annotation {
        entity: String,
        column: String,
        reason: String,
    },
}

/// Encryption path declared for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `x-encrypted: true`
    Symmetric,
    /// `x-codec: <kind>`
    Asymmetric(CodecKind),
}

/// One encrypted property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub entity: String,
    pub column: String,
    pub kind: ColumnKind,
}

/// One `x-unique` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueSpec {
    pub entity: String,
    pub columns: Vec<String>,
    pub case_insensitive: bool,
}

/// Everything the registry needs to know about a schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPlan {
    pub columns: Vec<ColumnSpec>,
    pub unique: Vec<UniqueSpec>,
}

/// Read and parse a schema document, trying YAML first and then JSON.
pub fn load_file(path: &Path) -> Result<OpenAPI, SchemaError> {
    let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_owned(),
        source,
    })?;

    let api: OpenAPI = if let Ok(parsed) = serde_yaml::from_str(&text) {
        parsed
    } else if let Ok(parsed) = serde_json::from_str(&text) {
        parsed
    } else {
        return Err(SchemaError::Parse {
            path: path.to_owned(),
        });
    };

    info!(path = %path.display(), "loaded column schema");
    Ok(api)
}

/// Load a schema document and resolve its column plan.
pub fn load_plan(path: &Path) -> Result<ColumnPlan, SchemaError> {
    let api = load_file(path)?;
    let plan = resolve_columns(&api)?;
    info!(
        columns = plan.columns.len(),
        unique = plan.unique.len(),
        "column plan resolved"
    );
    Ok(plan)
}
