//! Line protocol spoken by the `fieldcrypt` binary.
//!
//! Each stdin line is one [`RowRequest`]; each stdout line is one
//! [`RowResponse`]. Failures are reported as [`ErrorResponse`] lines on stderr.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One entity row to seal (encrypt) or open (decrypt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRequest {
    /// Entity name as declared under `components.schemas` in the column schema.
    pub entity: String,
    /// Column values keyed by property name.
    pub row: serde_json::Value,
}

/// The transformed row.
///
/// Mirrors the input structure with registered columns replaced by their
/// stored (Base64) or decoded form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowResponse {
    pub entity: String,
    pub row: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Error line written for a row that could not be processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"decryption_failed"`).
    pub code: String,
    /// Human-readable description. Never contains plaintext or key material.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::FieldError> for ErrorResponse {
    fn from(err: &crate::FieldError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}
