//! Error classification and the JSON line protocol shared across `fieldcrypt` crates.

pub mod error;
pub mod protocol;

pub use error::{Disposition, FieldError};
