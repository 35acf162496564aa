//! Typed asymmetric column codecs.
//!
//! A codec is an [`AsymmetricCodec`] over a [`CanonicalForm`]: the form projects
//! a typed value to and from its canonical string, the shared [`RsaEngine`]
//! does the cryptography. One engine serves every form.
//!
//! ```text
//! write: value ─to_canonical─▶ UTF-8 ─RSA PKCS#1 v1.5─▶ Base64 ─▶ column
//! read:  column ─Base64─▶ RSA ─▶ UTF-8 ─from_canonical─▶ value
//! ```

pub mod forms;

pub use forms::{DateTimeForm, DecimalForm, LongDateForm, OptionalTextForm, TextForm};

use std::str::FromStr;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::crypto::{RsaEngine, RsaError};

/// A canonical string that does not parse back into its typed value.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CanonicalError(pub String);

/// Why a stored value could not be turned back into a typed value.
#[derive(Debug, Error)]
pub enum DecryptionFailure {
    #[error("stored value is not valid base64")]
    InvalidBase64,

    /// Padding check failed: corrupted storage or a different key pair.
    #[error("rsa padding check failed")]
    Rsa,

    /// AES-GCM-SIV authentication failed.
    #[error("symmetric authentication failed")]
    Symmetric,

    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,

    #[error("canonical form rejected: {0}")]
    Canonical(#[from] CanonicalError),

    /// The stored JSON value is not a string.
    #[error("stored value is not text")]
    NotText,
}

/// Errors produced by column codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The canonical form is longer than the key allows. Caller error; not retried.
    #[error("canonical form is {len} bytes; the key allows at most {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("encryption failed")]
    Encryption,

    /// Stored data could not be read. Never replaced by a default value.
    #[error("decryption failed: {0}")]
    Decryption(#[from] DecryptionFailure),

    /// The JSON value does not have the shape the codec expects.
    #[error("invalid value: expected {0}")]
    InvalidValue(&'static str),
}

impl From<RsaError> for CodecError {
    fn from(err: RsaError) -> Self {
        match err {
            RsaError::PayloadTooLarge { len, max } => CodecError::PayloadTooLarge { len, max },
            RsaError::Encryption => CodecError::Encryption,
            RsaError::InvalidBase64 => DecryptionFailure::InvalidBase64.into(),
            RsaError::Decryption => DecryptionFailure::Rsa.into(),
        }
    }
}

/// Projection between a typed value and the string that gets encrypted.
///
/// Implementations must be lossless for the precision their callers need:
/// `from_canonical(to_canonical(v)) == v`.
pub trait CanonicalForm: Send + Sync {
    type Value;

    /// Short name used in errors and logs.
    fn name(&self) -> &'static str;

    fn to_canonical(&self, value: &Self::Value) -> String;

    fn from_canonical(&self, canonical: &str) -> Result<Self::Value, CanonicalError>;

    /// The string two values are compared by when checking for duplicates.
    /// Equal keys mean the values are the same as far as storage is concerned.
    fn comparison_key(&self, value: &Self::Value) -> String {
        self.to_canonical(value)
    }
}

/// Generic encode/decode over one canonical form and the shared RSA engine.
#[derive(Debug, Clone)]
pub struct AsymmetricCodec<F> {
    engine: Arc<RsaEngine>,
    form: F,
}

pub type TextCodec = AsymmetricCodec<TextForm>;
pub type OptionalTextCodec = AsymmetricCodec<OptionalTextForm>;
pub type DecimalCodec = AsymmetricCodec<DecimalForm>;
pub type DateTimeCodec = AsymmetricCodec<DateTimeForm>;
pub type LongDateCodec = AsymmetricCodec<LongDateForm>;

impl<F: CanonicalForm> AsymmetricCodec<F> {
    pub fn new(engine: Arc<RsaEngine>, form: F) -> Self {
        Self { engine, form }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    /// Largest canonical form, in UTF-8 bytes, this codec can store.
    pub fn max_plaintext_len(&self) -> usize {
        self.engine.max_plaintext_len()
    }

    /// Project `value` to its canonical string, encrypt it, and return Base64.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLarge`] when the canonical form exceeds
    /// [`AsymmetricCodec::max_plaintext_len`].
    pub fn encode(&self, value: &F::Value) -> Result<String, CodecError> {
        let canonical = self.form.to_canonical(value);
        Ok(self.engine.encrypt(canonical.as_bytes())?)
    }

    /// Decrypt Base64 `stored` and parse its canonical string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decryption`] for malformed Base64, a padding
    /// failure (including ciphertext from another key pair), non-UTF-8
    /// plaintext, or a canonical string the form rejects.
    pub fn decode(&self, stored: &str) -> Result<F::Value, CodecError> {
        let plaintext = self.engine.decrypt(stored)?;
        let canonical = String::from_utf8(plaintext).map_err(|_| DecryptionFailure::InvalidUtf8)?;
        let value = self
            .form
            .from_canonical(&canonical)
            .map_err(DecryptionFailure::from)?;
        Ok(value)
    }
}

/// Object-safe codec over JSON column values, used by the column registry.
///
/// Typed values travel in their natural `serde` JSON shape (a decimal as
/// `"12.50"`, a timestamp as RFC 3339 text). Stored values are JSON strings.
pub trait JsonFieldCodec: Send + Sync + std::fmt::Debug {
    /// Short name of the underlying canonical form.
    fn name(&self) -> &'static str;

    fn seal(&self, value: &serde_json::Value) -> Result<serde_json::Value, CodecError>;

    fn open(&self, stored: &serde_json::Value) -> Result<serde_json::Value, CodecError>;

    /// The form plaintext `value` is compared by, without encrypting it.
    ///
    /// `null` stays `null`. Anything else becomes the canonical form's
    /// comparison key, so `"12.5"` and `12.5` agree, and so do two spellings
    /// of the same instant.
    fn comparable(&self, value: &serde_json::Value) -> Result<serde_json::Value, CodecError>;
}

impl<F> JsonFieldCodec for AsymmetricCodec<F>
where
    F: CanonicalForm + std::fmt::Debug,
    F::Value: Serialize + DeserializeOwned,
{
    fn name(&self) -> &'static str {
        self.form.name()
    }

    fn seal(&self, value: &serde_json::Value) -> Result<serde_json::Value, CodecError> {
        // serde messages can echo the input; report only the expected shape.
        let typed: F::Value = serde_json::from_value(value.clone())
            .map_err(|_| CodecError::InvalidValue(self.form.name()))?;
        Ok(serde_json::Value::String(self.encode(&typed)?))
    }

    fn open(&self, stored: &serde_json::Value) -> Result<serde_json::Value, CodecError> {
        let stored = stored.as_str().ok_or(DecryptionFailure::NotText)?;
        let typed = self.decode(stored)?;
        serde_json::to_value(&typed).map_err(|_| CodecError::InvalidValue(self.form.name()))
    }

    fn comparable(&self, value: &serde_json::Value) -> Result<serde_json::Value, CodecError> {
        if value.is_null() {
            return Ok(serde_json::Value::Null);
        }
        let typed: F::Value = serde_json::from_value(value.clone())
            .map_err(|_| CodecError::InvalidValue(self.form.name()))?;
        Ok(serde_json::Value::String(self.form.comparison_key(&typed)))
    }
}

/// The codec kinds a column can be annotated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Text,
    OptionalText,
    Decimal { scale: Option<u32> },
    DateTime,
    Date,
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(CodecKind::Text),
            "optional-text" => Ok(CodecKind::OptionalText),
            "decimal" => Ok(CodecKind::Decimal { scale: None }),
            "datetime" => Ok(CodecKind::DateTime),
            "date" => Ok(CodecKind::Date),
            other => Err(format!("unknown codec {other:?}")),
        }
    }
}

/// Codec instances built once over one engine and shared across columns.
#[derive(Debug, Clone)]
pub struct CodecSet {
    engine: Arc<RsaEngine>,
    text: Arc<dyn JsonFieldCodec>,
    optional_text: Arc<dyn JsonFieldCodec>,
    decimal: Arc<dyn JsonFieldCodec>,
    datetime: Arc<dyn JsonFieldCodec>,
    date: Arc<dyn JsonFieldCodec>,
}

impl CodecSet {
    pub fn new(engine: Arc<RsaEngine>) -> Self {
        Self {
            text: Arc::new(TextCodec::new(engine.clone(), TextForm)),
            optional_text: Arc::new(OptionalTextCodec::new(engine.clone(), OptionalTextForm)),
            decimal: Arc::new(DecimalCodec::new(engine.clone(), DecimalForm::default())),
            datetime: Arc::new(DateTimeCodec::new(engine.clone(), DateTimeForm)),
            date: Arc::new(LongDateCodec::new(engine.clone(), LongDateForm)),
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<RsaEngine> {
        &self.engine
    }

    /// The codec for `kind`. Fixed-scale decimals get their own instance.
    pub fn codec_for(&self, kind: CodecKind) -> Arc<dyn JsonFieldCodec> {
        match kind {
            CodecKind::Text => self.text.clone(),
            CodecKind::OptionalText => self.optional_text.clone(),
            CodecKind::Decimal { scale: None } => self.decimal.clone(),
            CodecKind::Decimal { scale: Some(scale) } => Arc::new(DecimalCodec::new(
                self.engine.clone(),
                DecimalForm::with_scale(scale),
            )),
            CodecKind::DateTime => self.datetime.clone(),
            CodecKind::Date => self.date.clone(),
        }
    }
}
