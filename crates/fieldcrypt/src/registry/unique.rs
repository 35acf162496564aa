//! Uniqueness and lookup over encrypted columns.
//!
//! Asymmetric ciphertext is randomized, so a storage index over it can never
//! see two equal plaintexts. Uniqueness is therefore enforced here: stored rows
//! are opened and compared on their decrypted values. This costs one
//! decryption per stored row and column, which bounds it to modest tables.
//!
//! Both sides are compared in the form each column's codec compares by, so a
//! decimal written as `12.5` matches one stored as `12.50`, and a timestamp
//! written with an offset matches the same instant stored in UTC.

use serde_json::Value;

use super::{ColumnCodec, ColumnRegistry, RegistryError};

/// How decrypted values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    /// Strings compare after Unicode lowercasing (usernames, emails).
    CaseInsensitive,
}

/// A set of columns whose combined values must be unique within an entity.
#[derive(Debug, Clone)]
pub struct UniqueConstraint {
    columns: Vec<String>,
    mode: MatchMode,
}

impl UniqueConstraint {
    pub(super) fn new<S: AsRef<str>>(
        entity: &str,
        columns: &[S],
        mode: MatchMode,
    ) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidConstraint {
            entity: entity.to_owned(),
            reason: reason.to_owned(),
        };
        if columns.is_empty() {
            return Err(invalid("no columns"));
        }
        let mut names: Vec<String> = Vec::with_capacity(columns.len());
        for column in columns {
            let column = column.as_ref();
            if names.iter().any(|c| c == column) {
                return Err(invalid("column listed twice"));
            }
            names.push(column.to_owned());
        }
        Ok(Self {
            columns: names,
            mode,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// The normalised key of a plaintext row, or `None` when any column is
    /// missing or null (nulls never collide).
    fn key(&self, row: &Value) -> Option<Vec<Value>> {
        self.columns
            .iter()
            .map(|c| match row.get(c) {
                None | Some(Value::Null) => None,
                Some(v) => Some(normalise(v, self.mode)),
            })
            .collect()
    }
}

fn normalise(value: &Value, mode: MatchMode) -> Value {
    match (value, mode) {
        (Value::String(s), MatchMode::CaseInsensitive) => Value::String(s.to_lowercase()),
        _ => value.clone(),
    }
}

impl ColumnRegistry {
    /// Unique constraints declared for `entity`.
    pub fn unique_constraints(&self, entity: &str) -> &[UniqueConstraint] {
        self.entities
            .get(entity)
            .map(|e| e.unique.as_slice())
            .unwrap_or_default()
    }

    /// Check a plaintext `candidate` row against sealed `stored_rows`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] naming the first violated
    /// constraint, or a column error if a stored row cannot be opened.
    pub fn check_unique(
        &self,
        entity: &str,
        stored_rows: &[Value],
        candidate: &Value,
    ) -> Result<(), RegistryError> {
        let constraints = &self.entity(entity)?.unique;
        if constraints.is_empty() {
            return Ok(());
        }

        let candidate = self.comparable_row(entity, candidate)?;
        let wanted: Vec<_> = constraints.iter().map(|c| c.key(&candidate)).collect();
        if wanted.iter().all(Option::is_none) {
            return Ok(());
        }

        for stored in stored_rows {
            let opened = self.comparable_row(entity, &self.opened(entity, stored)?)?;
            for (constraint, key) in constraints.iter().zip(&wanted) {
                let Some(key) = key else { continue };
                if constraint.key(&opened).as_ref() == Some(key) {
                    return Err(RegistryError::Duplicate {
                        entity: entity.to_owned(),
                        columns: constraint.columns.join(", "),
                    });
                }
            }
        }
        Ok(())
    }

    /// Indices of sealed `stored_rows` whose decrypted `column` matches `needle`.
    ///
    /// # Errors
    ///
    /// Returns a column error if `needle` has the wrong shape for the column's
    /// codec or a stored row cannot be opened.
    pub fn lookup(
        &self,
        entity: &str,
        stored_rows: &[Value],
        column: &str,
        needle: &Value,
        mode: MatchMode,
    ) -> Result<Vec<usize>, RegistryError> {
        let needle = normalise(&self.comparable(entity, column, needle)?, mode);
        let mut hits = Vec::new();
        for (index, stored) in stored_rows.iter().enumerate() {
            let opened = self.opened(entity, stored)?;
            let Some(value) = opened.get(column) else {
                continue;
            };
            if normalise(&self.comparable(entity, column, value)?, mode) == needle {
                hits.push(index);
            }
        }
        Ok(hits)
    }

    /// `row` with every registered asymmetric column in comparable form.
    fn comparable_row(&self, entity: &str, row: &Value) -> Result<Value, RegistryError> {
        let mut row = row.clone();
        let Some(map) = row.as_object_mut() else {
            return Err(RegistryError::NotAnObject(entity.to_owned()));
        };
        for (column, value) in map.iter_mut() {
            *value = self.comparable(entity, column, value)?;
        }
        Ok(row)
    }

    /// Symmetric and unregistered columns hold plain strings and compare as-is.
    fn comparable(
        &self,
        entity: &str,
        column: &str,
        value: &Value,
    ) -> Result<Value, RegistryError> {
        match self.column(entity, column) {
            Some(ColumnCodec::Asymmetric(codec)) => {
                codec.comparable(value).map_err(|source| RegistryError::Column {
                    entity: entity.to_owned(),
                    column: column.to_owned(),
                    source,
                })
            }
            _ => Ok(value.clone()),
        }
    }

    fn opened(&self, entity: &str, stored: &Value) -> Result<Value, RegistryError> {
        let mut row = stored.clone();
        self.open_row(entity, &mut row)?;
        Ok(row)
    }
}
