//! Column plan resolution from OpenAPI schemas.
//!
//! Every object schema under `components/schemas` is an entity; its top-level
//! properties are columns. Nested objects are not walked: a column is encrypted
//! as a whole value.

use openapiv3::{OpenAPI, ReferenceOr, Schema, SchemaData, SchemaKind, Type};
use serde_json::Value;

use super::{ColumnKind, ColumnPlan, ColumnSpec, SchemaError, UniqueSpec};
use crate::codec::CodecKind;

const X_ENCRYPTED: &str = "x-encrypted";
const X_CODEC: &str = "x-codec";
const X_SCALE: &str = "x-scale";
const X_UNIQUE: &str = "x-unique";
const X_CASE_INSENSITIVE: &str = "x-case-insensitive";

/// Largest scale a decimal column can carry.
const MAX_SCALE: u32 = 28;

/// Walk an [`OpenAPI`] document and collect encrypted columns and unique
/// constraints, in document order.
///
/// # Errors
///
/// Returns [`SchemaError::Annotation`] when a property carries both
/// `x-encrypted` and `x-codec`, names an unknown codec, or when `x-unique`
/// references a property the entity does not declare.
pub fn resolve_columns(api: &OpenAPI) -> Result<ColumnPlan, SchemaError> {
    let mut plan = ColumnPlan::default();

    let components = match &api.components {
        Some(c) => c,
        None => return Ok(plan),
    };

    for (entity, schema_ref) in &components.schemas {
        if let ReferenceOr::Item(schema) = schema_ref {
            resolve_entity(entity, schema, &mut plan)?;
        }
    }

    Ok(plan)
}

fn resolve_entity(entity: &str, schema: &Schema, plan: &mut ColumnPlan) -> Result<(), SchemaError> {
    let SchemaKind::Type(Type::Object(obj)) = &schema.schema_kind else {
        return Ok(());
    };

    for (column, prop_ref) in &obj.properties {
        let ReferenceOr::Item(prop) = prop_ref else {
            continue;
        };
        if let Some(kind) = column_kind(entity, column, &prop.schema_data)? {
            plan.columns.push(ColumnSpec {
                entity: entity.to_owned(),
                column: column.clone(),
                kind,
            });
        }
    }

    let extensions = &schema.schema_data.extensions;
    let case_insensitive = flag(extensions.get(X_CASE_INSENSITIVE));
    let Some(unique) = extensions.get(X_UNIQUE) else {
        return Ok(());
    };
    let annotation = |reason: String| SchemaError::Annotation {
        entity: entity.to_owned(),
        column: X_UNIQUE.to_owned(),
        reason,
    };
    let groups = unique
        .as_array()
        .ok_or_else(|| annotation("expected a list of column lists".into()))?;

    for group in groups {
        let columns: Vec<String> = group
            .as_array()
            .ok_or_else(|| annotation("expected a list of column names".into()))?
            .iter()
            .map(|c| {
                c.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| annotation("column names must be strings".into()))
            })
            .collect::<Result<_, _>>()?;
        if let Some(missing) = columns.iter().find(|c| !obj.properties.contains_key(*c)) {
            return Err(annotation(format!("unknown property {missing:?}")));
        }
        plan.unique.push(UniqueSpec {
            entity: entity.to_owned(),
            columns,
            case_insensitive,
        });
    }
    Ok(())
}

/// The path declared by one property's extensions, if any.
fn column_kind(
    entity: &str,
    column: &str,
    data: &SchemaData,
) -> Result<Option<ColumnKind>, SchemaError> {
    let annotation = |reason: String| SchemaError::Annotation {
        entity: entity.to_owned(),
        column: column.to_owned(),
        reason,
    };

    let extensions = &data.extensions;
    let encrypted = flag(extensions.get(X_ENCRYPTED));
    let codec = extensions.get(X_CODEC);
    let scale = extensions.get(X_SCALE);

    match (encrypted, codec) {
        (true, Some(_)) => Err(annotation(format!(
            "{X_ENCRYPTED} and {X_CODEC} are mutually exclusive"
        ))),
        (true, None) => {
            if scale.is_some() {
                return Err(annotation(format!("{X_SCALE} requires {X_CODEC}: decimal")));
            }
            Ok(Some(ColumnKind::Symmetric))
        }
        (false, Some(codec)) => {
            let name = codec
                .as_str()
                .ok_or_else(|| annotation(format!("{X_CODEC} must be a string")))?;
            let kind: CodecKind = name.parse().map_err(annotation)?;
            let kind = match (kind, scale) {
                (CodecKind::Decimal { .. }, Some(scale)) => {
                    let scale = scale
                        .as_u64()
                        .and_then(|s| u32::try_from(s).ok())
                        .filter(|s| *s <= MAX_SCALE)
                        .ok_or_else(|| annotation(format!("invalid {X_SCALE}: {scale}")))?;
                    CodecKind::Decimal { scale: Some(scale) }
                }
                (_, Some(_)) => {
                    return Err(annotation(format!("{X_SCALE} requires {X_CODEC}: decimal")))
                }
                (kind, None) => kind,
            };
            Ok(Some(ColumnKind::Asymmetric(kind)))
        }
        (false, None) => Ok(None),
    }
}

fn flag(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}
