//! Build - Translate a normalized parameter map into an API payload
//!
//! The builder walks the schema and assigns each supplied field into the
//! payload at its declared JSON pointer, transforming through the node's
//! builder function when one is set. Create builds start from an empty
//! object; update builds start from a deep copy of the current remote
//! spec so server-owned attributes survive untouched.

use serde_json::Value as Json;

use crate::schema::{ArgKind, ArgSchema, ObjectSchema};
use crate::value::{Params, Value};

/// Build error
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    #[error("cannot assign through non-object value at '{pointer}'")]
    PathConflict { pointer: String },

    #[error("builder for '{field}' failed: {message}")]
    Builder { field: String, message: String },

    #[error("list index '{token}' in '{pointer}' is out of range")]
    IndexOutOfRange { pointer: String, token: String },
}

impl BuildError {
    pub fn builder(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Builder {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Which payload is being produced. Lists append instead of replace only
/// during updates, and only for nodes marked `append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Create,
    Update,
}

/// A composable step for resources whose payload is assembled from
/// several sub-specs. Each step receives and returns the evolving
/// payload; the first error short-circuits the pipeline.
pub type SubBuilder = fn(&Params, Json) -> Result<Json, BuildError>;

/// Run an ordered sub-builder pipeline over a seed payload
pub fn run_pipeline(
    builders: &[SubBuilder],
    params: &Params,
    seed: Json,
) -> Result<Json, BuildError> {
    let mut payload = seed;
    for step in builders {
        payload = step(params, payload)?;
    }
    Ok(payload)
}

/// Build the outgoing payload for a schema and normalized parameter map.
///
/// `base` is the current remote spec for updates; `None` starts from an
/// empty object. Unset fields never reach the payload; an explicit null
/// is forwarded only for resettable nodes.
pub fn build_spec(
    schema: &ObjectSchema,
    params: &Params,
    base: Option<&Json>,
    mode: BuildMode,
) -> Result<Json, BuildError> {
    let mut payload = match base {
        Some(current) => current.clone(),
        None => Json::Object(serde_json::Map::new()),
    };

    let mut names: Vec<&String> = schema.fields.keys().collect();
    names.sort();

    for name in names {
        let field = &schema.fields[name.as_str()];
        let Some(pointer) = &field.bind else {
            // meta-parameter, not part of the payload
            continue;
        };
        let Some(value) = params.get(name.as_str()) else {
            continue;
        };

        if value.is_null() {
            if field.resettable {
                pointer_set(&mut payload, pointer, Json::Null)?;
            }
            continue;
        }

        // Empty list input emits no key unless the field is resettable
        if let Value::List(items) = value
            && items.is_empty()
            && !field.resettable
        {
            continue;
        }

        let built = field_value(field, value)?;

        if field.append && mode == BuildMode::Update {
            let existing = payload.pointer(pointer).and_then(|v| v.as_array()).cloned();
            if let (Some(mut merged), Json::Array(new_items)) = (existing, &built) {
                merged.extend(new_items.iter().cloned());
                pointer_set(&mut payload, pointer, Json::Array(merged))?;
                continue;
            }
        }

        pointer_set(&mut payload, pointer, built)?;
    }

    Ok(payload)
}

/// Produce the payload value for a single field
fn field_value(field: &ArgSchema, value: &Value) -> Result<Json, BuildError> {
    if let Some(f) = field.build_with {
        return f(value);
    }

    match (&field.kind, value) {
        (ArgKind::Map(inner), Value::Map(map)) => build_element(inner, map),
        (ArgKind::Seq(elem), Value::List(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(element_value(elem, item)?);
            }
            Ok(Json::Array(out))
        }
        _ => Ok(value.to_json()),
    }
}

fn element_value(elem: &ArgSchema, item: &Value) -> Result<Json, BuildError> {
    if let Some(f) = elem.build_with {
        return f(item);
    }
    match (&elem.kind, item) {
        (ArgKind::Map(inner), Value::Map(map)) => build_element(inner, map),
        _ => Ok(item.to_json()),
    }
}

/// Assemble a nested object from an element schema. Element binds are
/// pointers relative to the element root (e.g. `/prefixLength`); fields
/// without a bind are dropped.
fn build_element(
    schema: &ObjectSchema,
    map: &std::collections::HashMap<String, Value>,
) -> Result<Json, BuildError> {
    let mut out = Json::Object(serde_json::Map::new());
    let mut names: Vec<&String> = schema.fields.keys().collect();
    names.sort();
    for name in names {
        let field = &schema.fields[name.as_str()];
        let Some(pointer) = &field.bind else {
            continue;
        };
        let Some(value) = map.get(name.as_str()) else {
            continue;
        };
        if value.is_null() && !field.resettable {
            continue;
        }
        let built = field_value(field, value)?;
        pointer_set(&mut out, pointer, built)?;
    }
    Ok(out)
}

/// Assign `value` at `pointer`, creating intermediate objects lazily.
/// A numeric token indexes an existing array (or extends it by one).
pub fn pointer_set(doc: &mut Json, pointer: &str, value: Json) -> Result<(), BuildError> {
    let tokens: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();

    if tokens.is_empty() {
        *doc = value;
        return Ok(());
    }

    let mut cursor = doc;
    for (i, token) in tokens.iter().enumerate() {
        let last = i == tokens.len() - 1;
        match cursor {
            Json::Object(map) => {
                if last {
                    map.insert(token.clone(), value);
                    return Ok(());
                }
                cursor = map
                    .entry(token.clone())
                    .or_insert_with(|| Json::Object(serde_json::Map::new()));
            }
            Json::Array(items) => {
                let index: usize = token.parse().map_err(|_| BuildError::PathConflict {
                    pointer: pointer.to_string(),
                })?;
                if index > items.len() {
                    return Err(BuildError::IndexOutOfRange {
                        pointer: pointer.to_string(),
                        token: token.clone(),
                    });
                }
                if index == items.len() {
                    items.push(Json::Object(serde_json::Map::new()));
                }
                if last {
                    items[index] = value;
                    return Ok(());
                }
                cursor = &mut items[index];
            }
            Json::Null => {
                *cursor = Json::Object(serde_json::Map::new());
                if let Json::Object(map) = cursor {
                    if last {
                        map.insert(token.clone(), value);
                        return Ok(());
                    }
                    cursor = map
                        .entry(token.clone())
                        .or_insert_with(|| Json::Object(serde_json::Map::new()));
                } else {
                    unreachable!()
                }
            }
            _ => {
                return Err(BuildError::PathConflict {
                    pointer: pointer.to_string(),
                });
            }
        }
    }

    Ok(())
}
