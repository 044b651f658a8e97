//! Validate - Normalize a parameter map against a schema
//!
//! The validator applies, in order: top-level null stripping, environment
//! fallbacks, defaults, scalar coercion, unknown-key rejection, constraint
//! checks, then recursion into sub-schemas. It never performs network or
//! file I/O (environment variables are the one ambient input) and is
//! deterministic: the same input always yields the same normalized map or
//! the same error.

use crate::schema::{ArgKind, ArgSchema, ObjectSchema};
use crate::value::{Params, Value};

/// Validation error, carrying the offending path and rule
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("'{path}' is required")]
    MissingRequired { path: String },

    #[error("unknown argument '{path}'")]
    UnknownField { path: String },

    #[error("'{path}': expected {expected}, got {got}")]
    TypeMismatch {
        path: String,
        expected: String,
        got: String,
    },

    #[error("'{path}': value '{value}' is not one of: {}", choices.join(", "))]
    InvalidChoice {
        path: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("arguments {} are mutually exclusive", fields.join(", "))]
    MutuallyExclusive { fields: Vec<String> },

    #[error("arguments {} are required together", fields.join(", "))]
    RequiredTogether { fields: Vec<String> },

    #[error("one of {} is required", fields.join(", "))]
    RequiredOneOf { fields: Vec<String> },

    #[error("'{path}' is required when '{field}' is '{value}'")]
    RequiredIf {
        path: String,
        field: String,
        value: String,
    },
}

/// Normalize a parameter map against a schema root.
///
/// The input map is read-only; normalization returns a new map with
/// fallbacks and defaults applied and scalars coerced.
pub fn normalize(params: &Params, schema: &ObjectSchema) -> Result<Params, ValidationError> {
    normalize_level(params, schema, "", true)
}

fn normalize_level(
    params: &Params,
    schema: &ObjectSchema,
    prefix: &str,
    top_level: bool,
) -> Result<Params, ValidationError> {
    let mut out = Params::new();

    // Null and unset are the same thing at this layer, except where the
    // schema marks the field resettable.
    for (key, value) in params {
        if value.is_null() {
            let resettable = schema
                .fields
                .get(key)
                .map(|f| f.resettable)
                .unwrap_or(false);
            if !resettable {
                continue;
            }
        }
        out.insert(key.clone(), value.clone());
    }

    if top_level {
        let mut keys: Vec<&String> = out.keys().collect();
        keys.sort();
        for key in keys {
            if !schema.fields.contains_key(key.as_str()) {
                return Err(ValidationError::UnknownField {
                    path: join_path(prefix, key),
                });
            }
        }
    }

    let mut names: Vec<&String> = schema.fields.keys().collect();
    names.sort();

    for name in names {
        let field = &schema.fields[name.as_str()];
        let path = join_path(prefix, name);

        if !out.contains_key(name.as_str()) {
            for var in &field.fallback {
                if let Ok(value) = std::env::var(var) {
                    out.insert(name.to_string(), Value::String(value));
                    break;
                }
            }
        }

        if !out.contains_key(name.as_str())
            && let Some(default) = &field.default
        {
            out.insert(name.to_string(), default.clone());
        }

        match out.get(name.as_str()) {
            Some(value) if value.is_null() => {
                // resettable null, carried through as-is
            }
            Some(value) => {
                let coerced = coerce(value, &field.kind, &path)?;
                check_choices(&coerced, field, &path)?;
                let finished = descend(coerced, field, &path)?;
                out.insert(name.to_string(), finished);
            }
            None => {
                if field.required {
                    return Err(ValidationError::MissingRequired { path });
                }
            }
        }
    }

    check_constraints(&out, schema, prefix)?;

    Ok(out)
}

/// Coerce a scalar into the schema's type where a safe conversion exists
fn coerce(value: &Value, kind: &ArgKind, path: &str) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        path: path.to_string(),
        expected: kind.to_string(),
        got: value.type_name().to_string(),
    };

    match (kind, value) {
        (ArgKind::Opaque, _) => Ok(value.clone()),
        (ArgKind::Str, Value::String(_)) => Ok(value.clone()),
        (ArgKind::Str, Value::Int(n)) => Ok(Value::String(n.to_string())),
        (ArgKind::Str, Value::Float(f)) => Ok(Value::String(f.to_string())),
        (ArgKind::Str, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (ArgKind::Int, Value::Int(_)) => Ok(value.clone()),
        (ArgKind::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| mismatch()),
        (ArgKind::Float, Value::Float(_)) => Ok(value.clone()),
        (ArgKind::Float, Value::Int(n)) => Ok(Value::Float(*n as f64)),
        (ArgKind::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch()),
        (ArgKind::Bool, Value::Bool(_)) => Ok(value.clone()),
        (ArgKind::Bool, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        (ArgKind::Seq(_), Value::List(_)) => Ok(value.clone()),
        (ArgKind::Map(_), Value::Map(_)) => Ok(value.clone()),
        _ => Err(mismatch()),
    }
}

fn check_choices(value: &Value, field: &ArgSchema, path: &str) -> Result<(), ValidationError> {
    if let Some(choices) = &field.choices
        && let Value::String(s) = value
        && !choices.iter().any(|c| c == s)
    {
        return Err(ValidationError::InvalidChoice {
            path: path.to_string(),
            value: s.clone(),
            choices: choices.clone(),
        });
    }
    Ok(())
}

/// Recurse into nested mappings and sequence elements
fn descend(value: Value, field: &ArgSchema, path: &str) -> Result<Value, ValidationError> {
    match (&field.kind, value) {
        (ArgKind::Map(inner), Value::Map(map)) => {
            let normalized = normalize_level(&map, inner, path, false)?;
            Ok(Value::Map(normalized))
        }
        (ArgKind::Seq(elem), Value::List(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                let coerced = coerce(&item, &elem.kind, &item_path)?;
                check_choices(&coerced, elem, &item_path)?;
                let finished = descend(coerced, elem, &item_path)?;
                out.push(finished);
            }
            Ok(Value::List(out))
        }
        (_, value) => Ok(value),
    }
}

fn check_constraints(
    params: &Params,
    schema: &ObjectSchema,
    prefix: &str,
) -> Result<(), ValidationError> {
    let supplied = |name: &str| params.get(name).map(|v| !v.is_null()).unwrap_or(false);

    for group in &schema.mutually_exclusive {
        let present: Vec<String> = group.iter().filter(|f| supplied(f)).cloned().collect();
        if present.len() > 1 {
            return Err(ValidationError::MutuallyExclusive { fields: present });
        }
    }

    for group in &schema.required_together {
        let present = group.iter().filter(|f| supplied(f)).count();
        if present > 0 && present < group.len() {
            return Err(ValidationError::RequiredTogether {
                fields: group.clone(),
            });
        }
    }

    for group in &schema.required_one_of {
        if !group.iter().any(|f| supplied(f)) {
            return Err(ValidationError::RequiredOneOf {
                fields: group.clone(),
            });
        }
    }

    for rule in &schema.required_if {
        let matched = params
            .get(&rule.field)
            .map(|v| *v == rule.equals)
            .unwrap_or(false);
        if matched {
            let mut missing: Vec<&String> =
                rule.requires.iter().filter(|f| !supplied(f)).collect();
            missing.sort();
            if let Some(first) = missing.first() {
                return Err(ValidationError::RequiredIf {
                    path: join_path(prefix, first),
                    field: rule.field.clone(),
                    value: display_value(&rule.equals),
                });
            }
        }
    }

    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ArgSchema;
    use crate::value::params_from_json;
    use serde_json::json;

    fn schema() -> ObjectSchema {
        ObjectSchema::new()
            .field(ArgSchema::new("name", ArgKind::Str).required())
            .field(ArgSchema::new("port", ArgKind::Int).with_default(Value::Int(9440)))
            .field(ArgSchema::new("validate_certs", ArgKind::Bool))
            .field(
                ArgSchema::new("state", ArgKind::Str)
                    .with_choices(["present", "absent"])
                    .with_default(Value::String("present".to_string())),
            )
    }

    #[test]
    fn nulls_are_stripped_at_top_level() {
        let params = params_from_json(&json!({"name": "g1", "validate_certs": null})).unwrap();
        let out = normalize(&params, &schema()).unwrap();
        assert!(!out.contains_key("validate_certs"));
    }

    #[test]
    fn resettable_null_is_preserved() {
        let s = ObjectSchema::new()
            .field(ArgSchema::new("tags", ArgKind::Opaque).resettable());
        let params = params_from_json(&json!({"tags": null})).unwrap();
        let out = normalize(&params, &s).unwrap();
        assert_eq!(out.get("tags"), Some(&Value::Null));
    }

    #[test]
    fn defaults_are_applied() {
        let params = params_from_json(&json!({"name": "g1"})).unwrap();
        let out = normalize(&params, &schema()).unwrap();
        assert_eq!(out.get("port"), Some(&Value::Int(9440)));
        assert_eq!(
            out.get("state"),
            Some(&Value::String("present".to_string()))
        );
    }

    #[test]
    fn env_fallback_fills_unset_field() {
        let s = ObjectSchema::new()
            .field(ArgSchema::new("host", ArgKind::Str).fallback(["VELA_TEST_HOST_FALLBACK"]));
        // SAFETY: var name is unique to this test
        unsafe { std::env::set_var("VELA_TEST_HOST_FALLBACK", "10.0.0.9") };
        let out = normalize(&Params::new(), &s).unwrap();
        unsafe { std::env::remove_var("VELA_TEST_HOST_FALLBACK") };
        assert_eq!(out.get("host"), Some(&Value::String("10.0.0.9".to_string())));
    }

    #[test]
    fn scalars_are_coerced() {
        let params =
            params_from_json(&json!({"name": "g1", "port": "9441", "validate_certs": "false"}))
                .unwrap();
        let out = normalize(&params, &schema()).unwrap();
        assert_eq!(out.get("port"), Some(&Value::Int(9441)));
        assert_eq!(out.get("validate_certs"), Some(&Value::Bool(false)));
    }

    #[test]
    fn bad_coercion_is_a_type_mismatch() {
        let params = params_from_json(&json!({"name": "g1", "port": "lots"})).unwrap();
        let err = normalize(&params, &schema()).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let params = params_from_json(&json!({"name": "g1", "nmae": "oops"})).unwrap();
        let err = normalize(&params, &schema()).unwrap_err();
        match err {
            ValidationError::UnknownField { path } => assert_eq!(path, "nmae"),
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn nested_unknown_keys_pass_through() {
        let inner = ObjectSchema::new().field(ArgSchema::new("value", ArgKind::Str));
        let s = ObjectSchema::new().field(ArgSchema::new("address", ArgKind::Map(inner)));
        let params =
            params_from_json(&json!({"address": {"value": "10.1.1.0", "extra": 1}})).unwrap();
        let out = normalize(&params, &s).unwrap();
        let address = out.get("address").unwrap().as_map().unwrap();
        assert!(address.contains_key("extra"));
    }

    #[test]
    fn choices_are_enforced() {
        let params = params_from_json(&json!({"name": "g1", "state": "paused"})).unwrap();
        let err = normalize(&params, &schema()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidChoice { .. }));
    }

    #[test]
    fn missing_required_field_fails() {
        let err = normalize(&Params::new(), &schema()).unwrap_err();
        match err {
            ValidationError::MissingRequired { path } => assert_eq!(path, "name"),
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn mutually_exclusive_fields_conflict() {
        let s = ObjectSchema::new()
            .field(ArgSchema::new("password", ArgKind::Str))
            .field(ArgSchema::new("api_key", ArgKind::Str))
            .mutually_exclusive(["password", "api_key"]);
        let params = params_from_json(&json!({"password": "x", "api_key": "y"})).unwrap();
        let err = normalize(&params, &s).unwrap_err();
        assert!(matches!(err, ValidationError::MutuallyExclusive { .. }));
    }

    #[test]
    fn required_together_needs_all() {
        let s = ObjectSchema::new()
            .field(ArgSchema::new("username", ArgKind::Str))
            .field(ArgSchema::new("password", ArgKind::Str))
            .required_together(["username", "password"]);
        let params = params_from_json(&json!({"username": "admin"})).unwrap();
        let err = normalize(&params, &s).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredTogether { .. }));
    }

    #[test]
    fn required_one_of_needs_any() {
        let s = ObjectSchema::new()
            .field(ArgSchema::new("name", ArgKind::Str))
            .field(ArgSchema::new("ext_id", ArgKind::Str))
            .required_one_of(["name", "ext_id"]);
        let err = normalize(&Params::new(), &s).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredOneOf { .. }));
    }

    #[test]
    fn required_if_triggers_on_match() {
        let s = ObjectSchema::new()
            .field(
                ArgSchema::new("state", ArgKind::Str)
                    .with_default(Value::String("absent".to_string())),
            )
            .field(ArgSchema::new("ext_id", ArgKind::Str))
            .required_if(
                "state",
                Value::String("absent".to_string()),
                vec!["ext_id".to_string()],
            );
        let err = normalize(&Params::new(), &s).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredIf { .. }));
    }

    #[test]
    fn sequence_elements_are_coerced_and_recursed() {
        let elem = ObjectSchema::new()
            .field(ArgSchema::new("value", ArgKind::Str).required())
            .field(ArgSchema::new("prefix_length", ArgKind::Int));
        let s = ObjectSchema::new().field(ArgSchema::new(
            "ipv4_addresses",
            ArgKind::Seq(Box::new(ArgSchema::new("", ArgKind::Map(elem)))),
        ));
        let params = params_from_json(
            &json!({"ipv4_addresses": [{"value": "10.1.1.0", "prefix_length": "24"}]}),
        )
        .unwrap();
        let out = normalize(&params, &s).unwrap();
        let items = out.get("ipv4_addresses").unwrap().as_list().unwrap();
        let first = items[0].as_map().unwrap();
        assert_eq!(first.get("prefix_length"), Some(&Value::Int(24)));
    }

    #[test]
    fn normalization_is_deterministic() {
        let params = params_from_json(&json!({"name": "g1", "port": "88"})).unwrap();
        let a = normalize(&params, &schema()).unwrap();
        let b = normalize(&params, &schema()).unwrap();
        assert_eq!(
            Value::Map(a).to_json(),
            Value::Map(b).to_json()
        );
    }
}
