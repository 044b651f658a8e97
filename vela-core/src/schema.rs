//! Schema - Argument schemas for resource kinds
//!
//! Each resource kind registers an `ObjectSchema` describing its
//! arguments: type, requiredness, defaults, enum choices, secrecy,
//! environment fallbacks, and the binding into the outgoing API payload.
//! Field-to-payload translation is data, not code: a node carries a JSON
//! pointer and optionally a named builder function.

use std::collections::HashMap;
use std::fmt;

use crate::build::BuildError;
use crate::value::Value;

/// A named builder function transforming a user value into a payload value
/// (e.g. duration-days to an ISO 8601 duration).
pub type BuilderFn = fn(&Value) -> Result<serde_json::Value, BuildError>;

/// Argument type
#[derive(Debug, Clone)]
pub enum ArgKind {
    Str,
    Int,
    Float,
    Bool,
    /// Ordered sequence with a uniform element schema
    Seq(Box<ArgSchema>),
    /// Nested mapping with its own field schemas and constraints
    Map(ObjectSchema),
    /// Passed through untouched; nested keys are not validated
    Opaque,
}

impl ArgKind {
    fn type_name(&self) -> String {
        match self {
            ArgKind::Str => "string".to_string(),
            ArgKind::Int => "int".to_string(),
            ArgKind::Float => "float".to_string(),
            ArgKind::Bool => "bool".to_string(),
            ArgKind::Seq(inner) => format!("list<{}>", inner.kind.type_name()),
            ArgKind::Map(_) => "map".to_string(),
            ArgKind::Opaque => "opaque".to_string(),
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Schema for one argument
#[derive(Debug, Clone)]
pub struct ArgSchema {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    pub default: Option<Value>,
    pub choices: Option<Vec<String>>,
    /// Secret: never echoed in results, errors or logs
    pub no_log: bool,
    /// Environment variable names consulted when the argument is unset
    pub fallback: Vec<String>,
    /// JSON pointer into the outgoing payload; `None` marks a meta-parameter
    pub bind: Option<String>,
    /// Optional transformation applied before assignment
    pub build_with: Option<BuilderFn>,
    /// Entity kind this argument references; the controller resolves
    /// `{name: ...}` into a canonical ID before the builder runs
    pub ref_kind: Option<String>,
    /// Merge list values into the current spec instead of replacing
    pub append: bool,
    /// An empty list or explicit null is a meaningful reset
    pub resettable: bool,
    /// Owned by the server; ignored for the idempotency diff
    pub server_owned: bool,
}

impl ArgSchema {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            choices: None,
            no_log: false,
            fallback: Vec::new(),
            bind: None,
            build_with: None,
            ref_kind: None,
            append: false,
            resettable: false,
            server_owned: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    pub fn fallback<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn bind(mut self, pointer: impl Into<String>) -> Self {
        self.bind = Some(pointer.into());
        self
    }

    pub fn build_with(mut self, f: BuilderFn) -> Self {
        self.build_with = Some(f);
        self
    }

    pub fn ref_kind(mut self, kind: impl Into<String>) -> Self {
        self.ref_kind = Some(kind.into());
        self
    }

    pub fn append(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn resettable(mut self) -> Self {
        self.resettable = true;
        self
    }

    pub fn server_owned(mut self) -> Self {
        self.server_owned = true;
        self
    }
}

/// Conditional requirement: when `field` equals `equals`, all of
/// `requires` must be supplied.
#[derive(Debug, Clone)]
pub struct RequiredIf {
    pub field: String,
    pub equals: Value,
    pub requires: Vec<String>,
}

/// Schema for a mapping of arguments, with cross-field constraints
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    pub fields: HashMap<String, ArgSchema>,
    pub mutually_exclusive: Vec<Vec<String>>,
    pub required_together: Vec<Vec<String>>,
    pub required_one_of: Vec<Vec<String>>,
    pub required_if: Vec<RequiredIf>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, schema: ArgSchema) -> Self {
        self.fields.insert(schema.name.clone(), schema);
        self
    }

    pub fn mutually_exclusive<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutually_exclusive
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_together<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_together
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_one_of<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_one_of
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_if(mut self, field: impl Into<String>, equals: Value, requires: Vec<String>) -> Self {
        self.required_if.push(RequiredIf {
            field: field.into(),
            equals,
            requires: requires.into_iter().collect(),
        });
        self
    }

    /// Merge another schema's fields and constraints into this one.
    /// Used to compose common option groups (connection, operation flags)
    /// with per-kind argument schemas.
    pub fn merge(mut self, other: ObjectSchema) -> Self {
        for (name, field) in other.fields {
            self.fields.insert(name, field);
        }
        self.mutually_exclusive.extend(other.mutually_exclusive);
        self.required_together.extend(other.required_together);
        self.required_one_of.extend(other.required_one_of);
        self.required_if.extend(other.required_if);
        self
    }

    /// Check every `bind` target in this schema tree is a valid JSON
    /// pointer. Registration fails on the first offending field.
    pub fn check_bindings(&self) -> Result<(), SchemaError> {
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();
        for name in names {
            let field = &self.fields[name];
            if let Some(pointer) = &field.bind
                && !is_valid_pointer(pointer)
            {
                return Err(SchemaError::InvalidBinding {
                    field: field.name.clone(),
                    pointer: pointer.clone(),
                });
            }
            match &field.kind {
                ArgKind::Map(inner) => inner.check_bindings()?,
                ArgKind::Seq(elem) => {
                    if let ArgKind::Map(inner) = &elem.kind {
                        inner.check_bindings()?;
                    }
                    if let Some(pointer) = &elem.bind
                        && !is_valid_pointer(pointer)
                    {
                        return Err(SchemaError::InvalidBinding {
                            field: field.name.clone(),
                            pointer: pointer.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Payload pointers of every field marked `no_log`, for redaction
    pub fn no_log_pointers(&self) -> Vec<String> {
        let mut pointers = Vec::new();
        for field in self.fields.values() {
            if field.no_log
                && let Some(pointer) = &field.bind
            {
                pointers.push(pointer.clone());
            }
            if let ArgKind::Map(inner) = &field.kind {
                pointers.extend(inner.no_log_pointers());
            }
        }
        pointers.sort();
        pointers
    }

    /// Payload pointers of every field marked `server_owned`
    pub fn server_owned_pointers(&self) -> Vec<String> {
        let mut pointers = Vec::new();
        for field in self.fields.values() {
            if field.server_owned
                && let Some(pointer) = &field.bind
            {
                pointers.push(pointer.clone());
            }
        }
        pointers.sort();
        pointers
    }
}

/// A JSON pointer is empty or starts with '/' (RFC 6901)
fn is_valid_pointer(pointer: &str) -> bool {
    !pointer.is_empty() && pointer.starts_with('/')
}

/// Schema registration error
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("field '{field}' binds to '{pointer}', which is not a JSON pointer")]
    InvalidBinding { field: String, pointer: String },
}
