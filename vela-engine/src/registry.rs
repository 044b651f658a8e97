//! Registry - Static catalog of resource kinds
//!
//! Each kind registers a descriptor: its argument schema, endpoint
//! routes, wire dialect, task relation tag and subcommand verbs. The
//! catalog is built once at startup and read-only afterwards;
//! registration fails on a duplicate kind or an invalid payload binding.

use std::collections::HashMap;

use serde_json::Value as Json;

use vela_client::query::ApiDialect;
use vela_core::build::SubBuilder;
use vela_core::schema::{ObjectSchema, SchemaError};

/// A non-CRUD verb on an existing resource (restore, scale, promote...).
/// Submitted as a POST to `{base_path}/{ext_id}{path_suffix}`.
#[derive(Debug, Clone)]
pub struct SubcommandSpec {
    pub verb: String,
    pub path_suffix: String,
}

/// Everything the controller needs to know about one resource kind
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub kind: String,
    pub dialect: ApiDialect,
    /// Collection endpoint, e.g. `/api/networking/v4.0/config/address-groups`
    pub base_path: String,
    /// Task endpoint polled after mutations
    pub task_path: String,
    pub schema: ObjectSchema,
    /// Whether mutations return a task reference instead of the entity
    pub tracked_by_task: bool,
    /// Relation tag selecting this kind's entity in `entities_affected`
    pub task_rel: Option<String>,
    /// Completion-detail name carrying the entity ID when the task does
    /// not list it under `entities_affected`
    pub completion_detail_key: Option<String>,
    /// Argument used for lookup-by-name when no ext_id was supplied
    pub name_field: Option<String>,
    pub subcommands: Vec<SubcommandSpec>,
    /// Ordered pipeline run over the built create payload, for kinds
    /// whose spec is composed from several sub-specs
    pub sub_builders: Vec<SubBuilder>,
    /// Kind-specific attributes stripped from the shaped response, on
    /// top of the engine-wide deny-list
    pub internal_attributes: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(
        kind: impl Into<String>,
        dialect: ApiDialect,
        base_path: impl Into<String>,
        schema: ObjectSchema,
    ) -> Self {
        Self {
            kind: kind.into(),
            dialect,
            base_path: base_path.into(),
            task_path: String::new(),
            schema,
            tracked_by_task: false,
            task_rel: None,
            completion_detail_key: None,
            name_field: Some("name".to_string()),
            subcommands: Vec::new(),
            sub_builders: Vec::new(),
            internal_attributes: Vec::new(),
        }
    }

    pub fn task_tracked(mut self, task_path: impl Into<String>) -> Self {
        self.tracked_by_task = true;
        self.task_path = task_path.into();
        self
    }

    pub fn task_rel(mut self, rel: impl Into<String>) -> Self {
        self.task_rel = Some(rel.into());
        self
    }

    pub fn completion_detail_key(mut self, name: impl Into<String>) -> Self {
        self.completion_detail_key = Some(name.into());
        self
    }

    pub fn name_field(mut self, field: Option<&str>) -> Self {
        self.name_field = field.map(str::to_string);
        self
    }

    pub fn sub_builders(mut self, builders: Vec<SubBuilder>) -> Self {
        self.sub_builders = builders;
        self
    }

    pub fn subcommand(mut self, verb: impl Into<String>, path_suffix: impl Into<String>) -> Self {
        self.subcommands.push(SubcommandSpec {
            verb: verb.into(),
            path_suffix: path_suffix.into(),
        });
        self
    }

    pub fn internal_attributes<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.internal_attributes = attrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn entity_path(&self, ext_id: &str) -> String {
        format!("{}/{}", self.base_path.trim_end_matches('/'), ext_id)
    }

    pub fn subcommand_spec(&self, verb: &str) -> Option<&SubcommandSpec> {
        self.subcommands.iter().find(|s| s.verb == verb)
    }

    /// Unwrap the entity document from a read response. The v4 dialect
    /// envelopes entities under `data`; v3 returns them bare.
    pub fn entity_document<'a>(&self, body: &'a Json) -> &'a Json {
        match self.dialect {
            ApiDialect::V4 => body.get("data").filter(|d| !d.is_null()).unwrap_or(body),
            ApiDialect::V3 => body,
        }
    }

    /// The entity's external ID as reported by the server
    pub fn entity_ext_id(&self, doc: &Json) -> Option<String> {
        ["/extId", "/metadata/uuid", "/uuid", "/id"]
            .iter()
            .find_map(|p| doc.pointer(p))
            .and_then(Json::as_str)
            .map(str::to_string)
    }
}

/// Registration error
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("resource kind '{kind}' is registered twice")]
    DuplicateKind { kind: String },

    #[error("kind '{kind}': {source}")]
    Schema {
        kind: String,
        source: SchemaError,
    },
}

/// Process-wide catalog of resource kinds, immutable after init
#[derive(Debug, Default)]
pub struct Registry {
    kinds: HashMap<String, ResourceDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of kinds shipped with the engine
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(crate::kinds::address_group::descriptor())?;
        registry.register(crate::kinds::category::descriptor())?;
        registry.register(crate::kinds::volume_group::descriptor())?;
        registry.register(crate::kinds::database_instance::descriptor())?;
        registry.register(crate::kinds::cluster::descriptor())?;
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: ResourceDescriptor) -> Result<(), RegistryError> {
        if self.kinds.contains_key(&descriptor.kind) {
            return Err(RegistryError::DuplicateKind {
                kind: descriptor.kind.clone(),
            });
        }
        descriptor
            .schema
            .check_bindings()
            .map_err(|source| RegistryError::Schema {
                kind: descriptor.kind.clone(),
                source,
            })?;
        self.kinds.insert(descriptor.kind.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<&ResourceDescriptor> {
        self.kinds.get(kind)
    }

    pub fn kind_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}
