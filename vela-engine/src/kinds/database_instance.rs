//! Database instances (NDB legacy JSON API)
//!
//! The database service speaks the v3-style dialect with its own env
//! fallback family (`NDB_*`) and exposes non-CRUD verbs on existing
//! instances: `restore` and `scale`.

use serde_json::{json, Value as Json};

use vela_client::query::ApiDialect;
use vela_core::build::BuildError;
use vela_core::schema::{ArgKind, ArgSchema, ObjectSchema};
use vela_core::value::{Params, Value};

use crate::options::{connection_options, operation_options, pagination_options};
use crate::registry::ResourceDescriptor;

/// Builder: a day count becomes an ISO 8601 duration (`7` -> `"P7D"`)
pub fn duration_days_to_iso(value: &Value) -> Result<Json, BuildError> {
    match value {
        Value::Int(days) if *days >= 0 => Ok(json!(format!("P{days}D"))),
        other => Err(BuildError::builder(
            "expiry_days",
            format!("expected a non-negative int, got {}", other.type_name()),
        )),
    }
}

/// Sub-builder: the provisioning endpoint requires `createDbserver` and
/// `nodeCount`; fill the single-node defaults when the caller is silent.
pub fn provision_defaults(_params: &Params, mut payload: Json) -> Result<Json, BuildError> {
    if let Some(map) = payload.as_object_mut() {
        map.entry("createDbserver").or_insert(json!(true));
        map.entry("nodeCount").or_insert(json!(1));
    }
    Ok(payload)
}

pub fn descriptor() -> ResourceDescriptor {
    let schema = ObjectSchema::new()
        .field(ArgSchema::new("name", ArgKind::Str).bind("/name"))
        .field(ArgSchema::new("description", ArgKind::Str).bind("/description"))
        .field(
            ArgSchema::new("database_type", ArgKind::Str)
                .with_choices([
                    "postgres_database",
                    "mysql_database",
                    "mariadb_database",
                    "mongodb_database",
                ])
                .bind("/databaseType"),
        )
        .field(
            ArgSchema::new("db_password", ArgKind::Str)
                .no_log()
                .bind("/dbPassword"),
        )
        .field(
            ArgSchema::new("expiry_days", ArgKind::Int)
                .bind("/lcmConfig/expiryDetails/expireIn")
                .build_with(duration_days_to_iso),
        )
        .field(ArgSchema::new("time_machine", ArgKind::Opaque).bind("/timeMachineInfo"))
        .field(ArgSchema::new("snapshot_id", ArgKind::Str).bind("/snapshotId"))
        .field(ArgSchema::new("latest_snapshot", ArgKind::Bool).bind("/latestSnapshot"))
        .field(ArgSchema::new("data_storage_size_gib", ArgKind::Int).bind("/dataStorageSize"))
        .merge(connection_options("NDB"))
        .merge(operation_options())
        .merge(pagination_options(ApiDialect::V3))
        .mutually_exclusive(["snapshot_id", "latest_snapshot"]);

    ResourceDescriptor::new(
        "database_instance",
        ApiDialect::V3,
        "/era/v0.9/databases",
        schema,
    )
    .task_tracked("/era/v0.9/operations")
    .completion_detail_key("dbId")
    .sub_builders(vec![provision_defaults])
    .subcommand("restore", "/restore")
    .subcommand("scale", "/scale")
    .internal_attributes(["accessLevel", "internalInfo"])
}
