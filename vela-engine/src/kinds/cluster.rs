//! Clusters (v4 clustermgmt API)
//!
//! Read-only in this catalog; registered so `{cluster: {name: ...}}`
//! references in other kinds can resolve against its list endpoint.

use vela_client::query::ApiDialect;
use vela_core::schema::{ArgKind, ArgSchema, ObjectSchema};

use crate::options::{connection_options, operation_options, pagination_options};
use crate::registry::ResourceDescriptor;

pub fn descriptor() -> ResourceDescriptor {
    let schema = ObjectSchema::new()
        .field(ArgSchema::new("name", ArgKind::Str).bind("/name"))
        .merge(connection_options("NUTANIX"))
        .merge(operation_options())
        .merge(pagination_options(ApiDialect::V4));

    ResourceDescriptor::new(
        "cluster",
        ApiDialect::V4,
        "/api/clustermgmt/v4.0/config/clusters",
        schema,
    )
}
