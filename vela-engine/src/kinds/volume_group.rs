//! Volume groups (v4 volumes API)

use vela_client::query::ApiDialect;
use vela_core::schema::{ArgKind, ArgSchema, ObjectSchema};

use crate::options::{connection_options, operation_options, pagination_options};
use crate::registry::ResourceDescriptor;

pub fn descriptor() -> ResourceDescriptor {
    // Accepted as {name} or {ext_id}; the controller resolves it to a
    // canonical ID before the builder runs.
    let cluster_ref = ObjectSchema::new()
        .field(ArgSchema::new("name", ArgKind::Str))
        .field(ArgSchema::new("ext_id", ArgKind::Str))
        .field(ArgSchema::new("uuid", ArgKind::Str));

    let schema = ObjectSchema::new()
        .field(ArgSchema::new("name", ArgKind::Str).bind("/name"))
        .field(ArgSchema::new("description", ArgKind::Str).bind("/description"))
        .field(
            ArgSchema::new("cluster", ArgKind::Map(cluster_ref))
                .ref_kind("cluster")
                .bind("/clusterReference"),
        )
        .field(
            ArgSchema::new("sharing_status", ArgKind::Str)
                .with_choices(["SHARED", "NOT_SHARED"])
                .bind("/sharingStatus"),
        )
        .field(
            ArgSchema::new("iscsi_target_prefix", ArgKind::Str).bind("/iscsiTargetPrefix"),
        )
        .merge(connection_options("NUTANIX"))
        .merge(operation_options())
        .merge(pagination_options(ApiDialect::V4));

    ResourceDescriptor::new(
        "volume_group",
        ApiDialect::V4,
        "/api/volumes/v4.0/config/volume-groups",
        schema,
    )
    .task_tracked("/api/prism/v4.0/config/tasks")
    .task_rel("volumes:config:volume-group")
}
