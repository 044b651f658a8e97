//! Address groups (v4 networking API)

use vela_client::query::ApiDialect;
use vela_core::schema::{ArgKind, ArgSchema, ObjectSchema};

use crate::options::{connection_options, operation_options, pagination_options};
use crate::registry::ResourceDescriptor;

pub fn descriptor() -> ResourceDescriptor {
    let address = ObjectSchema::new()
        .field(ArgSchema::new("value", ArgKind::Str).bind("/value"))
        .field(ArgSchema::new("prefix_length", ArgKind::Int).bind("/prefixLength"));

    let range = ObjectSchema::new()
        .field(ArgSchema::new("start_ip", ArgKind::Str).bind("/startIp"))
        .field(ArgSchema::new("end_ip", ArgKind::Str).bind("/endIp"));

    let schema = ObjectSchema::new()
        .field(ArgSchema::new("name", ArgKind::Str).bind("/name"))
        .field(ArgSchema::new("description", ArgKind::Str).bind("/description"))
        .field(
            ArgSchema::new(
                "ipv4_addresses",
                ArgKind::Seq(Box::new(ArgSchema::new("", ArgKind::Map(address)))),
            )
            .bind("/ipv4Addresses"),
        )
        .field(
            ArgSchema::new(
                "ip_ranges",
                ArgKind::Seq(Box::new(ArgSchema::new("", ArgKind::Map(range)))),
            )
            .bind("/ipRanges"),
        )
        .merge(connection_options("NUTANIX"))
        .merge(operation_options())
        .merge(pagination_options(ApiDialect::V4));

    ResourceDescriptor::new(
        "address_group",
        ApiDialect::V4,
        "/api/networking/v4.0/config/address-groups",
        schema,
    )
    .task_tracked("/api/prism/v4.0/config/tasks")
    .task_rel("networking:config:address-group")
}
