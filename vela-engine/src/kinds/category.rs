//! Categories (v4 prism API)
//!
//! Category CRUD is synchronous; mutations return the entity, not a
//! task reference. There is no single name field, so present-state
//! lookups require an explicit ext_id.

use vela_client::query::ApiDialect;
use vela_core::schema::{ArgKind, ArgSchema, ObjectSchema};

use crate::options::{connection_options, operation_options, pagination_options};
use crate::registry::ResourceDescriptor;

pub fn descriptor() -> ResourceDescriptor {
    let schema = ObjectSchema::new()
        .field(ArgSchema::new("key", ArgKind::Str).bind("/key"))
        .field(ArgSchema::new("value", ArgKind::Str).bind("/value"))
        .field(ArgSchema::new("description", ArgKind::Str).bind("/description"))
        .merge(connection_options("NUTANIX"))
        .merge(operation_options())
        .merge(pagination_options(ApiDialect::V4));

    ResourceDescriptor::new(
        "category",
        ApiDialect::V4,
        "/api/prism/v4.0/config/categories",
        schema,
    )
    .name_field(None)
    .internal_attributes(["associations", "detailedAssociations"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_not_task_tracked() {
        let d = descriptor();
        assert!(!d.tracked_by_task);
        assert!(d.name_field.is_none());
    }
}
