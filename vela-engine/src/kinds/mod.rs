//! Built-in resource kinds
//!
//! Each module is data, not code: a descriptor wiring an argument schema
//! to endpoint routes, a wire dialect and a task relation tag. Adding a
//! kind means adding a descriptor here and registering it in
//! `Registry::builtin`.

pub mod address_group;
pub mod category;
pub mod cluster;
pub mod database_instance;
pub mod volume_group;
