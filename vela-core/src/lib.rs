//! Vela Core
//!
//! Pure model for a declarative resource engine: parameter values,
//! argument schemas, validation, spec building, operation decisions
//! and result shaping. This crate performs no I/O.

pub mod build;
pub mod intent;
pub mod schema;
pub mod shape;
pub mod validate;
pub mod value;
