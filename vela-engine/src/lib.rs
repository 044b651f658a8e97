//! Vela Engine
//!
//! The orchestration layer of the declarative resource engine: the
//! catalog of resource kinds, the per-invocation context and the
//! controller state machine that reads the current state, decides the
//! operation, submits it, tracks the task and shapes the result.

pub mod context;
pub mod controller;
pub mod error;
pub mod kinds;
pub mod options;
pub mod registry;

pub use context::EngineContext;
pub use controller::Controller;
pub use error::EngineError;
pub use options::{ConnectionParams, OperationParams};
pub use registry::{Registry, RegistryError, ResourceDescriptor, SubcommandSpec};
