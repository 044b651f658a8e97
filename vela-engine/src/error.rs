//! Aggregated engine error
//!
//! Every failure on the invocation path converts into this enum, which
//! carries a stable kind string for the result map's `error` field and,
//! where one exists, the server or task payload to echo back (scrubbed
//! by the controller before it leaves the engine).

use serde_json::Value as Json;

use vela_client::error::ApiError;
use vela_client::resolve::ResolveError;
use vela_client::task::TaskError;
use vela_core::build::BuildError;
use vela_core::intent::DecisionError;
use vela_core::schema::SchemaError;
use vela_core::validate::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown resource kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("resource kind '{kind}' has no operation '{verb}'")]
    UnknownVerb { kind: String, verb: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl EngineError {
    /// Stable kind string for the result map's `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownKind { .. } | EngineError::UnknownVerb { .. } => "ValidationError",
            EngineError::Validation(_) | EngineError::Schema(_) => "ValidationError",
            EngineError::Build(_) => "ValidationError",
            EngineError::Decision(err) => match err {
                DecisionError::NotFound { .. } => "NotFound",
                _ => "ValidationError",
            },
            EngineError::Resolve(err) => err.kind(),
            EngineError::Api(err) => err.kind(),
            EngineError::Task(err) => err.kind(),
        }
    }

    /// The server or task payload attached to this failure, if any
    pub fn payload(&self) -> Option<&Json> {
        match self {
            EngineError::Api(err) => err.body(),
            EngineError::Task(err) => err.task_payload(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_source_error() {
        let err = EngineError::UnknownKind {
            kind: "nope".to_string(),
        };
        assert_eq!(err.kind(), "ValidationError");

        let err = EngineError::from(DecisionError::NotFound {
            ext_id: "E1".to_string(),
        });
        assert_eq!(err.kind(), "NotFound");

        let err = EngineError::from(ApiError::EtagMissing);
        assert_eq!(err.kind(), "EtagMissing");
    }

    #[test]
    fn api_payload_is_exposed() {
        let err = EngineError::from(ApiError::Conflict {
            status: 412,
            body: serde_json::json!({"message": "stale"}),
        });
        assert_eq!(err.payload().unwrap()["message"], "stale");
    }
}
