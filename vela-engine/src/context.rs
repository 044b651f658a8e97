//! Context - Per-invocation engine state
//!
//! One context is constructed per invocation from the normalized
//! parameter map: the HTTP client with its deadline, the entity
//! resolver's memo, the operation flags and the secret values collected
//! for scrubbing error echoes. Nothing survives the invocation; there
//! are no process-wide singletons.

use vela_client::deadline::Deadline;
use vela_client::http::ApiClient;
use vela_client::resolve::Resolver;
use vela_client::transport::ReqwestTransport;

use crate::error::EngineError;
use crate::options::{ConnectionParams, OperationParams};
use vela_core::schema::ObjectSchema;
use vela_core::value::{Params, Value};

pub struct EngineContext {
    pub client: ApiClient,
    pub resolver: Resolver,
    pub operation: OperationParams,
    /// Values of `no_log` arguments, replaced in any surfaced text
    pub secrets: Vec<String>,
}

impl EngineContext {
    pub fn from_params(normalized: &Params, schema: &ObjectSchema) -> Result<Self, EngineError> {
        let connection = ConnectionParams::from_params(normalized)?;
        let operation = OperationParams::from_params(normalized)?;

        let transport =
            ReqwestTransport::new(connection.credentials()?, connection.validate_certs)?;
        let deadline = Deadline::after(operation.timeout);
        let client = ApiClient::new(Box::new(transport), connection.base_url()?, deadline);

        Ok(Self {
            client,
            resolver: Resolver::new(),
            operation,
            secrets: collect_secrets(normalized, schema),
        })
    }

    pub fn deadline(&self) -> Deadline {
        self.client.deadline()
    }
}

fn collect_secrets(params: &Params, schema: &ObjectSchema) -> Vec<String> {
    let mut secrets = Vec::new();
    for (name, field) in &schema.fields {
        if field.no_log
            && let Some(Value::String(value)) = params.get(name)
        {
            secrets.push(value.clone());
        }
    }
    secrets.sort();
    secrets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vela_core::schema::{ArgKind, ArgSchema};
    use vela_core::value::params_from_json;

    #[test]
    fn secrets_are_collected_from_no_log_fields() {
        let schema = ObjectSchema::new()
            .field(ArgSchema::new("password", ArgKind::Str).no_log())
            .field(ArgSchema::new("name", ArgKind::Str));
        let params =
            params_from_json(&json!({"password": "hunter2", "name": "g1"})).unwrap();

        assert_eq!(collect_secrets(&params, &schema), vec!["hunter2"]);
    }
}
