//! Options - Common argument groups and their typed readouts
//!
//! Every kind schema merges these groups so a change here propagates to
//! the whole catalog: `connection_options` (endpoint and auth),
//! `operation_options` (lifecycle flags) and `pagination_options`
//! (list-query fields in the kind's dialect). The typed readouts run
//! after validation, so defaults and env fallbacks are already applied.

use std::time::Duration;

use url::Url;

use crate::error::EngineError;
use vela_client::error::ApiError;
use vela_client::query::ApiDialect;
use vela_client::transport::Credentials;
use vela_core::intent::DesiredState;
use vela_core::schema::{ArgKind, ArgSchema, ObjectSchema};
use vela_core::validate::ValidationError;
use vela_core::value::{Params, Value};

/// Endpoint and authentication arguments. `env_prefix` selects the
/// fallback family: `NUTANIX` for Prism kinds, `NDB` for the database
/// service.
pub fn connection_options(env_prefix: &str) -> ObjectSchema {
    ObjectSchema::new()
        .field(
            ArgSchema::new("host", ArgKind::Str)
                .required()
                .fallback([format!("{env_prefix}_HOST")]),
        )
        .field(
            ArgSchema::new("port", ArgKind::Int)
                .with_default(Value::Int(9440))
                .fallback([format!("{env_prefix}_PORT")]),
        )
        .field(
            ArgSchema::new("username", ArgKind::Str).fallback([format!("{env_prefix}_USERNAME")]),
        )
        .field(
            ArgSchema::new("password", ArgKind::Str)
                .no_log()
                .fallback([format!("{env_prefix}_PASSWORD")]),
        )
        .field(
            ArgSchema::new("api_key", ArgKind::Str)
                .no_log()
                .fallback([format!("{env_prefix}_API_KEY")]),
        )
        .field(
            ArgSchema::new("validate_certs", ArgKind::Bool)
                .with_default(Value::Bool(true))
                .fallback(["VALIDATE_CERTS"]),
        )
        .mutually_exclusive(["password", "api_key"])
        .required_together(["username", "password"])
        .required_one_of(["password", "api_key"])
}

/// Lifecycle flags shared by every kind
pub fn operation_options() -> ObjectSchema {
    ObjectSchema::new()
        .field(
            ArgSchema::new("state", ArgKind::Str)
                .with_default(Value::String("present".to_string()))
                .with_choices(["present", "absent"]),
        )
        .field(ArgSchema::new("wait", ArgKind::Bool).with_default(Value::Bool(true)))
        .field(ArgSchema::new("timeout", ArgKind::Int).with_default(Value::Int(300)))
        .field(ArgSchema::new("ext_id", ArgKind::Str))
        .field(ArgSchema::new("uuid", ArgKind::Str))
        .field(ArgSchema::new("check_mode", ArgKind::Bool).with_default(Value::Bool(false)))
        .mutually_exclusive(["ext_id", "uuid"])
}

/// List-query fields in the kind's dialect
pub fn pagination_options(dialect: ApiDialect) -> ObjectSchema {
    match dialect {
        ApiDialect::V4 => ObjectSchema::new()
            .field(ArgSchema::new("filter", ArgKind::Str))
            .field(ArgSchema::new("order_by", ArgKind::Str))
            .field(ArgSchema::new("page", ArgKind::Int))
            .field(ArgSchema::new("limit", ArgKind::Int))
            .field(ArgSchema::new("select", ArgKind::Str))
            .field(ArgSchema::new("expand", ArgKind::Str)),
        ApiDialect::V3 => ObjectSchema::new()
            .field(ArgSchema::new("kind", ArgKind::Str))
            .field(ArgSchema::new("filters", ArgKind::Opaque))
            .field(ArgSchema::new("offset", ArgKind::Int))
            .field(ArgSchema::new("length", ArgKind::Int)),
    }
}

/// Typed readout of the connection group
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub validate_certs: bool,
}

impl ConnectionParams {
    pub fn from_params(params: &Params) -> Result<Self, EngineError> {
        let text = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let host = text("host").ok_or(ValidationError::MissingRequired {
            path: "host".to_string(),
        })?;
        Ok(Self {
            host,
            port: params.get("port").and_then(Value::as_int).unwrap_or(9440),
            username: text("username"),
            password: text("password"),
            api_key: text("api_key"),
            validate_certs: params
                .get("validate_certs")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        })
    }

    /// Endpoint base URL. A host carrying a scheme is taken verbatim
    /// (ignoring `port`); a bare hostname or IP gets `https://` and the
    /// configured port.
    pub fn base_url(&self) -> Result<Url, EngineError> {
        let text = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("https://{}:{}/", self.host, self.port)
        };
        Url::parse(&text)
            .map_err(|e| EngineError::Api(ApiError::Url(e.to_string())))
    }

    pub fn credentials(&self) -> Result<Credentials, EngineError> {
        if let Some(key) = &self.api_key {
            return Ok(Credentials::ApiKey(key.clone()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(EngineError::Validation(ValidationError::RequiredOneOf {
                fields: vec!["password".to_string(), "api_key".to_string()],
            })),
        }
    }
}

/// Typed readout of the operation group
#[derive(Debug, Clone)]
pub struct OperationParams {
    pub state: DesiredState,
    pub wait: bool,
    pub timeout: Duration,
    pub ext_id: Option<String>,
    pub check_mode: bool,
}

impl OperationParams {
    pub fn from_params(params: &Params) -> Result<Self, EngineError> {
        let state = params
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("present")
            .parse::<DesiredState>()?;
        let ext_id = params
            .get("ext_id")
            .or_else(|| params.get("uuid"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            state,
            wait: params.get("wait").and_then(Value::as_bool).unwrap_or(true),
            timeout: Duration::from_secs(
                params
                    .get("timeout")
                    .and_then(Value::as_int)
                    .unwrap_or(300)
                    .max(0) as u64,
            ),
            ext_id,
            check_mode: params
                .get("check_mode")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vela_core::validate::normalize;
    use vela_core::value::params_from_json;

    fn base_params() -> Params {
        params_from_json(&json!({
            "host": "10.0.0.5",
            "username": "admin",
            "password": "secret"
        }))
        .unwrap()
    }

    #[test]
    fn connection_defaults_apply() {
        let normalized = normalize(&base_params(), &connection_options("NUTANIX")).unwrap();
        let conn = ConnectionParams::from_params(&normalized).unwrap();
        assert_eq!(conn.port, 9440);
        assert!(conn.validate_certs);
        assert_eq!(
            conn.base_url().unwrap().as_str(),
            "https://10.0.0.5:9440/"
        );
    }

    #[test]
    fn host_with_scheme_is_taken_verbatim() {
        let conn = ConnectionParams {
            host: "http://127.0.0.1:8081".to_string(),
            port: 9440,
            username: None,
            password: None,
            api_key: Some("k".to_string()),
            validate_certs: true,
        };
        assert_eq!(conn.base_url().unwrap().as_str(), "http://127.0.0.1:8081/");
    }

    #[test]
    fn api_key_wins_over_basic() {
        let conn = ConnectionParams {
            host: "h".to_string(),
            port: 9440,
            username: Some("admin".to_string()),
            password: None,
            api_key: Some("k".to_string()),
            validate_certs: true,
        };
        assert!(matches!(conn.credentials().unwrap(), Credentials::ApiKey(_)));
    }

    #[test]
    fn missing_auth_is_a_validation_error() {
        let conn = ConnectionParams {
            host: "h".to_string(),
            port: 9440,
            username: None,
            password: None,
            api_key: None,
            validate_certs: true,
        };
        assert_eq!(conn.credentials().unwrap_err().kind(), "ValidationError");
    }

    #[test]
    fn password_and_api_key_are_exclusive() {
        let mut params = base_params();
        params.insert("api_key".to_string(), Value::String("k".to_string()));
        let err = normalize(&params, &connection_options("NUTANIX")).unwrap_err();
        assert!(matches!(err, ValidationError::MutuallyExclusive { .. }));
    }

    #[test]
    fn env_fallback_supplies_the_host() {
        // set_var is unsafe in edition 2024; tests run single-threaded here
        unsafe { std::env::set_var("NDB_HOST", "ndb.example") };
        let params = params_from_json(&json!({"api_key": "k"})).unwrap();
        let normalized = normalize(&params, &connection_options("NDB")).unwrap();
        assert_eq!(
            normalized.get("host").and_then(Value::as_str),
            Some("ndb.example")
        );
        unsafe { std::env::remove_var("NDB_HOST") };
    }

    #[test]
    fn operation_defaults() {
        let normalized = normalize(&Params::new(), &operation_options()).unwrap();
        let op = OperationParams::from_params(&normalized).unwrap();
        assert_eq!(op.state, DesiredState::Present);
        assert!(op.wait);
        assert_eq!(op.timeout, Duration::from_secs(300));
        assert!(!op.check_mode);
        assert_eq!(op.ext_id, None);
    }

    #[test]
    fn v3_list_kind_passes_validation_and_reaches_the_query() {
        use vela_client::query::V3Query;

        let params = params_from_json(&json!({"kind": "cluster", "length": 20})).unwrap();
        let normalized = normalize(&params, &pagination_options(ApiDialect::V3)).unwrap();
        let pairs = V3Query::from_params(&normalized).to_pairs();
        assert!(pairs.contains(&("kind".to_string(), "cluster".to_string())));
        assert!(pairs.contains(&("length".to_string(), "20".to_string())));
    }

    #[test]
    fn uuid_aliases_ext_id() {
        let params = params_from_json(&json!({"uuid": "U1"})).unwrap();
        let normalized = normalize(&params, &operation_options()).unwrap();
        let op = OperationParams::from_params(&normalized).unwrap();
        assert_eq!(op.ext_id.as_deref(), Some("U1"));
    }
}
