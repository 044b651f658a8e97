//! Resolve - Turn `{name|ext_id}` references into canonical IDs
//!
//! A reference with an ext_id short-circuits; a name triggers a filtered
//! list request in the kind's dialect. Zero matches and multiple matches
//! are both fatal. Lookups are memoized for the invocation, keyed by
//! (kind, name); the memo lock is never held across an await.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value as Json;

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::query::{ApiDialect, name_filter};
use vela_core::value::Value;

/// A user-supplied entity reference: at most one of name / ext_id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRef {
    pub name: Option<String>,
    pub ext_id: Option<String>,
}

impl EntityRef {
    /// Read a reference out of a parameter value. A mapping may carry
    /// `name`, `ext_id` or `uuid`; a bare string is taken as an ext_id.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Map(map) => Self {
                name: map.get("name").and_then(Value::as_str).map(str::to_string),
                ext_id: map
                    .get("ext_id")
                    .or_else(|| map.get("uuid"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            Value::String(s) => Self {
                name: None,
                ext_id: Some(s.clone()),
            },
            _ => Self::default(),
        }
    }
}

/// Resolution error
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no {kind} found with name '{name}'")]
    NotFound { kind: String, name: String },

    #[error("{count} {kind} entities share the name '{name}'")]
    Ambiguous {
        kind: String,
        name: String,
        count: usize,
    },

    #[error("reference to {kind} needs a name or ext_id")]
    Empty { kind: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ResolveError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Api(err) => err.kind(),
            _ => "ResolutionError",
        }
    }
}

/// Per-invocation resolver with a (kind, name) → ext_id memo
#[derive(Default)]
pub struct Resolver {
    memo: Mutex<HashMap<(String, String), String>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        client: &ApiClient,
        dialect: ApiDialect,
        list_path: &str,
        kind: &str,
        entity: &EntityRef,
    ) -> Result<String, ResolveError> {
        if let Some(ext_id) = &entity.ext_id {
            return Ok(ext_id.clone());
        }
        let Some(name) = &entity.name else {
            return Err(ResolveError::Empty {
                kind: kind.to_string(),
            });
        };

        let memo_key = (kind.to_string(), name.clone());
        if let Some(hit) = self.memo_get(&memo_key) {
            return Ok(hit);
        }

        let query = name_filter(dialect, "name", name);
        let body = client.get(list_path, &query).await?;
        let ids = list_entity_ids(dialect, &body);

        match ids.as_slice() {
            [] => Err(ResolveError::NotFound {
                kind: kind.to_string(),
                name: name.clone(),
            }),
            [only] => {
                self.memo_put(memo_key, only.clone());
                Ok(only.clone())
            }
            many => Err(ResolveError::Ambiguous {
                kind: kind.to_string(),
                name: name.clone(),
                count: many.len(),
            }),
        }
    }

    fn memo_get(&self, key: &(String, String)) -> Option<String> {
        let guard = self.memo.lock().unwrap_or_else(|poison| poison.into_inner());
        guard.get(key).cloned()
    }

    fn memo_put(&self, key: (String, String), ext_id: String) {
        let mut guard = self.memo.lock().unwrap_or_else(|poison| poison.into_inner());
        guard.insert(key, ext_id);
    }
}

/// Extract entity IDs from a list response in either dialect
pub fn list_entity_ids(dialect: ApiDialect, body: &Json) -> Vec<String> {
    let items = match dialect {
        ApiDialect::V4 => body.get("data").and_then(Json::as_array),
        ApiDialect::V3 => body.get("entities").and_then(Json::as_array),
    };
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match dialect {
            ApiDialect::V4 => item.get("extId").and_then(Json::as_str),
            ApiDialect::V3 => item
                .pointer("/metadata/uuid")
                .or_else(|| item.get("uuid"))
                .and_then(Json::as_str),
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vela_core::value::params_from_json;

    #[test]
    fn entity_ref_reads_name_or_id() {
        let params = params_from_json(&json!({"cluster": {"name": "c1"}})).unwrap();
        let entity = EntityRef::from_value(params.get("cluster").unwrap());
        assert_eq!(entity.name.as_deref(), Some("c1"));
        assert_eq!(entity.ext_id, None);

        let entity = EntityRef::from_value(&Value::String("abc-123".to_string()));
        assert_eq!(entity.ext_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn entity_ref_accepts_uuid_alias() {
        let params = params_from_json(&json!({"cluster": {"uuid": "u-1"}})).unwrap();
        let entity = EntityRef::from_value(params.get("cluster").unwrap());
        assert_eq!(entity.ext_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn v4_list_ids_come_from_data() {
        let body = json!({"data": [{"extId": "a"}, {"extId": "b"}]});
        assert_eq!(list_entity_ids(ApiDialect::V4, &body), vec!["a", "b"]);
    }

    #[test]
    fn v3_list_ids_come_from_entity_metadata() {
        let body = json!({"entities": [{"metadata": {"uuid": "u1"}}, {"uuid": "u2"}]});
        assert_eq!(list_entity_ids(ApiDialect::V3, &body), vec!["u1", "u2"]);
    }

    #[test]
    fn empty_list_yields_no_ids() {
        assert!(list_entity_ids(ApiDialect::V4, &json!({})).is_empty());
        assert!(list_entity_ids(ApiDialect::V4, &json!({"data": []})).is_empty());
    }
}
