//! Query - Translate filter and pagination arguments to the wire dialects
//!
//! Purely syntactic: v3 speaks `kind`/`filter`/`offset`/`length` with
//! `name==value` pairs joined by ';', v4 speaks the OData-flavoured
//! `$filter`/`$orderby`/`$page`/`$limit`/`$select`/`$expand`. Neither
//! translator knows which filters the server actually supports.

use vela_core::value::{Params, Value};

/// Which wire dialect a resource kind speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiDialect {
    /// Legacy JSON API under /api/nutanix/v3
    V3,
    /// Typed v4 API with ETag concurrency
    V4,
}

/// v3 list query
#[derive(Debug, Clone, Default)]
pub struct V3Query {
    pub kind: Option<String>,
    pub filters: Vec<(String, String)>,
    pub offset: Option<u64>,
    pub length: Option<u64>,
}

impl V3Query {
    /// Read user-facing filter arguments out of a normalized map
    pub fn from_params(params: &Params) -> Self {
        let mut filters = Vec::new();
        if let Some(Value::Map(map)) = params.get("filters") {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                filters.push((key.clone(), scalar_to_string(&map[key])));
            }
        }
        Self {
            kind: params
                .get("kind")
                .and_then(Value::as_str)
                .map(str::to_string),
            filters,
            offset: params.get("offset").and_then(Value::as_int).map(|n| n as u64),
            length: params.get("length").and_then(Value::as_int).map(|n| n as u64),
        }
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(kind) = &self.kind {
            pairs.push(("kind".to_string(), kind.clone()));
        }
        if !self.filters.is_empty() {
            let joined = self
                .filters
                .iter()
                .map(|(k, v)| format!("{}=={}", k, v))
                .collect::<Vec<_>>()
                .join(";");
            pairs.push(("filter".to_string(), joined));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(length) = self.length {
            pairs.push(("length".to_string(), length.to_string()));
        }
        pairs
    }
}

/// v4 list query
#[derive(Debug, Clone, Default)]
pub struct V4Query {
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub select: Option<String>,
    pub expand: Option<String>,
}

impl V4Query {
    pub fn from_params(params: &Params) -> Self {
        let text = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let number = |key: &str| params.get(key).and_then(Value::as_int).map(|n| n as u64);
        Self {
            filter: text("filter"),
            order_by: text("order_by"),
            page: number("page"),
            limit: number("limit"),
            select: text("select"),
            expand: text("expand"),
        }
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("$filter".to_string(), filter.clone()));
        }
        if let Some(order_by) = &self.order_by {
            pairs.push(("$orderby".to_string(), order_by.clone()));
        }
        if let Some(page) = self.page {
            pairs.push(("$page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("$limit".to_string(), limit.to_string()));
        }
        if let Some(select) = &self.select {
            pairs.push(("$select".to_string(), select.clone()));
        }
        if let Some(expand) = &self.expand {
            pairs.push(("$expand".to_string(), expand.clone()));
        }
        pairs
    }
}

/// Exact-name filter in the given dialect, used by the entity resolver
/// and by present-state lookups when no ext_id was supplied.
pub fn name_filter(dialect: ApiDialect, field: &str, name: &str) -> Vec<(String, String)> {
    match dialect {
        ApiDialect::V3 => V3Query {
            filters: vec![(field.to_string(), name.to_string())],
            ..V3Query::default()
        }
        .to_pairs(),
        ApiDialect::V4 => V4Query {
            filter: Some(format!("{} eq '{}'", field, name)),
            ..V4Query::default()
        }
        .to_pairs(),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        other => other.to_json().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::value::params_from_json;
    use serde_json::json;

    #[test]
    fn v3_filters_join_with_semicolons() {
        let query = V3Query {
            kind: Some("cluster".to_string()),
            filters: vec![
                ("name".to_string(), "c1".to_string()),
                ("state".to_string(), "COMPLETE".to_string()),
            ],
            offset: Some(0),
            length: Some(20),
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("kind".to_string(), "cluster".to_string()),
                ("filter".to_string(), "name==c1;state==COMPLETE".to_string()),
                ("offset".to_string(), "0".to_string()),
                ("length".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn v3_from_params_sorts_filter_keys() {
        let params =
            params_from_json(&json!({"filters": {"state": "on", "name": "c1"}})).unwrap();
        let query = V3Query::from_params(&params);
        assert_eq!(
            query.filters,
            vec![
                ("name".to_string(), "c1".to_string()),
                ("state".to_string(), "on".to_string()),
            ]
        );
    }

    #[test]
    fn v3_booleans_render_lowercase() {
        let params = params_from_json(&json!({"filters": {"is_default": true}})).unwrap();
        let query = V3Query::from_params(&params);
        assert_eq!(query.filters[0].1, "true");
    }

    #[test]
    fn v4_pairs_use_dollar_keys() {
        let query = V4Query {
            filter: Some("name eq 'g1'".to_string()),
            limit: Some(50),
            ..V4Query::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("$filter".to_string(), "name eq 'g1'".to_string()),
                ("$limit".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn empty_queries_emit_no_pairs() {
        assert!(V3Query::default().to_pairs().is_empty());
        assert!(V4Query::default().to_pairs().is_empty());
    }

    #[test]
    fn name_filter_differs_by_dialect() {
        let v3 = name_filter(ApiDialect::V3, "name", "g1");
        assert_eq!(v3, vec![("filter".to_string(), "name==g1".to_string())]);

        let v4 = name_filter(ApiDialect::V4, "name", "g1");
        assert_eq!(
            v4,
            vec![("$filter".to_string(), "name eq 'g1'".to_string())]
        );
    }
}
