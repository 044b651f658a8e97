//! Shape - Normalize the returned result document
//!
//! Before a response leaves the engine, transport-only and system
//! attributes are stripped and every secret-bound payload path is
//! redacted. The result map has a stable set of keys regardless of the
//! operation that produced it.

use serde::Serialize;
use serde_json::Value as Json;

/// Replacement for values bound to `no_log` arguments
pub const REDACTED: &str = "********";

/// Attributes stripped from every response, regardless of kind
pub const DEFAULT_INTERNAL_ATTRIBUTES: &[&str] =
    &["links", "tenant_id", "tenantId", "$objectType", "$reserved", "$unknownFields", "_etag"];

/// The result map handed back to the host runtime
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub changed: bool,
    pub response: Json,
    pub ext_id: Option<String>,
    pub task_ext_id: Option<String>,
    pub error: Option<String>,
    pub skipped: bool,
    pub msg: String,
}

impl Default for InvocationResult {
    fn default() -> Self {
        Self {
            changed: false,
            response: Json::Null,
            ext_id: None,
            task_ext_id: None,
            error: None,
            skipped: false,
            msg: String::new(),
        }
    }
}

impl InvocationResult {
    pub fn changed(response: Json) -> Self {
        Self {
            changed: true,
            response,
            ..Self::default()
        }
    }

    pub fn skipped(response: Json, msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            skipped: true,
            response,
            msg: msg.into(),
            ..Self::default()
        }
    }

    pub fn unchanged(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            ..Self::default()
        }
    }

    /// Fail-path result: the error kind plus a human message, optionally
    /// carrying a (already scrubbed) server or task payload.
    pub fn failed(kind: impl Into<String>, msg: impl Into<String>, response: Json) -> Self {
        Self {
            error: Some(kind.into()),
            msg: msg.into(),
            response,
            ..Self::default()
        }
    }

    pub fn with_ext_id(mut self, ext_id: impl Into<String>) -> Self {
        self.ext_id = Some(ext_id.into());
        self
    }

    pub fn with_task(mut self, task_ext_id: impl Into<String>) -> Self {
        self.task_ext_id = Some(task_ext_id.into());
        self
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }
}

/// Strip internal attributes and redact secret paths from a response
/// document. `internal` extends the default deny-list per resource kind;
/// `no_log_pointers` are the schema's secret payload bindings.
pub fn shape_response(mut doc: Json, internal: &[&str], no_log_pointers: &[String]) -> Json {
    for pointer in no_log_pointers {
        redact_pointer(&mut doc, pointer);
    }
    strip_keys(&mut doc, internal);
    doc
}

fn strip_keys(doc: &mut Json, internal: &[&str]) {
    match doc {
        Json::Object(map) => {
            map.retain(|key, _| {
                !DEFAULT_INTERNAL_ATTRIBUTES.contains(&key.as_str())
                    && !internal.contains(&key.as_str())
            });
            for value in map.values_mut() {
                strip_keys(value, internal);
            }
        }
        Json::Array(items) => {
            for item in items {
                strip_keys(item, internal);
            }
        }
        _ => {}
    }
}

fn redact_pointer(doc: &mut Json, pointer: &str) {
    if let Some(value) = doc.pointer_mut(pointer)
        && !value.is_null()
    {
        *value = Json::String(REDACTED.to_string());
    }
}

/// Redact occurrences of secret values in an arbitrary error echo.
/// Used when a server payload is surfaced on failure.
pub fn scrub_text(text: &str, secrets: &[String]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if !secret.is_empty() {
            out = out.replace(secret.as_str(), REDACTED);
        }
    }
    out
}
