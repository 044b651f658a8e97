//! Task - Poll asynchronous server tasks to a terminal state
//!
//! Mutations return a task reference rather than the final entity. The
//! tracker polls the task endpoint with exponential backoff (2 s doubling
//! to a 10 s cap), observing the invocation deadline before every sleep.
//! It never rewrites the task status and never cancels remote tasks.

use std::time::Duration;

use serde_json::Value as Json;

use crate::deadline::Deadline;
use crate::error::ApiError;
use crate::http::ApiClient;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
    /// A status string this engine does not know; treated as still running
    Unknown,
}

impl TaskStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" | "PENDING" => TaskStatus::Queued,
            "RUNNING" => TaskStatus::Running,
            "SUCCEEDED" => TaskStatus::Succeeded,
            "FAILED" => TaskStatus::Failed,
            "CANCELED" | "CANCELLED" => TaskStatus::Canceled,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled
        )
    }
}

/// An entity created or changed by a task, with its relation tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAffected {
    pub ext_id: String,
    pub rel: String,
}

/// Snapshot of a task as last polled
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub ext_id: String,
    pub status: TaskStatus,
    pub entities_affected: Vec<EntityAffected>,
    pub completion_details: Vec<(String, Json)>,
    pub error_messages: Vec<String>,
    /// The task payload exactly as the server returned it
    pub raw: Json,
}

impl TaskHandle {
    /// Parse a task payload. Handles both the v4 camelCase shape (with
    /// an optional `data` envelope) and the v3 snake_case shape.
    pub fn from_response(body: &Json) -> Self {
        let task = body.get("data").filter(|d| d.is_object()).unwrap_or(body);

        let ext_id = pick_str(task, &["extId", "ext_id", "uuid"]).unwrap_or_default();

        let status = match task.get("status") {
            Some(Json::String(s)) => TaskStatus::parse(s),
            Some(Json::Object(map)) => map
                .get("state")
                .and_then(Json::as_str)
                .map(TaskStatus::parse)
                .unwrap_or(TaskStatus::Unknown),
            _ => TaskStatus::Unknown,
        };

        let entities_affected = pick(task, &["entitiesAffected", "entities_affected"])
            .and_then(Json::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let ext_id = pick_str(item, &["extId", "ext_id", "uuid"])?;
                        let rel = pick_str(item, &["rel"]).unwrap_or_default();
                        Some(EntityAffected { ext_id, rel })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let completion_details = pick(task, &["completionDetails", "completion_details"])
            .and_then(Json::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let name = pick_str(item, &["name"])?;
                        let value = item.get("value").cloned().unwrap_or(Json::Null);
                        Some((name, value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let error_messages = pick(task, &["errorMessages", "error_messages"])
            .and_then(Json::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Json::String(s) => Some(s.clone()),
                        other => pick_str(other, &["message"]),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            ext_id,
            status,
            entities_affected,
            completion_details,
            error_messages,
            raw: task.clone(),
        }
    }

    /// The affected entity carrying the given relation tag
    pub fn entity_for_rel(&self, rel: &str) -> Option<&str> {
        self.entities_affected
            .iter()
            .find(|e| e.rel == rel)
            .map(|e| e.ext_id.as_str())
    }

    /// A completion-detail value by name (some verbs report the
    /// resulting ID here instead of in entities_affected)
    pub fn completion_detail(&self, name: &str) -> Option<&Json> {
        self.completion_details
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

fn pick<'a>(doc: &'a Json, keys: &[&str]) -> Option<&'a Json> {
    keys.iter().find_map(|key| doc.get(key))
}

fn pick_str(doc: &Json, keys: &[&str]) -> Option<String> {
    pick(doc, keys).and_then(Json::as_str).map(str::to_string)
}

/// Poll cadence: initial interval doubling up to a cap
#[derive(Debug, Clone, Copy)]
pub struct PollCadence {
    pub initial: Duration,
    pub cap: Duration,
}

impl Default for PollCadence {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            cap: Duration::from_secs(10),
        }
    }
}

/// Task tracking error
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task failed: {}", handle.error_messages.join("; "))]
    Failed { handle: TaskHandle },

    #[error("task was canceled")]
    Canceled { handle: TaskHandle },

    #[error("timed out waiting for task")]
    Timeout { last: Option<TaskHandle> },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl TaskError {
    /// Stable kind string for the result map's `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Failed { .. } | TaskError::Canceled { .. } => "TaskFailed",
            TaskError::Timeout { .. } => "Timeout",
            TaskError::Api(err) => err.kind(),
        }
    }

    /// The last task payload seen, for surfacing on failure
    pub fn task_payload(&self) -> Option<&Json> {
        match self {
            TaskError::Failed { handle } | TaskError::Canceled { handle } => Some(&handle.raw),
            TaskError::Timeout { last } => last.as_ref().map(|h| &h.raw),
            TaskError::Api(_) => None,
        }
    }
}

/// Poll `{task_path}/{ext_id}` until terminal or the deadline elapses.
/// A deadline shorter than the first interval times out with zero polls.
pub async fn wait_for_task(
    client: &ApiClient,
    task_path: &str,
    ext_id: &str,
    cadence: PollCadence,
    deadline: Deadline,
) -> Result<TaskHandle, TaskError> {
    let path = format!("{}/{}", task_path.trim_end_matches('/'), ext_id);
    let mut interval = cadence.initial;
    let mut last: Option<TaskHandle> = None;

    loop {
        if !deadline.allows(interval) {
            return Err(TaskError::Timeout { last });
        }
        tokio::time::sleep(interval).await;

        let body = client.get(&path, &[]).await?;
        let handle = TaskHandle::from_response(&body);
        tracing::debug!(task = ext_id, status = ?handle.status, "task polled");

        match handle.status {
            TaskStatus::Succeeded => return Ok(handle),
            TaskStatus::Failed => return Err(TaskError::Failed { handle }),
            TaskStatus::Canceled => return Err(TaskError::Canceled { handle }),
            _ => {
                last = Some(handle);
                interval = (interval * 2).min(cadence.cap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_v4_task_shape() {
        let body = json!({
            "data": {
                "extId": "T1",
                "status": "SUCCEEDED",
                "entitiesAffected": [
                    {"extId": "E1", "rel": "networking:config:address-group"}
                ],
                "completionDetails": [{"name": "extId", "value": "E1"}]
            }
        });
        let handle = TaskHandle::from_response(&body);
        assert_eq!(handle.ext_id, "T1");
        assert_eq!(handle.status, TaskStatus::Succeeded);
        assert_eq!(
            handle.entity_for_rel("networking:config:address-group"),
            Some("E1")
        );
        assert_eq!(handle.completion_detail("extId"), Some(&json!("E1")));
    }

    #[test]
    fn parses_v3_task_shape() {
        let body = json!({
            "uuid": "T2",
            "status": "FAILED",
            "error_messages": [{"message": "quota exceeded"}],
            "entities_affected": [{"uuid": "E2", "rel": "database"}]
        });
        let handle = TaskHandle::from_response(&body);
        assert_eq!(handle.ext_id, "T2");
        assert_eq!(handle.status, TaskStatus::Failed);
        assert_eq!(handle.error_messages, vec!["quota exceeded"]);
        assert_eq!(handle.entity_for_rel("database"), Some("E2"));
    }

    #[test]
    fn unknown_status_is_not_terminal() {
        assert!(!TaskStatus::parse("SOMETHING_NEW").is_terminal());
        assert!(TaskStatus::parse("succeeded").is_terminal());
        assert!(TaskStatus::parse("CANCELLED").is_terminal());
    }

    #[test]
    fn missing_rel_does_not_match() {
        let body = json!({
            "extId": "T3",
            "status": "SUCCEEDED",
            "entitiesAffected": [{"extId": "E3"}]
        });
        let handle = TaskHandle::from_response(&body);
        assert_eq!(handle.entity_for_rel("networking:config:address-group"), None);
    }

    #[test]
    fn task_error_kinds() {
        let handle = TaskHandle::from_response(&json!({"extId": "T", "status": "FAILED"}));
        assert_eq!(TaskError::Failed { handle }.kind(), "TaskFailed");
        assert_eq!(TaskError::Timeout { last: None }.kind(), "Timeout");
    }
}
