//! Intent - Decide create/update/delete/no-op against the current state
//!
//! The decision is purely a function of the desired lifecycle state, the
//! supplied external ID and whether the remote entity exists. Subcommand
//! verbs bypass the table entirely; they always submit and always need
//! an external ID.

use serde_json::Value as Json;

/// Desired lifecycle state, from the reserved `state` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Present,
    Absent,
}

impl std::str::FromStr for DesiredState {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            other => Err(DecisionError::InvalidState {
                value: other.to_string(),
            }),
        }
    }
}

/// The operation this invocation will perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Create,
    Update { ext_id: String },
    Delete { ext_id: String },
    NoOp,
    Subcommand { verb: String, ext_id: String },
}

impl Intent {
    /// Whether carrying out this intent mutates the remote resource
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Intent::NoOp)
    }
}

/// Decision error
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecisionError {
    #[error("entity '{ext_id}' does not exist")]
    NotFound { ext_id: String },

    #[error("invalid state '{value}', expected 'present' or 'absent'")]
    InvalidState { value: String },

    #[error("operation '{verb}' requires ext_id")]
    SubcommandNeedsId { verb: String },
}

/// Apply the decision table. `ext_id` is the user-supplied (or
/// name-lookup-recovered) external ID; `current_exists` reflects the
/// precursor read.
pub fn decide(
    desired: DesiredState,
    ext_id: Option<&str>,
    current_exists: bool,
) -> Result<Intent, DecisionError> {
    match (desired, ext_id, current_exists) {
        (DesiredState::Present, None, _) => Ok(Intent::Create),
        (DesiredState::Present, Some(id), true) => Ok(Intent::Update {
            ext_id: id.to_string(),
        }),
        (DesiredState::Present, Some(id), false) => Err(DecisionError::NotFound {
            ext_id: id.to_string(),
        }),
        (DesiredState::Absent, Some(id), true) => Ok(Intent::Delete {
            ext_id: id.to_string(),
        }),
        (DesiredState::Absent, _, _) => Ok(Intent::NoOp),
    }
}

/// Decide a subcommand verb
pub fn decide_subcommand(verb: &str, ext_id: Option<&str>) -> Result<Intent, DecisionError> {
    match ext_id {
        Some(id) => Ok(Intent::Subcommand {
            verb: verb.to_string(),
            ext_id: id.to_string(),
        }),
        None => Err(DecisionError::SubcommandNeedsId {
            verb: verb.to_string(),
        }),
    }
}

/// Idempotency check: the update is a no-op when current and desired
/// agree after server-owned pointers are removed and both sides are
/// normalized (nulls and empty containers dropped, so an absent key and
/// an empty list never produce a spurious diff).
pub fn is_noop(current: &Json, desired: &Json, server_owned: &[String]) -> bool {
    let lhs = normalize_for_diff(strip_pointers(current.clone(), server_owned));
    let rhs = normalize_for_diff(strip_pointers(desired.clone(), server_owned));
    lhs == rhs
}

fn strip_pointers(mut doc: Json, pointers: &[String]) -> Json {
    for pointer in pointers {
        remove_pointer(&mut doc, pointer);
    }
    // synthetic transport keys never participate in the diff
    if let Json::Object(map) = &mut doc {
        map.retain(|k, _| !k.starts_with('_'));
    }
    doc
}

fn remove_pointer(doc: &mut Json, pointer: &str) {
    let Some((parent, key)) = pointer.rsplit_once('/') else {
        return;
    };
    let key = key.replace("~1", "/").replace("~0", "~");
    let parent = if parent.is_empty() {
        Some(doc)
    } else {
        doc.pointer_mut(parent)
    };
    if let Some(Json::Object(map)) = parent {
        map.remove(&key);
    }
}

/// Drop nulls and empty containers, recursively
fn normalize_for_diff(doc: Json) -> Json {
    match doc {
        Json::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                let normalized = normalize_for_diff(value);
                match &normalized {
                    Json::Null => {}
                    Json::Object(m) if m.is_empty() => {}
                    Json::Array(a) if a.is_empty() => {}
                    _ => {
                        out.insert(key, normalized);
                    }
                }
            }
            Json::Object(out)
        }
        Json::Array(items) => {
            Json::Array(items.into_iter().map(normalize_for_diff).collect())
        }
        other => other,
    }
}
