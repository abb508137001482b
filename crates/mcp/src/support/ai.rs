#![forbid(unsafe_code)]

use serde_json::{Value, json};
use wbs_storage::StoreError;

pub(crate) fn ai_ok(result: Value) -> Value {
    json!({
        "success": true,
        "result": result,
        "error": null
    })
}

pub(crate) fn ai_error(code: &str, message: &str) -> Value {
    json!({
        "success": false,
        "result": {},
        "error": { "code": code, "message": message.trim() }
    })
}

/// Maps a store error onto the tool-level failure taxonomy. The code string
/// is the machine-readable marker: "VERSION_CONFLICT" is what callers grep
/// for to distinguish a stale-version retry from a hard failure.
pub(crate) fn store_error_code(err: &StoreError) -> &'static str {
    match err {
        StoreError::Io(_) | StoreError::Sql(_) => "STORE_ERROR",
        StoreError::InvalidInput(_) => "INVALID_INPUT",
        StoreError::VersionConflict { .. } => "VERSION_CONFLICT",
        StoreError::UnknownId => "NOT_FOUND",
        StoreError::AlreadyExists => "ALREADY_EXISTS",
        StoreError::HierarchyCycle
        | StoreError::HierarchyDepthExceeded
        | StoreError::DependencyCycle => "CYCLE_DETECTED",
    }
}

pub(crate) fn format_store_error(err: &StoreError) -> String {
    match err {
        // Infrastructure detail goes to the session log, not to callers.
        StoreError::Io(_) | StoreError::Sql(_) => "store failure".to_string(),
        StoreError::InvalidInput(msg) => (*msg).to_string(),
        StoreError::VersionConflict { expected, actual } => {
            format!("version conflict (expected={expected}, actual={actual})")
        }
        StoreError::UnknownId => "unknown id".to_string(),
        StoreError::AlreadyExists => "already exists".to_string(),
        StoreError::HierarchyCycle => {
            "move rejected: task would become its own ancestor".to_string()
        }
        StoreError::HierarchyDepthExceeded => "task hierarchy depth exceeded".to_string(),
        StoreError::DependencyCycle => {
            "dependency rejected: edge would close a cycle".to_string()
        }
    }
}
