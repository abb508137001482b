#![forbid(unsafe_code)]

use super::dependency_payload;
use crate::{McpServer, ai_error, ai_ok, optional_string, optional_string_list, require_string};
use serde_json::{Value, json};
use wbs_storage::{DependencyCreateRequest, DependencyUpdateRequest};

pub(crate) fn tool_create_dependency(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let dependee_task_id = match require_string(args, "dependeeTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let dependency_task_id = match require_string(args, "dependencyTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let artifact_ids = match optional_string_list(args, "artifactIds") {
        Ok(v) => v.unwrap_or_default(),
        Err(resp) => return resp,
    };

    match server.store.dependency_create(DependencyCreateRequest {
        dependee_task_id,
        dependency_task_id,
        artifact_ids,
    }) {
        Ok(row) => ai_ok(dependency_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_update_dependency(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let dependee_task_id = match require_string(args, "dependeeTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let dependency_task_id = match require_string(args, "dependencyTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let new_dependee_task_id = match optional_string(args, "newDependeeTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let new_dependency_task_id = match optional_string(args, "newDependencyTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let artifact_ids = match optional_string_list(args, "artifactIds") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.dependency_update(DependencyUpdateRequest {
        dependee_task_id,
        dependency_task_id,
        new_dependee_task_id,
        new_dependency_task_id,
        artifact_ids,
    }) {
        Ok(row) => ai_ok(dependency_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_delete_dependency(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let dependee_task_id = match require_string(args, "dependeeTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let dependency_task_id = match require_string(args, "dependencyTaskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server
        .store
        .dependency_delete(&dependee_task_id, &dependency_task_id)
    {
        Ok(()) => ai_ok(json!({
            "dependeeTaskId": dependee_task_id,
            "dependencyTaskId": dependency_task_id,
            "deleted": true
        })),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_list_dependencies(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let task_id = match optional_string(args, "taskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.dependency_list(task_id.as_deref()) {
        Ok(rows) => ai_ok(json!({
            "dependencies": rows.iter().map(dependency_payload).collect::<Vec<_>>()
        })),
        Err(err) => server.store_failure(err),
    }
}
