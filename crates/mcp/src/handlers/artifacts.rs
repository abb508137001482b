#![forbid(unsafe_code)]

use super::artifact_payload;
use crate::{
    McpServer, ai_error, ai_ok, optional_i64, optional_nullable_string, optional_string,
    require_string,
};
use serde_json::{Value, json};
use wbs_storage::{ArtifactCreateRequest, ArtifactUpdateRequest};

pub(crate) fn tool_create_artifact(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let title = match require_string(args, "title") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let uri = match optional_string(args, "uri") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let description = match optional_string(args, "description") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.artifact_create(ArtifactCreateRequest {
        title,
        uri,
        description,
    }) {
        Ok(row) => ai_ok(artifact_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_get_artifact(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let id = match require_string(args, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.artifact_get(&id) {
        Ok(row) => ai_ok(artifact_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_update_artifact(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let id = match require_string(args, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let expected_version = match optional_i64(args, "ifVersion") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let title = match optional_string(args, "title") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let uri = match optional_nullable_string(args, "uri") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let description = match optional_nullable_string(args, "description") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.artifact_update(ArtifactUpdateRequest {
        id,
        expected_version,
        title,
        uri,
        description,
    }) {
        Ok(row) => ai_ok(artifact_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_delete_artifact(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let id = match require_string(args, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.artifact_delete(&id) {
        Ok(()) => ai_ok(json!({ "id": id, "deleted": true })),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_list_artifacts(server: &mut McpServer, args: Value) -> Value {
    if !args.is_object() && !args.is_null() {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    }

    match server.store.artifact_list() {
        Ok(rows) => ai_ok(json!({
            "artifacts": rows.iter().map(artifact_payload).collect::<Vec<_>>()
        })),
        Err(err) => server.store_failure(err),
    }
}
