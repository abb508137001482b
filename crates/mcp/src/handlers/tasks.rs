#![forbid(unsafe_code)]

use super::{task_detail_payload, task_payload};
use crate::{
    McpServer, ai_error, ai_ok, optional_i64, optional_nullable_string, optional_status,
    optional_string, optional_string_list, require_string,
};
use serde_json::{Value, json};
use wbs_storage::{AssignmentInput, TaskCreateRequest, TaskImportEntry, TaskUpdateRequest};

pub(crate) fn tool_create_task(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let parent_id = match optional_string(args, "parentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let title = match require_string(args, "title") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let description = match optional_string(args, "description") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let assignee = match optional_string(args, "assignee") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match optional_status(args, "status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let estimate = match optional_string(args, "estimate") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.task_create(TaskCreateRequest {
        parent_id,
        title,
        description,
        assignee,
        status,
        estimate,
    }) {
        Ok(row) => ai_ok(task_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_get_task(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let id = match require_string(args, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.task_get(&id) {
        Ok(detail) => ai_ok(task_detail_payload(&detail)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_update_task(server: &mut McpServer, args: Value) -> Value {
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
    let description = match optional_nullable_string(args, "description") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let assignee = match optional_nullable_string(args, "assignee") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match optional_status(args, "status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let estimate = match optional_nullable_string(args, "estimate") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let deliverables = match optional_assignment_list(args, "deliverables") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let prerequisites = match optional_assignment_list(args, "prerequisites") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let completion_conditions = match optional_string_list(args, "completionConditions") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.task_update(TaskUpdateRequest {
        id,
        expected_version,
        title,
        description,
        assignee,
        status,
        estimate,
        deliverables,
        prerequisites,
        completion_conditions,
    }) {
        Ok(row) => ai_ok(task_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_list_tasks(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let parent_id = match optional_string(args, "parentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.task_list(parent_id.as_deref()) {
        Ok(rows) => {
            let tasks: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let mut out = task_payload(&row.task);
                    if let Some(obj) = out.as_object_mut() {
                        obj.insert("childCount".to_string(), json!(row.child_count));
                    }
                    out
                })
                .collect();
            ai_ok(json!({ "tasks": tasks }))
        }
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_delete_task(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let id = match require_string(args, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.task_delete(&id) {
        Ok(deleted) => ai_ok(json!({ "id": id, "deleted": deleted })),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_move_task(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let id = match require_string(args, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Omitted and explicit-null both mean "detach to root".
    let new_parent_id = match optional_nullable_string(args, "newParentId") {
        Ok(v) => v.flatten(),
        Err(resp) => return resp,
    };

    match server.store.task_move(&id, new_parent_id.as_deref()) {
        Ok(row) => ai_ok(task_payload(&row)),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_import_tasks(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let parent_id = match optional_string(args, "parentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw_entries) = args.get("tasks").and_then(|v| v.as_array()) else {
        return ai_error("INVALID_INPUT", "tasks must be an array");
    };

    let mut entries = Vec::with_capacity(raw_entries.len());
    for raw in raw_entries {
        match parse_import_entry(raw) {
            Ok(entry) => entries.push(entry),
            Err(resp) => return resp,
        }
    }

    match server.store.task_import(parent_id.as_deref(), entries) {
        Ok(created) => ai_ok(json!({ "created": created })),
        Err(err) => server.store_failure(err),
    }
}

pub(crate) fn tool_get_task_history(server: &mut McpServer, args: Value) -> Value {
    let Some(args) = args.as_object() else {
        return ai_error("INVALID_INPUT", "arguments must be an object");
    };
    let task_id = match require_string(args, "taskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match server.store.task_history(&task_id) {
        Ok(rows) => {
            let history: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let payload = serde_json::from_str::<Value>(&row.payload_json)
                        .unwrap_or(Value::Null);
                    json!({
                        "seq": row.seq,
                        "event": row.event_type,
                        "payload": payload,
                        "at": crate::ts_ms_to_rfc3339(row.ts_ms)
                    })
                })
                .collect();
            ai_ok(json!({ "taskId": task_id, "history": history }))
        }
        Err(err) => server.store_failure(err),
    }
}

fn optional_assignment_list(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<AssignmentInput>>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Some(obj) = item.as_object() else {
                    return Err(ai_error(
                        "INVALID_INPUT",
                        &format!("{key} entries must be objects"),
                    ));
                };
                let artifact_id = require_string(obj, "artifactId")?;
                let crud_operation = optional_string(obj, "crudOperation")?;
                out.push(AssignmentInput {
                    artifact_id,
                    crud_operation,
                });
            }
            Ok(Some(out))
        }
        _ => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be an array"),
        )),
    }
}

fn parse_import_entry(value: &Value) -> Result<TaskImportEntry, Value> {
    let Some(obj) = value.as_object() else {
        return Err(ai_error("INVALID_INPUT", "tasks entries must be objects"));
    };
    let title = require_string(obj, "title")?;
    let description = optional_string(obj, "description")?;
    let assignee = optional_string(obj, "assignee")?;
    let status = optional_status(obj, "status")?;
    let estimate = optional_string(obj, "estimate")?;

    let mut children = Vec::new();
    if let Some(raw_children) = obj.get("children") {
        match raw_children {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    children.push(parse_import_entry(item)?);
                }
            }
            _ => {
                return Err(ai_error("INVALID_INPUT", "children must be an array"));
            }
        }
    }

    Ok(TaskImportEntry {
        title,
        description,
        assignee,
        status,
        estimate,
        children,
    })
}
