#![forbid(unsafe_code)]

mod support;
use support::*;

use serde_json::{Value, json};

fn create_task(server: &mut Server, arguments: Value) -> String {
    let envelope = server.call_tool("createTask", arguments);
    assert!(envelope_success(&envelope), "createTask failed: {envelope}");
    envelope_result(&envelope)
        .get("id")
        .and_then(|v| v.as_str())
        .expect("created task id")
        .to_string()
}

#[test]
fn create_then_get_round_trips_fields() {
    let mut server = Server::start_initialized("task_round_trip");

    let envelope = server.call_tool(
        "createTask",
        json!({
            "title": "Design schema",
            "description": "six tables",
            "assignee": "ada",
            "status": "in-progress",
            "estimate": "2d"
        }),
    );
    assert!(envelope_success(&envelope));
    let created = envelope_result(&envelope);
    assert_eq!(created.get("version").and_then(|v| v.as_i64()), Some(1));
    let id = created.get("id").and_then(|v| v.as_str()).expect("id");

    let fetched = server.call_tool("getTask", json!({ "id": id }));
    assert!(envelope_success(&fetched));
    let task = envelope_result(&fetched);
    assert_eq!(task.get("title").and_then(|v| v.as_str()), Some("Design schema"));
    assert_eq!(task.get("description").and_then(|v| v.as_str()), Some("six tables"));
    assert_eq!(task.get("assignee").and_then(|v| v.as_str()), Some("ada"));
    assert_eq!(task.get("status").and_then(|v| v.as_str()), Some("in-progress"));
    assert_eq!(task.get("estimate").and_then(|v| v.as_str()), Some("2d"));
    assert_eq!(task.get("parentId"), Some(&Value::Null));
    assert_eq!(task.get("childCount").and_then(|v| v.as_i64()), Some(0));
}

#[test]
fn get_unknown_task_is_not_found() {
    let mut server = Server::start_initialized("task_not_found");

    let envelope = server.call_tool("getTask", json!({ "id": "TASK-999" }));
    assert!(!envelope_success(&envelope));
    assert_eq!(envelope_error_code(&envelope), Some("NOT_FOUND"));
}

#[test]
fn missing_required_argument_is_invalid_input() {
    let mut server = Server::start_initialized("task_missing_arg");

    let envelope = server.call_tool("createTask", json!({}));
    assert!(!envelope_success(&envelope));
    assert_eq!(envelope_error_code(&envelope), Some("INVALID_INPUT"));

    let envelope = server.call_tool("createTask", json!({ "title": "x", "status": "done" }));
    assert_eq!(envelope_error_code(&envelope), Some("INVALID_INPUT"));
}

#[test]
fn update_respects_if_version_exactly() {
    let mut server = Server::start_initialized("task_if_version");
    let id = create_task(&mut server, json!({ "title": "root" }));

    let first = server.call_tool(
        "updateTask",
        json!({ "id": id, "title": "x", "ifVersion": 1 }),
    );
    assert!(envelope_success(&first));
    assert_eq!(
        envelope_result(&first).get("version").and_then(|v| v.as_i64()),
        Some(2)
    );

    // Same ifVersion again: exactly one of two racing writers wins.
    let second = server.call_tool(
        "updateTask",
        json!({ "id": id, "title": "y", "ifVersion": 1 }),
    );
    assert!(!envelope_success(&second));
    assert_eq!(envelope_error_code(&second), Some("VERSION_CONFLICT"));

    let fetched = server.call_tool("getTask", json!({ "id": id }));
    let task = envelope_result(&fetched);
    assert_eq!(task.get("title").and_then(|v| v.as_str()), Some("x"));
    assert_eq!(task.get("version").and_then(|v| v.as_i64()), Some(2));
}

#[test]
fn conflict_marker_is_greppable_in_the_text_payload() {
    let mut server = Server::start_initialized("task_conflict_marker");
    let id = create_task(&mut server, json!({ "title": "root" }));
    let _ = server.call_tool("updateTask", json!({ "id": id, "title": "x", "ifVersion": 1 }));

    let resp = server.request(json!({
        "jsonrpc": "2.0",
        "id": 50,
        "method": "tools/call",
        "params": { "name": "updateTask", "arguments": { "id": id, "title": "y", "ifVersion": 1 } }
    }));
    let text = resp
        .get("result")
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("text"))
        .and_then(|v| v.as_str())
        .expect("text");
    assert!(
        text.contains("VERSION_CONFLICT"),
        "conflict marker must be visible in the raw text payload"
    );
}

#[test]
fn update_without_if_version_merges_and_bumps() {
    let mut server = Server::start_initialized("task_merge");
    let id = create_task(&mut server, json!({ "title": "root" }));

    let envelope = server.call_tool(
        "updateTask",
        json!({ "id": id, "status": "blocked", "description": "waiting on review" }),
    );
    assert!(envelope_success(&envelope));
    let task = envelope_result(&envelope);
    assert_eq!(task.get("status").and_then(|v| v.as_str()), Some("blocked"));
    assert_eq!(task.get("title").and_then(|v| v.as_str()), Some("root"));
    assert_eq!(task.get("version").and_then(|v| v.as_i64()), Some(2));

    // Explicit null clears a nullable field.
    let cleared = server.call_tool("updateTask", json!({ "id": id, "description": null }));
    assert!(envelope_success(&cleared));
    assert_eq!(
        envelope_result(&cleared).get("description"),
        Some(&Value::Null)
    );
}

#[test]
fn permissive_status_transitions_are_allowed() {
    let mut server = Server::start_initialized("task_status_permissive");
    let id = create_task(&mut server, json!({ "title": "root", "status": "completed" }));

    // completed -> pending is deliberately legal.
    let envelope = server.call_tool("updateTask", json!({ "id": id, "status": "pending" }));
    assert!(envelope_success(&envelope));
    assert_eq!(
        envelope_result(&envelope).get("status").and_then(|v| v.as_str()),
        Some("pending")
    );
}

#[test]
fn move_into_descendant_or_self_is_cycle_detected() {
    let mut server = Server::start_initialized("task_move_cycle");
    let a = create_task(&mut server, json!({ "title": "a" }));
    let b = create_task(&mut server, json!({ "title": "b", "parentId": a }));
    let c = create_task(&mut server, json!({ "title": "c", "parentId": b }));

    for target in [&a, &b, &c] {
        let envelope = server.call_tool("moveTask", json!({ "id": a, "newParentId": target }));
        assert!(!envelope_success(&envelope));
        assert_eq!(envelope_error_code(&envelope), Some("CYCLE_DETECTED"));
    }

    // Nothing mutated by the rejections.
    let fetched = server.call_tool("getTask", json!({ "id": a }));
    let task = envelope_result(&fetched);
    assert_eq!(task.get("parentId"), Some(&Value::Null));
    assert_eq!(task.get("version").and_then(|v| v.as_i64()), Some(1));
}

#[test]
fn move_reparents_and_null_detaches() {
    let mut server = Server::start_initialized("task_move_ok");
    let a = create_task(&mut server, json!({ "title": "a" }));
    let b = create_task(&mut server, json!({ "title": "b" }));
    let c = create_task(&mut server, json!({ "title": "c", "parentId": a }));

    let moved = server.call_tool("moveTask", json!({ "id": c, "newParentId": b }));
    assert!(envelope_success(&moved));
    assert_eq!(
        envelope_result(&moved).get("parentId").and_then(|v| v.as_str()),
        Some(b.as_str())
    );

    let detached = server.call_tool("moveTask", json!({ "id": c, "newParentId": null }));
    assert!(envelope_success(&detached));
    assert_eq!(envelope_result(&detached).get("parentId"), Some(&Value::Null));
}

#[test]
fn list_tasks_annotates_child_counts() {
    let mut server = Server::start_initialized("task_list");
    let a = create_task(&mut server, json!({ "title": "a" }));
    let _b = create_task(&mut server, json!({ "title": "b" }));
    let _a1 = create_task(&mut server, json!({ "title": "a1", "parentId": a }));
    let _a2 = create_task(&mut server, json!({ "title": "a2", "parentId": a }));

    let roots = server.call_tool("listTasks", json!({}));
    assert!(envelope_success(&roots));
    let tasks = envelope_result(&roots)
        .get("tasks")
        .and_then(|v| v.as_array())
        .expect("tasks");
    assert_eq!(tasks.len(), 2);
    let a_row = tasks
        .iter()
        .find(|t| t.get("id").and_then(|v| v.as_str()) == Some(a.as_str()))
        .expect("a row");
    assert_eq!(a_row.get("childCount").and_then(|v| v.as_i64()), Some(2));

    let children = server.call_tool("listTasks", json!({ "parentId": a }));
    let rows = envelope_result(&children)
        .get("tasks")
        .and_then(|v| v.as_array())
        .expect("children");
    assert_eq!(rows.len(), 2);
}

#[test]
fn cascade_delete_removes_subtree_and_dependent_rows() {
    let mut server = Server::start_initialized("task_cascade");
    let root = create_task(&mut server, json!({ "title": "root" }));
    let child = create_task(&mut server, json!({ "title": "child", "parentId": root }));
    let grandchild = create_task(&mut server, json!({ "title": "grandchild", "parentId": child }));
    let outsider = create_task(&mut server, json!({ "title": "outsider" }));

    let artifact = server.call_tool("createArtifact", json!({ "title": "spec" }));
    let artifact_id = envelope_result(&artifact)
        .get("id")
        .and_then(|v| v.as_str())
        .expect("artifact id")
        .to_string();
    let attach = server.call_tool(
        "updateTask",
        json!({
            "id": child,
            "deliverables": [{ "artifactId": artifact_id }],
            "completionConditions": ["reviewed"]
        }),
    );
    assert!(envelope_success(&attach));
    let edge = server.call_tool(
        "createDependency",
        json!({ "dependeeTaskId": outsider, "dependencyTaskId": grandchild }),
    );
    assert!(envelope_success(&edge));

    let deleted = server.call_tool("deleteTask", json!({ "id": root }));
    assert!(envelope_success(&deleted));
    assert_eq!(
        envelope_result(&deleted).get("deleted").and_then(|v| v.as_i64()),
        Some(3)
    );

    for id in [&root, &child, &grandchild] {
        let envelope = server.call_tool("getTask", json!({ "id": id }));
        assert_eq!(envelope_error_code(&envelope), Some("NOT_FOUND"));
    }

    let survivor = server.call_tool("getTask", json!({ "id": outsider }));
    assert!(envelope_success(&survivor));

    let edges = server.call_tool("listDependencies", json!({}));
    assert_eq!(
        envelope_result(&edges)
            .get("dependencies")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(0)
    );

    // The artifact itself survives; only its assignments went away.
    let artifact_after = server.call_tool("getArtifact", json!({ "id": artifact_id }));
    assert!(envelope_success(&artifact_after));
}

#[test]
fn import_tasks_builds_a_nested_forest() {
    let mut server = Server::start_initialized("task_import");
    let root = create_task(&mut server, json!({ "title": "root" }));

    let envelope = server.call_tool(
        "importTasks",
        json!({
            "parentId": root,
            "tasks": [
                {
                    "title": "phase 1",
                    "children": [
                        { "title": "step a", "status": "blocked" },
                        { "title": "step b" }
                    ]
                },
                { "title": "phase 2" }
            ]
        }),
    );
    assert!(envelope_success(&envelope));
    let created: Vec<String> = envelope_result(&envelope)
        .get("created")
        .and_then(|v| v.as_array())
        .expect("created ids")
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    assert_eq!(created.len(), 4);

    let root_detail = server.call_tool("getTask", json!({ "id": root }));
    assert_eq!(
        envelope_result(&root_detail).get("childCount").and_then(|v| v.as_i64()),
        Some(2)
    );

    // All-or-nothing: a bad entry rolls the whole import back.
    let failed = server.call_tool(
        "importTasks",
        json!({ "tasks": [ { "title": "ok" }, { "title": "" } ] }),
    );
    assert!(!envelope_success(&failed));
    let roots = server.call_tool("listTasks", json!({}));
    let count = envelope_result(&roots)
        .get("tasks")
        .and_then(|v| v.as_array())
        .map(|v| v.len())
        .expect("roots");
    assert_eq!(count, 1, "failed import must not leave partial rows");
}

#[test]
fn history_is_an_append_only_audit_trail() {
    let mut server = Server::start_initialized("task_history");
    let id = create_task(&mut server, json!({ "title": "root" }));
    let _ = server.call_tool("updateTask", json!({ "id": id, "title": "renamed" }));
    let _ = server.call_tool("moveTask", json!({ "id": id }));
    let _ = server.call_tool("deleteTask", json!({ "id": id }));

    let envelope = server.call_tool("getTaskHistory", json!({ "taskId": id }));
    assert!(envelope_success(&envelope));
    let events: Vec<&str> = envelope_result(&envelope)
        .get("history")
        .and_then(|v| v.as_array())
        .expect("history")
        .iter()
        .filter_map(|row| row.get("event").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(events, vec!["created", "updated", "moved", "deleted"]);
}
