#![forbid(unsafe_code)]

mod support;
use support::*;

use serde_json::{Value, json};

fn create_task(server: &mut Server, title: &str) -> String {
    let envelope = server.call_tool("createTask", json!({ "title": title }));
    assert!(envelope_success(&envelope));
    envelope_result(&envelope)
        .get("id")
        .and_then(|v| v.as_str())
        .expect("task id")
        .to_string()
}

fn create_edge(server: &mut Server, dependee: &str, dependency: &str) -> Value {
    server.call_tool(
        "createDependency",
        json!({ "dependeeTaskId": dependee, "dependencyTaskId": dependency }),
    )
}

#[test]
fn direct_cycle_is_rejected() {
    let mut server = Server::start_initialized("dep_direct_cycle");
    let x = create_task(&mut server, "x");
    let y = create_task(&mut server, "y");

    let first = create_edge(&mut server, &x, &y);
    assert!(envelope_success(&first));

    let reverse = create_edge(&mut server, &y, &x);
    assert!(!envelope_success(&reverse));
    assert_eq!(envelope_error_code(&reverse), Some("CYCLE_DETECTED"));
}

#[test]
fn self_edge_is_always_rejected() {
    let mut server = Server::start_initialized("dep_self_edge");
    let x = create_task(&mut server, "x");

    let envelope = create_edge(&mut server, &x, &x);
    assert!(!envelope_success(&envelope));
    assert_eq!(envelope_error_code(&envelope), Some("CYCLE_DETECTED"));
}

#[test]
fn transitive_cycle_is_rejected() {
    let mut server = Server::start_initialized("dep_transitive");
    let a = create_task(&mut server, "a");
    let b = create_task(&mut server, "b");
    let c = create_task(&mut server, "c");
    let d = create_task(&mut server, "d");

    for (dependee, dependency) in [(&a, &b), (&b, &c), (&c, &d)] {
        assert!(envelope_success(&create_edge(&mut server, dependee, dependency)));
    }

    let closing = create_edge(&mut server, &d, &a);
    assert!(!envelope_success(&closing));
    assert_eq!(envelope_error_code(&closing), Some("CYCLE_DETECTED"));

    // A diamond (two paths, no cycle) stays legal.
    let diamond = create_edge(&mut server, &a, &d);
    assert!(envelope_success(&diamond));
}

#[test]
fn duplicate_ordered_pair_is_rejected() {
    let mut server = Server::start_initialized("dep_duplicate");
    let x = create_task(&mut server, "x");
    let y = create_task(&mut server, "y");

    assert!(envelope_success(&create_edge(&mut server, &x, &y)));
    let duplicate = create_edge(&mut server, &x, &y);
    assert!(!envelope_success(&duplicate));
    assert_eq!(envelope_error_code(&duplicate), Some("ALREADY_EXISTS"));
}

#[test]
fn endpoints_must_exist() {
    let mut server = Server::start_initialized("dep_endpoints");
    let x = create_task(&mut server, "x");

    let envelope = create_edge(&mut server, &x, "TASK-999");
    assert!(!envelope_success(&envelope));
    assert_eq!(envelope_error_code(&envelope), Some("NOT_FOUND"));
}

#[test]
fn update_reruns_the_cycle_check_on_new_endpoints() {
    let mut server = Server::start_initialized("dep_update_recheck");
    let a = create_task(&mut server, "a");
    let b = create_task(&mut server, "b");
    let c = create_task(&mut server, "c");

    assert!(envelope_success(&create_edge(&mut server, &a, &b)));

    // Reversing the lone edge is fine: the old edge is excluded from the
    // BFS while the new endpoints are checked.
    let reversed = server.call_tool(
        "updateDependency",
        json!({
            "dependeeTaskId": a,
            "dependencyTaskId": b,
            "newDependeeTaskId": b,
            "newDependencyTaskId": a
        }),
    );
    assert!(envelope_success(&reversed));
    assert_eq!(
        envelope_result(&reversed)
            .get("dependeeTaskId")
            .and_then(|v| v.as_str()),
        Some(b.as_str())
    );

    assert!(envelope_success(&create_edge(&mut server, &a, &c)));

    // With b->a in place, re-targeting a->c into a->b closes a two-cycle.
    let closing = server.call_tool(
        "updateDependency",
        json!({
            "dependeeTaskId": a,
            "dependencyTaskId": c,
            "newDependencyTaskId": b
        }),
    );
    assert!(!envelope_success(&closing));
    assert_eq!(envelope_error_code(&closing), Some("CYCLE_DETECTED"));
}

#[test]
fn artifact_lists_validate_and_round_trip() {
    let mut server = Server::start_initialized("dep_artifacts");
    let x = create_task(&mut server, "x");
    let y = create_task(&mut server, "y");

    let bogus = server.call_tool(
        "createDependency",
        json!({ "dependeeTaskId": x, "dependencyTaskId": y, "artifactIds": ["ART-999"] }),
    );
    assert!(!envelope_success(&bogus));
    assert_eq!(envelope_error_code(&bogus), Some("NOT_FOUND"));

    let artifact = server.call_tool("createArtifact", json!({ "title": "interface" }));
    let artifact_id = envelope_result(&artifact)
        .get("id")
        .and_then(|v| v.as_str())
        .expect("artifact id")
        .to_string();

    let edge = server.call_tool(
        "createDependency",
        json!({ "dependeeTaskId": x, "dependencyTaskId": y, "artifactIds": [artifact_id] }),
    );
    assert!(envelope_success(&edge));

    let listed = server.call_tool("listDependencies", json!({ "taskId": x }));
    let edges = envelope_result(&listed)
        .get("dependencies")
        .and_then(|v| v.as_array())
        .expect("dependencies");
    assert_eq!(edges.len(), 1);
    assert_eq!(
        edges[0]
            .get("artifactIds")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(1)
    );

    // Replacing the artifact list alone keeps the endpoints.
    let cleared = server.call_tool(
        "updateDependency",
        json!({ "dependeeTaskId": x, "dependencyTaskId": y, "artifactIds": [] }),
    );
    assert!(envelope_success(&cleared));
    assert_eq!(
        envelope_result(&cleared)
            .get("artifactIds")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(0)
    );
}

#[test]
fn delete_removes_exactly_one_edge() {
    let mut server = Server::start_initialized("dep_delete");
    let x = create_task(&mut server, "x");
    let y = create_task(&mut server, "y");
    let z = create_task(&mut server, "z");

    assert!(envelope_success(&create_edge(&mut server, &x, &y)));
    assert!(envelope_success(&create_edge(&mut server, &x, &z)));

    let deleted = server.call_tool(
        "deleteDependency",
        json!({ "dependeeTaskId": x, "dependencyTaskId": y }),
    );
    assert!(envelope_success(&deleted));

    let again = server.call_tool(
        "deleteDependency",
        json!({ "dependeeTaskId": x, "dependencyTaskId": y }),
    );
    assert!(!envelope_success(&again));
    assert_eq!(envelope_error_code(&again), Some("NOT_FOUND"));

    let listed = server.call_tool("listDependencies", json!({}));
    let edges = envelope_result(&listed)
        .get("dependencies")
        .and_then(|v| v.as_array())
        .expect("dependencies");
    assert_eq!(edges.len(), 1);
    assert_eq!(
        edges[0].get("dependencyTaskId").and_then(|v| v.as_str()),
        Some(z.as_str())
    );
}
