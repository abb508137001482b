#![forbid(unsafe_code)]

pub(crate) mod artifacts;
pub(crate) mod dependencies;
pub(crate) mod tasks;

use crate::ts_ms_to_rfc3339;
use serde_json::{Value, json};
use wbs_storage::{ArtifactRow, AssignmentRow, DependencyRow, TaskDetail, TaskRow};

pub(crate) fn task_payload(row: &TaskRow) -> Value {
    json!({
        "id": row.id,
        "parentId": row.parent_id,
        "title": row.title,
        "description": row.description,
        "assignee": row.assignee,
        "status": row.status.as_str(),
        "estimate": row.estimate,
        "version": row.version,
        "createdAt": ts_ms_to_rfc3339(row.created_at_ms),
        "updatedAt": ts_ms_to_rfc3339(row.updated_at_ms)
    })
}

pub(crate) fn task_detail_payload(detail: &TaskDetail) -> Value {
    let mut out = task_payload(&detail.task);
    if let Some(obj) = out.as_object_mut() {
        obj.insert(
            "deliverables".to_string(),
            Value::Array(detail.deliverables.iter().map(assignment_payload).collect()),
        );
        obj.insert(
            "prerequisites".to_string(),
            Value::Array(detail.prerequisites.iter().map(assignment_payload).collect()),
        );
        obj.insert(
            "completionConditions".to_string(),
            json!(detail.completion_conditions),
        );
        obj.insert("childCount".to_string(), json!(detail.child_count));
    }
    out
}

fn assignment_payload(row: &AssignmentRow) -> Value {
    json!({
        "artifactId": row.artifact_id,
        "role": row.role.as_str(),
        "crudOperation": row.crud_operation,
        "orderIndex": row.order_index
    })
}

pub(crate) fn artifact_payload(row: &ArtifactRow) -> Value {
    json!({
        "id": row.id,
        "title": row.title,
        "uri": row.uri,
        "description": row.description,
        "version": row.version,
        "createdAt": ts_ms_to_rfc3339(row.created_at_ms),
        "updatedAt": ts_ms_to_rfc3339(row.updated_at_ms)
    })
}

pub(crate) fn dependency_payload(row: &DependencyRow) -> Value {
    json!({
        "dependeeTaskId": row.dependee_task_id,
        "dependencyTaskId": row.dependency_task_id,
        "artifactIds": row.artifact_ids,
        "createdAt": ts_ms_to_rfc3339(row.created_at_ms),
        "updatedAt": ts_ms_to_rfc3339(row.updated_at_ms)
    })
}
