#![forbid(unsafe_code)]

use wbs_core::model::{ArtifactRole, TaskStatus};

#[derive(Clone, Debug)]
pub struct TaskRow {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub status: TaskStatus,
    pub estimate: Option<String>,
    pub version: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct TaskSummaryRow {
    pub task: TaskRow,
    pub child_count: i64,
}

/// Full read view of one task: the row plus its ordered artifact
/// assignments and completion conditions.
#[derive(Clone, Debug)]
pub struct TaskDetail {
    pub task: TaskRow,
    pub deliverables: Vec<AssignmentRow>,
    pub prerequisites: Vec<AssignmentRow>,
    pub completion_conditions: Vec<String>,
    pub child_count: i64,
}

#[derive(Clone, Debug)]
pub struct ArtifactRow {
    pub id: String,
    pub title: String,
    pub uri: Option<String>,
    pub description: Option<String>,
    pub version: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AssignmentRow {
    pub artifact_id: String,
    pub role: ArtifactRole,
    pub crud_operation: Option<String>,
    pub order_index: i64,
}

#[derive(Clone, Debug)]
pub struct DependencyRow {
    pub dependee_task_id: String,
    pub dependency_task_id: String,
    pub artifact_ids: Vec<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct HistoryRow {
    pub seq: i64,
    pub task_id: String,
    pub event_type: String,
    pub payload_json: String,
    pub ts_ms: i64,
}

#[derive(Clone, Debug, Default)]
pub struct TaskCreateRequest {
    pub parent_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<TaskStatus>,
    pub estimate: Option<String>,
}

/// One entry in an ordered artifact-assignment list. The order index is
/// positional; the store renumbers on every replacement.
#[derive(Clone, Debug)]
pub struct AssignmentInput {
    pub artifact_id: String,
    pub crud_operation: Option<String>,
}

/// Partial task update. Outer `None` means "leave unchanged"; for the
/// nullable columns the inner `Option` distinguishes set from clear.
#[derive(Clone, Debug, Default)]
pub struct TaskUpdateRequest {
    pub id: String,
    pub expected_version: Option<i64>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub assignee: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub estimate: Option<Option<String>>,
    pub deliverables: Option<Vec<AssignmentInput>>,
    pub prerequisites: Option<Vec<AssignmentInput>>,
    pub completion_conditions: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct TaskImportEntry {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<TaskStatus>,
    pub estimate: Option<String>,
    pub children: Vec<TaskImportEntry>,
}

#[derive(Clone, Debug, Default)]
pub struct ArtifactCreateRequest {
    pub title: String,
    pub uri: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ArtifactUpdateRequest {
    pub id: String,
    pub expected_version: Option<i64>,
    pub title: Option<String>,
    pub uri: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

#[derive(Clone, Debug)]
pub struct DependencyCreateRequest {
    pub dependee_task_id: String,
    pub dependency_task_id: String,
    pub artifact_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DependencyUpdateRequest {
    pub dependee_task_id: String,
    pub dependency_task_id: String,
    pub new_dependee_task_id: Option<String>,
    pub new_dependency_task_id: Option<String>,
    pub artifact_ids: Option<Vec<String>>,
}
