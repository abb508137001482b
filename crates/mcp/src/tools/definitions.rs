#![forbid(unsafe_code)]

use serde_json::{Value, json};

fn status_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["pending", "in-progress", "completed", "blocked"]
    })
}

fn assignment_list_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": {
            "type": "object",
            "properties": {
                "artifactId": { "type": "string" },
                "crudOperation": { "type": "string", "description": "Optional CRUD tag for the assignment." }
            },
            "required": ["artifactId"]
        }
    })
}

fn import_entry_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "description": { "type": "string" },
            "assignee": { "type": "string" },
            "status": status_schema(),
            "estimate": { "type": "string" },
            "children": {
                "type": "array",
                "description": "Nested sub-tasks, same shape as the entry itself.",
                "items": { "type": "object" }
            }
        },
        "required": ["title"]
    })
}

pub(crate) fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "createTask",
            "description": "Create a task, optionally under a parent. Returns the created record with version 1.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "parentId": { "type": "string", "description": "Parent task id; omit for a root task." },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "assignee": { "type": "string" },
                    "status": status_schema(),
                    "estimate": { "type": "string", "description": "Free-form effort estimate." }
                },
                "required": ["title"]
            }
        }),
        json!({
            "name": "getTask",
            "description": "Fetch one task with its artifact assignments, completion conditions and child count.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" }
                },
                "required": ["id"]
            }
        }),
        json!({
            "name": "updateTask",
            "description": "Merge fields into a task. Pass ifVersion for optimistic concurrency; a stale value is rejected with VERSION_CONFLICT and nothing changes. Deliverable/prerequisite/completion lists are replaced as ordered units when supplied.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "ifVersion": { "type": "integer", "description": "Expected current version." },
                    "title": { "type": "string" },
                    "description": { "type": ["string", "null"] },
                    "assignee": { "type": ["string", "null"] },
                    "status": status_schema(),
                    "estimate": { "type": ["string", "null"] },
                    "deliverables": assignment_list_schema("Full desired deliverable list, in order."),
                    "prerequisites": assignment_list_schema("Full desired prerequisite list, in order."),
                    "completionConditions": {
                        "type": "array",
                        "description": "Full desired condition list, in order.",
                        "items": { "type": "string" }
                    }
                },
                "required": ["id"]
            }
        }),
        json!({
            "name": "listTasks",
            "description": "List immediate children of a parent (roots when omitted), each with a child count.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "parentId": { "type": "string" }
                }
            }
        }),
        json!({
            "name": "deleteTask",
            "description": "Delete a task and its whole descendant subtree, including artifact assignments, completion conditions and dependency edges.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" }
                },
                "required": ["id"]
            }
        }),
        json!({
            "name": "moveTask",
            "description": "Re-parent a task. Rejected with CYCLE_DETECTED when the new parent is the task itself or one of its descendants. Null or omitted newParentId moves it to the root.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "newParentId": { "type": ["string", "null"] }
                },
                "required": ["id"]
            }
        }),
        json!({
            "name": "importTasks",
            "description": "Bulk-import a task forest in one transaction. Entries may nest children; returns the created ids.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "parentId": { "type": "string", "description": "Existing task to import under; omit for roots." },
                    "tasks": {
                        "type": "array",
                        "items": import_entry_schema()
                    }
                },
                "required": ["tasks"]
            }
        }),
        json!({
            "name": "getTaskHistory",
            "description": "Read the append-only audit trail for a task id, oldest first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "taskId": { "type": "string" }
                },
                "required": ["taskId"]
            }
        }),
        json!({
            "name": "createArtifact",
            "description": "Create an artifact. Returns the created record with version 1.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "uri": { "type": "string" },
                    "description": { "type": "string" }
                },
                "required": ["title"]
            }
        }),
        json!({
            "name": "getArtifact",
            "description": "Fetch one artifact by id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" }
                },
                "required": ["id"]
            }
        }),
        json!({
            "name": "updateArtifact",
            "description": "Merge fields into an artifact. Pass ifVersion for optimistic concurrency; a stale value is rejected with VERSION_CONFLICT and nothing changes.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "ifVersion": { "type": "integer" },
                    "title": { "type": "string" },
                    "uri": { "type": ["string", "null"] },
                    "description": { "type": ["string", "null"] }
                },
                "required": ["id"]
            }
        }),
        json!({
            "name": "deleteArtifact",
            "description": "Delete an artifact and unassign it from every task.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" }
                },
                "required": ["id"]
            }
        }),
        json!({
            "name": "listArtifacts",
            "description": "List all artifacts.",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
        json!({
            "name": "createDependency",
            "description": "Add a directed dependency edge (dependee depends on dependency) with an optional artifact-id list. Self-edges and edges that would close a cycle are rejected with CYCLE_DETECTED.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "dependeeTaskId": { "type": "string" },
                    "dependencyTaskId": { "type": "string" },
                    "artifactIds": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["dependeeTaskId", "dependencyTaskId"]
            }
        }),
        json!({
            "name": "updateDependency",
            "description": "Re-target a dependency edge and/or replace its artifact-id list. The acyclicity check runs again against the new endpoints.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "dependeeTaskId": { "type": "string" },
                    "dependencyTaskId": { "type": "string" },
                    "newDependeeTaskId": { "type": "string" },
                    "newDependencyTaskId": { "type": "string" },
                    "artifactIds": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["dependeeTaskId", "dependencyTaskId"]
            }
        }),
        json!({
            "name": "deleteDependency",
            "description": "Remove one dependency edge by its ordered task-id pair.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "dependeeTaskId": { "type": "string" },
                    "dependencyTaskId": { "type": "string" }
                },
                "required": ["dependeeTaskId", "dependencyTaskId"]
            }
        }),
        json!({
            "name": "listDependencies",
            "description": "List dependency edges, all of them or only those touching one task.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "taskId": { "type": "string" }
                }
            }
        }),
    ]
}
