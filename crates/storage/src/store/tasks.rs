#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde_json::json;
use std::collections::{BTreeSet, VecDeque};
use wbs_core::model::{ArtifactRole, MAX_HIERARCHY_DEPTH, TaskStatus};

const TASK_COLUMNS: &str = "id, parent_id, title, description, assignee, status, estimate, \
                            version, created_at_ms, updated_at_ms";

impl SqliteStore {
    pub fn task_create(&mut self, request: TaskCreateRequest) -> Result<TaskRow, StoreError> {
        let TaskCreateRequest {
            parent_id,
            title,
            description,
            assignee,
            status,
            estimate,
        } = request;

        let title = nonempty_title(title)?;
        let parent_id = parent_id.as_deref().map(canonicalize_task_id).transpose()?;

        let now_ms = now_ms();
        let tx = self.transaction()?;

        if let Some(parent_id) = parent_id.as_deref() {
            ensure_task_exists_tx(&tx, parent_id)?;
        }

        let seq = next_counter_tx(&tx, "task_seq")?;
        let id = format!("TASK-{seq:03}");
        let status = status.unwrap_or(TaskStatus::Pending);

        let row = TaskRow {
            id: id.clone(),
            parent_id,
            title,
            description,
            assignee,
            status,
            estimate,
            version: 1,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        insert_task_tx(&tx, &row)?;
        history_append_tx(
            &tx,
            &id,
            "created",
            &json!({ "title": row.title, "parentId": row.parent_id }),
            now_ms,
        )?;

        tx.commit()?;
        Ok(row)
    }

    pub fn task_get(&self, id: &str) -> Result<TaskDetail, StoreError> {
        let id = canonicalize_task_id(id)?;
        let task = task_row(self.conn(), &id)?;

        let child_count = self.conn().query_row(
            "SELECT COUNT(1) FROM tasks WHERE parent_id=?1",
            params![id],
            |row| row.get::<_, i64>(0),
        )?;

        let deliverables = assignments_for_task(self.conn(), &id, ArtifactRole::Deliverable)?;
        let prerequisites = assignments_for_task(self.conn(), &id, ArtifactRole::Prerequisite)?;
        let completion_conditions = conditions_for_task(self.conn(), &id)?;

        Ok(TaskDetail {
            task,
            deliverables,
            prerequisites,
            completion_conditions,
            child_count,
        })
    }

    pub fn task_list(&self, parent_id: Option<&str>) -> Result<Vec<TaskSummaryRow>, StoreError> {
        let parent_id = parent_id.map(canonicalize_task_id).transpose()?;

        let sql_roots = format!(
            "SELECT {TASK_COLUMNS}, \
             (SELECT COUNT(1) FROM tasks c WHERE c.parent_id = tasks.id) \
             FROM tasks WHERE parent_id IS NULL ORDER BY id"
        );
        let sql_children = format!(
            "SELECT {TASK_COLUMNS}, \
             (SELECT COUNT(1) FROM tasks c WHERE c.parent_id = tasks.id) \
             FROM tasks WHERE parent_id = ?1 ORDER BY id"
        );

        let mut out = Vec::new();
        match parent_id.as_deref() {
            None => {
                let mut stmt = self.conn().prepare(&sql_roots)?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    out.push(summary_from_row(row)?);
                }
            }
            Some(parent) => {
                ensure_task_exists(self.conn(), parent)?;
                let mut stmt = self.conn().prepare(&sql_children)?;
                let mut rows = stmt.query(params![parent])?;
                while let Some(row) = rows.next()? {
                    out.push(summary_from_row(row)?);
                }
            }
        }
        Ok(out)
    }

    pub fn task_update(&mut self, request: TaskUpdateRequest) -> Result<TaskRow, StoreError> {
        let TaskUpdateRequest {
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
        } = request;

        if title.is_none()
            && description.is_none()
            && assignee.is_none()
            && status.is_none()
            && estimate.is_none()
            && deliverables.is_none()
            && prerequisites.is_none()
            && completion_conditions.is_none()
        {
            return Err(StoreError::InvalidInput("no fields to update"));
        }

        let id = canonicalize_task_id(&id)?;
        let title = title.map(nonempty_title).transpose()?;

        let now_ms = now_ms();
        let tx = self.transaction()?;

        let current = task_row(&tx, &id)?;
        if let Some(expected) = expected_version
            && expected != current.version
        {
            return Err(StoreError::VersionConflict {
                expected,
                actual: current.version,
            });
        }

        let mut changed: Vec<&str> = Vec::new();
        if title.is_some() {
            changed.push("title");
        }
        if description.is_some() {
            changed.push("description");
        }
        if assignee.is_some() {
            changed.push("assignee");
        }
        if status.is_some() {
            changed.push("status");
        }
        if estimate.is_some() {
            changed.push("estimate");
        }
        if deliverables.is_some() {
            changed.push("deliverables");
        }
        if prerequisites.is_some() {
            changed.push("prerequisites");
        }
        if completion_conditions.is_some() {
            changed.push("completionConditions");
        }

        let updated = TaskRow {
            id: current.id.clone(),
            parent_id: current.parent_id.clone(),
            title: title.unwrap_or(current.title),
            description: description.unwrap_or(current.description),
            assignee: assignee.unwrap_or(current.assignee),
            status: status.unwrap_or(current.status),
            estimate: estimate.unwrap_or(current.estimate),
            version: current.version + 1,
            created_at_ms: current.created_at_ms,
            updated_at_ms: now_ms,
        };

        tx.execute(
            "UPDATE tasks \
             SET title=?2, description=?3, assignee=?4, status=?5, estimate=?6, \
                 version=?7, updated_at_ms=?8 \
             WHERE id=?1",
            params![
                updated.id,
                updated.title,
                updated.description,
                updated.assignee,
                updated.status.as_str(),
                updated.estimate,
                updated.version,
                updated.updated_at_ms,
            ],
        )?;

        if let Some(items) = deliverables {
            assignments_replace_tx(&tx, &id, ArtifactRole::Deliverable, &items)?;
        }
        if let Some(items) = prerequisites {
            assignments_replace_tx(&tx, &id, ArtifactRole::Prerequisite, &items)?;
        }
        if let Some(items) = completion_conditions {
            conditions_replace_tx(&tx, &id, &items)?;
        }

        history_append_tx(&tx, &id, "updated", &json!({ "changed": changed }), now_ms)?;

        tx.commit()?;
        Ok(updated)
    }

    pub fn task_move(
        &mut self,
        id: &str,
        new_parent_id: Option<&str>,
    ) -> Result<TaskRow, StoreError> {
        let id = canonicalize_task_id(id)?;
        let new_parent_id = new_parent_id.map(canonicalize_task_id).transpose()?;

        let now_ms = now_ms();
        let tx = self.transaction()?;

        let current = task_row(&tx, &id)?;

        if let Some(parent) = new_parent_id.as_deref() {
            ensure_task_exists_tx(&tx, parent)?;
            // Walking up from the prospective parent must never meet the
            // task being moved; that includes the parent==id self case.
            if ancestor_chain_contains(&tx, parent, &id)? {
                return Err(StoreError::HierarchyCycle);
            }
        }

        let updated = TaskRow {
            parent_id: new_parent_id.clone(),
            version: current.version + 1,
            updated_at_ms: now_ms,
            ..current.clone()
        };

        tx.execute(
            "UPDATE tasks SET parent_id=?2, version=?3, updated_at_ms=?4 WHERE id=?1",
            params![id, updated.parent_id, updated.version, updated.updated_at_ms],
        )?;
        history_append_tx(
            &tx,
            &id,
            "moved",
            &json!({ "fromParentId": current.parent_id, "toParentId": new_parent_id }),
            now_ms,
        )?;

        tx.commit()?;
        Ok(updated)
    }

    pub fn task_delete(&mut self, id: &str) -> Result<usize, StoreError> {
        let id = canonicalize_task_id(id)?;

        let now_ms = now_ms();
        let tx = self.transaction()?;
        ensure_task_exists_tx(&tx, &id)?;

        let doomed = collect_descendants(&tx, &id)?;

        for task_id in &doomed {
            tx.execute(
                "DELETE FROM task_artifact_assignments WHERE task_id=?1",
                params![task_id],
            )?;
            tx.execute(
                "DELETE FROM completion_conditions WHERE task_id=?1",
                params![task_id],
            )?;
            tx.execute(
                "DELETE FROM dependencies WHERE dependee_task_id=?1 OR dependency_task_id=?1",
                params![task_id],
            )?;
        }

        // Children before parents so the parent_id foreign key stays
        // satisfied at each step.
        for task_id in doomed.iter().rev() {
            tx.execute("DELETE FROM tasks WHERE id=?1", params![task_id])?;
            history_append_tx(&tx, task_id, "deleted", &json!({ "rootId": id }), now_ms)?;
        }

        tx.commit()?;
        Ok(doomed.len())
    }

    pub fn task_import(
        &mut self,
        parent_id: Option<&str>,
        entries: Vec<TaskImportEntry>,
    ) -> Result<Vec<String>, StoreError> {
        if entries.is_empty() {
            return Err(StoreError::InvalidInput("no tasks to import"));
        }
        let parent_id = parent_id.map(canonicalize_task_id).transpose()?;

        let now_ms = now_ms();
        let tx = self.transaction()?;

        if let Some(parent) = parent_id.as_deref() {
            ensure_task_exists_tx(&tx, parent)?;
        }

        let mut created = Vec::new();
        let mut worklist: VecDeque<(Option<String>, TaskImportEntry)> = entries
            .into_iter()
            .map(|entry| (parent_id.clone(), entry))
            .collect();

        while let Some((parent, entry)) = worklist.pop_front() {
            let TaskImportEntry {
                title,
                description,
                assignee,
                status,
                estimate,
                children,
            } = entry;

            let title = nonempty_title(title)?;
            let seq = next_counter_tx(&tx, "task_seq")?;
            let id = format!("TASK-{seq:03}");

            let row = TaskRow {
                id: id.clone(),
                parent_id: parent,
                title,
                description,
                assignee,
                status: status.unwrap_or(TaskStatus::Pending),
                estimate,
                version: 1,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            };
            insert_task_tx(&tx, &row)?;
            history_append_tx(
                &tx,
                &id,
                "imported",
                &json!({ "title": row.title, "parentId": row.parent_id }),
                now_ms,
            )?;

            created.push(id.clone());
            for child in children {
                worklist.push_back((Some(id.clone()), child));
            }
        }

        tx.commit()?;
        Ok(created)
    }

    pub fn task_history(&self, task_id: &str) -> Result<Vec<HistoryRow>, StoreError> {
        let task_id = canonicalize_task_id(task_id)?;

        let mut stmt = self.conn().prepare(
            "SELECT seq, task_id, event_type, payload_json, ts_ms \
             FROM task_history WHERE task_id=?1 ORDER BY seq",
        )?;
        let mut rows = stmt.query(params![task_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(HistoryRow {
                seq: row.get(0)?,
                task_id: row.get(1)?,
                event_type: row.get(2)?,
                payload_json: row.get(3)?,
                ts_ms: row.get(4)?,
            });
        }
        Ok(out)
    }
}

fn nonempty_title(title: String) -> Result<String, StoreError> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(StoreError::InvalidInput("title must not be empty"));
    }
    Ok(title)
}

fn insert_task_tx(tx: &Transaction<'_>, row: &TaskRow) -> Result<(), StoreError> {
    let insert = tx.execute(
        "INSERT INTO tasks(id, parent_id, title, description, assignee, status, estimate, \
                           version, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.id,
            row.parent_id,
            row.title,
            row.description,
            row.assignee,
            row.status.as_str(),
            row.estimate,
            row.version,
            row.created_at_ms,
            row.updated_at_ms,
        ],
    );
    if let Err(err) = insert {
        return Err(map_insert_conflict(err));
    }
    Ok(())
}

fn task_parts_from_row(
    row: &Row<'_>,
) -> rusqlite::Result<(
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    i64,
    i64,
    i64,
)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn task_row_from_parts(
    parts: (
        String,
        Option<String>,
        String,
        Option<String>,
        Option<String>,
        String,
        Option<String>,
        i64,
        i64,
        i64,
    ),
) -> Result<TaskRow, StoreError> {
    let (
        id,
        parent_id,
        title,
        description,
        assignee,
        status,
        estimate,
        version,
        created_at_ms,
        updated_at_ms,
    ) = parts;
    let status =
        TaskStatus::parse(&status).ok_or(StoreError::InvalidInput("invalid status row"))?;
    Ok(TaskRow {
        id,
        parent_id,
        title,
        description,
        assignee,
        status,
        estimate,
        version,
        created_at_ms,
        updated_at_ms,
    })
}

fn summary_from_row(row: &Row<'_>) -> Result<TaskSummaryRow, StoreError> {
    let parts = task_parts_from_row(row)?;
    let child_count: i64 = row.get(10)?;
    Ok(TaskSummaryRow {
        task: task_row_from_parts(parts)?,
        child_count,
    })
}

pub(crate) fn task_row(conn: &Connection, id: &str) -> Result<TaskRow, StoreError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id=?1");
    let parts = conn
        .query_row(&sql, params![id], task_parts_from_row)
        .optional()?;
    match parts {
        Some(parts) => task_row_from_parts(parts),
        None => Err(StoreError::UnknownId),
    }
}

fn ensure_task_exists(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let exists = conn
        .query_row("SELECT 1 FROM tasks WHERE id=?1", params![id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if exists { Ok(()) } else { Err(StoreError::UnknownId) }
}

/// Tree ancestor walk: follows parent_id upward from `start` looking for
/// `needle`. Bounded and seen-guarded so a corrupted chain errors out
/// instead of looping. Distinct from the dependency-graph BFS on purpose.
pub(crate) fn ancestor_chain_contains(
    conn: &Connection,
    start: &str,
    needle: &str,
) -> Result<bool, StoreError> {
    let mut current = Some(start.to_string());
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut steps = 0usize;

    while let Some(node) = current {
        if node == needle {
            return Ok(true);
        }
        if !seen.insert(node.clone()) {
            return Err(StoreError::HierarchyCycle);
        }
        steps += 1;
        if steps > MAX_HIERARCHY_DEPTH {
            return Err(StoreError::HierarchyDepthExceeded);
        }

        current = conn
            .query_row(
                "SELECT parent_id FROM tasks WHERE id=?1",
                params![node],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
    }

    Ok(false)
}

/// Breadth-first worklist over the child relation; returns `root` first,
/// parents before children. No recursion: deep trees must not grow the
/// call stack.
fn collect_descendants(tx: &Transaction<'_>, root: &str) -> Result<Vec<String>, StoreError> {
    let mut order = vec![root.to_string()];
    let mut queue: VecDeque<String> = VecDeque::from([root.to_string()]);
    let mut seen: BTreeSet<String> = BTreeSet::from([root.to_string()]);
    let mut stmt = tx.prepare("SELECT id FROM tasks WHERE parent_id=?1 ORDER BY id")?;

    while let Some(current) = queue.pop_front() {
        let mut rows = stmt.query(params![current])?;
        while let Some(row) = rows.next()? {
            let child: String = row.get(0)?;
            if seen.insert(child.clone()) {
                order.push(child.clone());
                queue.push_back(child);
            }
        }
    }

    Ok(order)
}

pub(crate) fn history_append_tx(
    tx: &Transaction<'_>,
    task_id: &str,
    event_type: &str,
    payload: &serde_json::Value,
    ts_ms: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO task_history(task_id, event_type, payload_json, ts_ms) \
         VALUES (?1, ?2, ?3, ?4)",
        params![task_id, event_type, payload.to_string(), ts_ms],
    )?;
    Ok(())
}

pub(crate) fn assignments_for_task(
    conn: &Connection,
    task_id: &str,
    role: ArtifactRole,
) -> Result<Vec<AssignmentRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT artifact_id, crud_operation, order_index \
         FROM task_artifact_assignments \
         WHERE task_id=?1 AND role=?2 ORDER BY order_index",
    )?;
    let mut rows = stmt.query(params![task_id, role.as_str()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(AssignmentRow {
            artifact_id: row.get(0)?,
            role,
            crud_operation: row.get(1)?,
            order_index: row.get(2)?,
        });
    }
    Ok(out)
}

pub(crate) fn conditions_for_task(
    conn: &Connection,
    task_id: &str,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT condition FROM completion_conditions WHERE task_id=?1 ORDER BY order_index",
    )?;
    let mut rows = stmt.query(params![task_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get::<_, String>(0)?);
    }
    Ok(out)
}

/// Replaces one (task, role) assignment list as an ordered unit: rows that
/// fell out of the list are deleted, retained rows are renumbered to the
/// new position, new rows inserted. Order indices end up contiguous from 0.
pub(crate) fn assignments_replace_tx(
    tx: &Transaction<'_>,
    task_id: &str,
    role: ArtifactRole,
    items: &[AssignmentInput],
) -> Result<(), StoreError> {
    let mut wanted: BTreeSet<String> = BTreeSet::new();
    for item in items {
        let artifact_id = canonicalize_artifact_id(&item.artifact_id)?;
        if !wanted.insert(artifact_id) {
            return Err(StoreError::InvalidInput(
                "duplicate artifact in assignment list",
            ));
        }
    }
    for item in items {
        ensure_artifact_exists_tx(tx, &item.artifact_id)?;
    }

    let current: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT artifact_id FROM task_artifact_assignments WHERE task_id=?1 AND role=?2",
        )?;
        let mut rows = stmt.query(params![task_id, role.as_str()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        out
    };
    for artifact_id in current {
        if !wanted.contains(&artifact_id) {
            tx.execute(
                "DELETE FROM task_artifact_assignments \
                 WHERE task_id=?1 AND role=?2 AND artifact_id=?3",
                params![task_id, role.as_str(), artifact_id],
            )?;
        }
    }

    for (index, item) in items.iter().enumerate() {
        let order_index = i64::try_from(index)
            .map_err(|_| StoreError::InvalidInput("assignment list too long"))?;
        tx.execute(
            "INSERT INTO task_artifact_assignments(task_id, artifact_id, role, crud_operation, order_index) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(task_id, role, artifact_id) \
             DO UPDATE SET crud_operation=excluded.crud_operation, order_index=excluded.order_index",
            params![task_id, item.artifact_id, role.as_str(), item.crud_operation, order_index],
        )?;
    }

    Ok(())
}

/// Replaces a task's completion-condition list as an ordered unit, keyed
/// by order index: rows in range are updated, extras deleted, the tail
/// inserted.
pub(crate) fn conditions_replace_tx(
    tx: &Transaction<'_>,
    task_id: &str,
    items: &[String],
) -> Result<(), StoreError> {
    for item in items {
        if item.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "completion condition must not be empty",
            ));
        }
    }

    let new_len = i64::try_from(items.len())
        .map_err(|_| StoreError::InvalidInput("condition list too long"))?;
    tx.execute(
        "DELETE FROM completion_conditions WHERE task_id=?1 AND order_index >= ?2",
        params![task_id, new_len],
    )?;

    for (index, condition) in items.iter().enumerate() {
        let order_index = i64::try_from(index)
            .map_err(|_| StoreError::InvalidInput("condition list too long"))?;
        tx.execute(
            "INSERT INTO completion_conditions(task_id, order_index, condition) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(task_id, order_index) DO UPDATE SET condition=excluded.condition",
            params![task_id, order_index, condition],
        )?;
    }

    Ok(())
}
