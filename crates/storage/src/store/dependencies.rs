#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::collections::{BTreeSet, VecDeque};

impl SqliteStore {
    pub fn dependency_create(
        &mut self,
        request: DependencyCreateRequest,
    ) -> Result<DependencyRow, StoreError> {
        let DependencyCreateRequest {
            dependee_task_id,
            dependency_task_id,
            artifact_ids,
        } = request;

        let dependee = canonicalize_task_id(&dependee_task_id)?;
        let dependency = canonicalize_task_id(&dependency_task_id)?;
        if dependee == dependency {
            return Err(StoreError::DependencyCycle);
        }
        let artifact_ids = canonicalize_artifact_list(artifact_ids)?;

        let now_ms = now_ms();
        let tx = self.transaction()?;

        ensure_task_exists_tx(&tx, &dependee)?;
        ensure_task_exists_tx(&tx, &dependency)?;
        for artifact_id in &artifact_ids {
            ensure_artifact_exists_tx(&tx, artifact_id)?;
        }
        if edge_exists(&tx, &dependee, &dependency)? {
            return Err(StoreError::AlreadyExists);
        }
        if edge_would_cycle(&tx, &dependee, &dependency, None)? {
            return Err(StoreError::DependencyCycle);
        }

        let row = DependencyRow {
            dependee_task_id: dependee,
            dependency_task_id: dependency,
            artifact_ids,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        insert_edge_tx(&tx, &row)?;

        tx.commit()?;
        Ok(row)
    }

    pub fn dependency_update(
        &mut self,
        request: DependencyUpdateRequest,
    ) -> Result<DependencyRow, StoreError> {
        let DependencyUpdateRequest {
            dependee_task_id,
            dependency_task_id,
            new_dependee_task_id,
            new_dependency_task_id,
            artifact_ids,
        } = request;

        if new_dependee_task_id.is_none()
            && new_dependency_task_id.is_none()
            && artifact_ids.is_none()
        {
            return Err(StoreError::InvalidInput("no fields to update"));
        }

        let old_dependee = canonicalize_task_id(&dependee_task_id)?;
        let old_dependency = canonicalize_task_id(&dependency_task_id)?;
        let new_dependee = new_dependee_task_id
            .as_deref()
            .map(canonicalize_task_id)
            .transpose()?
            .unwrap_or_else(|| old_dependee.clone());
        let new_dependency = new_dependency_task_id
            .as_deref()
            .map(canonicalize_task_id)
            .transpose()?
            .unwrap_or_else(|| old_dependency.clone());

        if new_dependee == new_dependency {
            return Err(StoreError::DependencyCycle);
        }
        let artifact_ids = artifact_ids.map(canonicalize_artifact_list).transpose()?;

        let now_ms = now_ms();
        let tx = self.transaction()?;

        let current = edge_row(&tx, &old_dependee, &old_dependency)?;

        let endpoints_changed = new_dependee != old_dependee || new_dependency != old_dependency;
        if endpoints_changed {
            ensure_task_exists_tx(&tx, &new_dependee)?;
            ensure_task_exists_tx(&tx, &new_dependency)?;
            if edge_exists(&tx, &new_dependee, &new_dependency)? {
                return Err(StoreError::AlreadyExists);
            }
            // The cycle check must not see the edge being re-targeted,
            // otherwise reversing an edge through update would self-collide.
            if edge_would_cycle(
                &tx,
                &new_dependee,
                &new_dependency,
                Some((&old_dependee, &old_dependency)),
            )? {
                return Err(StoreError::DependencyCycle);
            }
        }
        if let Some(ids) = &artifact_ids {
            for artifact_id in ids {
                ensure_artifact_exists_tx(&tx, artifact_id)?;
            }
        }

        let updated = DependencyRow {
            dependee_task_id: new_dependee,
            dependency_task_id: new_dependency,
            artifact_ids: artifact_ids.unwrap_or(current.artifact_ids),
            created_at_ms: current.created_at_ms,
            updated_at_ms: now_ms,
        };

        tx.execute(
            "DELETE FROM dependencies WHERE dependee_task_id=?1 AND dependency_task_id=?2",
            params![old_dependee, old_dependency],
        )?;
        insert_edge_tx(&tx, &updated)?;

        tx.commit()?;
        Ok(updated)
    }

    pub fn dependency_delete(
        &mut self,
        dependee_task_id: &str,
        dependency_task_id: &str,
    ) -> Result<(), StoreError> {
        let dependee = canonicalize_task_id(dependee_task_id)?;
        let dependency = canonicalize_task_id(dependency_task_id)?;

        let tx = self.transaction()?;
        if !edge_exists(&tx, &dependee, &dependency)? {
            return Err(StoreError::UnknownId);
        }
        tx.execute(
            "DELETE FROM dependencies WHERE dependee_task_id=?1 AND dependency_task_id=?2",
            params![dependee, dependency],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn dependency_list(
        &self,
        task_id: Option<&str>,
    ) -> Result<Vec<DependencyRow>, StoreError> {
        let task_id = task_id.map(canonicalize_task_id).transpose()?;

        let mut out = Vec::new();
        match task_id.as_deref() {
            None => {
                let mut stmt = self.conn().prepare(
                    "SELECT dependee_task_id, dependency_task_id, artifact_ids, created_at_ms, updated_at_ms \
                     FROM dependencies ORDER BY dependee_task_id, dependency_task_id",
                )?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    out.push(edge_from_parts(
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    )?);
                }
            }
            Some(task) => {
                let mut stmt = self.conn().prepare(
                    "SELECT dependee_task_id, dependency_task_id, artifact_ids, created_at_ms, updated_at_ms \
                     FROM dependencies \
                     WHERE dependee_task_id=?1 OR dependency_task_id=?1 \
                     ORDER BY dependee_task_id, dependency_task_id",
                )?;
                let mut rows = stmt.query(params![task])?;
                while let Some(row) = rows.next()? {
                    out.push(edge_from_parts(
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    )?);
                }
            }
        }
        Ok(out)
    }
}

fn canonicalize_artifact_list(ids: Vec<String>) -> Result<Vec<String>, StoreError> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::with_capacity(ids.len());
    for raw in ids {
        let id = canonicalize_artifact_id(&raw)?;
        if !seen.insert(id.clone()) {
            return Err(StoreError::InvalidInput(
                "duplicate artifact in dependency list",
            ));
        }
        out.push(id);
    }
    Ok(out)
}

fn edge_exists(
    conn: &Connection,
    dependee: &str,
    dependency: &str,
) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM dependencies WHERE dependee_task_id=?1 AND dependency_task_id=?2",
            params![dependee, dependency],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn edge_row(
    conn: &Connection,
    dependee: &str,
    dependency: &str,
) -> Result<DependencyRow, StoreError> {
    let row = conn
        .query_row(
            "SELECT artifact_ids, created_at_ms, updated_at_ms \
             FROM dependencies WHERE dependee_task_id=?1 AND dependency_task_id=?2",
            params![dependee, dependency],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((raw, created_at_ms, updated_at_ms)) => edge_from_parts(
            dependee.to_string(),
            dependency.to_string(),
            raw,
            created_at_ms,
            updated_at_ms,
        ),
        None => Err(StoreError::UnknownId),
    }
}

fn edge_from_parts(
    dependee_task_id: String,
    dependency_task_id: String,
    raw_artifact_ids: String,
    created_at_ms: i64,
    updated_at_ms: i64,
) -> Result<DependencyRow, StoreError> {
    let artifact_ids: Vec<String> = serde_json::from_str(&raw_artifact_ids)
        .map_err(|_| StoreError::InvalidInput("invalid dependency artifact list row"))?;
    Ok(DependencyRow {
        dependee_task_id,
        dependency_task_id,
        artifact_ids,
        created_at_ms,
        updated_at_ms,
    })
}

fn insert_edge_tx(tx: &Transaction<'_>, row: &DependencyRow) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(&row.artifact_ids)
        .map_err(|_| StoreError::InvalidInput("invalid dependency artifact list"))?;
    let insert = tx.execute(
        "INSERT INTO dependencies(dependee_task_id, dependency_task_id, artifact_ids, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.dependee_task_id,
            row.dependency_task_id,
            encoded,
            row.created_at_ms,
            row.updated_at_ms,
        ],
    );
    if let Err(err) = insert {
        return Err(map_insert_conflict(err));
    }
    Ok(())
}

/// Graph BFS over the dependency edge set: would inserting
/// `dependee -> dependency` close a cycle? Starts from `dependency` and
/// follows existing dependee->dependency edges; reaching `dependee` means
/// the reverse path already exists. `exclude` hides the edge being
/// re-targeted during update. This is a general-graph traversal and must
/// stay separate from the tree ancestor walk in the task repository.
fn edge_would_cycle(
    conn: &Connection,
    dependee: &str,
    dependency: &str,
    exclude: Option<(&str, &str)>,
) -> Result<bool, StoreError> {
    let mut queue: VecDeque<String> = VecDeque::from([dependency.to_string()]);
    let mut seen: BTreeSet<String> = BTreeSet::from([dependency.to_string()]);
    let mut stmt =
        conn.prepare("SELECT dependency_task_id FROM dependencies WHERE dependee_task_id=?1")?;

    while let Some(current) = queue.pop_front() {
        if current == dependee {
            return Ok(true);
        }

        let nexts: Vec<String> = {
            let mut rows = stmt.query(params![current])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row.get::<_, String>(0)?);
            }
            out
        };

        for next in nexts {
            if let Some((ex_dependee, ex_dependency)) = exclude
                && current == ex_dependee
                && next == ex_dependency
            {
                continue;
            }
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }

    Ok(false)
}
