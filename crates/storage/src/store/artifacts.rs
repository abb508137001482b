#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

const ARTIFACT_COLUMNS: &str = "id, title, uri, description, version, created_at_ms, updated_at_ms";

impl SqliteStore {
    pub fn artifact_create(
        &mut self,
        request: ArtifactCreateRequest,
    ) -> Result<ArtifactRow, StoreError> {
        let ArtifactCreateRequest {
            title,
            uri,
            description,
        } = request;

        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::InvalidInput("title must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.transaction()?;

        let seq = next_counter_tx(&tx, "artifact_seq")?;

        let row = ArtifactRow {
            id: format!("ART-{seq:03}"),
            title,
            uri,
            description,
            version: 1,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };

        let insert = tx.execute(
            "INSERT INTO artifacts(id, title, uri, description, version, created_at_ms, updated_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.title,
                row.uri,
                row.description,
                row.version,
                row.created_at_ms,
                row.updated_at_ms,
            ],
        );
        if let Err(err) = insert {
            return Err(map_insert_conflict(err));
        }

        tx.commit()?;
        Ok(row)
    }

    pub fn artifact_get(&self, id: &str) -> Result<ArtifactRow, StoreError> {
        let id = canonicalize_artifact_id(id)?;
        artifact_row(self.conn(), &id)
    }

    pub fn artifact_list(&self) -> Result<Vec<ArtifactRow>, StoreError> {
        let sql = format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(artifact_from_row(row)?);
        }
        Ok(out)
    }

    pub fn artifact_update(
        &mut self,
        request: ArtifactUpdateRequest,
    ) -> Result<ArtifactRow, StoreError> {
        let ArtifactUpdateRequest {
            id,
            expected_version,
            title,
            uri,
            description,
        } = request;

        if title.is_none() && uri.is_none() && description.is_none() {
            return Err(StoreError::InvalidInput("no fields to update"));
        }

        let id = canonicalize_artifact_id(&id)?;
        if let Some(title) = title.as_deref()
            && title.trim().is_empty()
        {
            return Err(StoreError::InvalidInput("title must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.transaction()?;

        let current = artifact_row(&tx, &id)?;
        if let Some(expected) = expected_version
            && expected != current.version
        {
            return Err(StoreError::VersionConflict {
                expected,
                actual: current.version,
            });
        }

        let updated = ArtifactRow {
            id: current.id.clone(),
            title: title.unwrap_or(current.title),
            uri: uri.unwrap_or(current.uri),
            description: description.unwrap_or(current.description),
            version: current.version + 1,
            created_at_ms: current.created_at_ms,
            updated_at_ms: now_ms,
        };

        tx.execute(
            "UPDATE artifacts SET title=?2, uri=?3, description=?4, version=?5, updated_at_ms=?6 \
             WHERE id=?1",
            params![
                updated.id,
                updated.title,
                updated.uri,
                updated.description,
                updated.version,
                updated.updated_at_ms,
            ],
        )?;

        tx.commit()?;
        Ok(updated)
    }

    /// Deletes an artifact and unassigns it everywhere: assignment rows go
    /// away, each touched (task, role) scope is renumbered back to
    /// contiguous indices, and the id is scrubbed from dependency
    /// artifact-id lists.
    pub fn artifact_delete(&mut self, id: &str) -> Result<(), StoreError> {
        let id = canonicalize_artifact_id(id)?;

        let now_ms = now_ms();
        let tx = self.transaction()?;
        ensure_artifact_exists_tx(&tx, &id)?;

        let touched_scopes: Vec<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT task_id, role FROM task_artifact_assignments WHERE artifact_id=?1",
            )?;
            let mut rows = stmt.query(params![id])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push((row.get::<_, String>(0)?, row.get::<_, String>(1)?));
            }
            out
        };

        tx.execute(
            "DELETE FROM task_artifact_assignments WHERE artifact_id=?1",
            params![id],
        )?;
        for (task_id, role) in &touched_scopes {
            renumber_assignment_scope_tx(&tx, task_id, role)?;
        }

        scrub_dependency_artifact_tx(&tx, &id, now_ms)?;

        tx.execute("DELETE FROM artifacts WHERE id=?1", params![id])?;

        tx.commit()?;
        Ok(())
    }
}

fn artifact_from_row(row: &Row<'_>) -> Result<ArtifactRow, StoreError> {
    Ok(ArtifactRow {
        id: row.get(0)?,
        title: row.get(1)?,
        uri: row.get(2)?,
        description: row.get(3)?,
        version: row.get(4)?,
        created_at_ms: row.get(5)?,
        updated_at_ms: row.get(6)?,
    })
}

pub(crate) fn artifact_row(conn: &Connection, id: &str) -> Result<ArtifactRow, StoreError> {
    let sql = format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id=?1");
    let row = conn
        .query_row(&sql, params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })
        .optional()?;

    match row {
        Some((id, title, uri, description, version, created_at_ms, updated_at_ms)) => {
            Ok(ArtifactRow {
                id,
                title,
                uri,
                description,
                version,
                created_at_ms,
                updated_at_ms,
            })
        }
        None => Err(StoreError::UnknownId),
    }
}

fn renumber_assignment_scope_tx(
    tx: &Transaction<'_>,
    task_id: &str,
    role: &str,
) -> Result<(), StoreError> {
    let remaining: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT artifact_id FROM task_artifact_assignments \
             WHERE task_id=?1 AND role=?2 ORDER BY order_index",
        )?;
        let mut rows = stmt.query(params![task_id, role])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        out
    };

    for (index, artifact_id) in remaining.iter().enumerate() {
        let order_index = i64::try_from(index)
            .map_err(|_| StoreError::InvalidInput("assignment list too long"))?;
        tx.execute(
            "UPDATE task_artifact_assignments SET order_index=?4 \
             WHERE task_id=?1 AND role=?2 AND artifact_id=?3",
            params![task_id, role, artifact_id, order_index],
        )?;
    }

    Ok(())
}

fn scrub_dependency_artifact_tx(
    tx: &Transaction<'_>,
    artifact_id: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    let edges: Vec<(String, String, String)> = {
        let mut stmt = tx.prepare(
            "SELECT dependee_task_id, dependency_task_id, artifact_ids FROM dependencies",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        }
        out
    };

    for (dependee, dependency, raw) in edges {
        let ids: Vec<String> = serde_json::from_str(&raw)
            .map_err(|_| StoreError::InvalidInput("invalid dependency artifact list row"))?;
        if !ids.iter().any(|id| id == artifact_id) {
            continue;
        }
        let filtered: Vec<String> = ids.into_iter().filter(|id| id != artifact_id).collect();
        let encoded = serde_json::to_string(&filtered)
            .map_err(|_| StoreError::InvalidInput("invalid dependency artifact list"))?;
        tx.execute(
            "UPDATE dependencies SET artifact_ids=?3, updated_at_ms=?4 \
             WHERE dependee_task_id=?1 AND dependency_task_id=?2",
            params![dependee, dependency, encoded, now_ms],
        )?;
    }

    Ok(())
}
