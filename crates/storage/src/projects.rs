#![forbid(unsafe_code)]

use crate::users::user_exists_tx;
use crate::{
    CreateProjectRequest, MemberRow, ProjectDetail, ProjectListItem, ProjectRow, SqliteStore,
    StageRow, StoreError, insert_event_tx, now_ms, project_exists, require_admin, require_member,
    role_of, validate_project_id,
};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::json;
use st_core::model::{ProjectRole, StageStatus};
use std::collections::BTreeSet;

const DEFAULT_STAGE_TITLES: [&str; 3] = ["Preparation", "Execution", "Acceptance"];

impl SqliteStore {
    /// Create a project with its full stage sequence. The creator becomes
    /// the sole admin member; stages receive dense orders 1..N. The first
    /// stage starts `in_progress` unless explicitly requested `blocked`;
    /// every later stage starts `blocked`.
    pub fn project_create(
        &mut self,
        actor_user_id: &str,
        request: CreateProjectRequest,
    ) -> Result<ProjectDetail, StoreError> {
        let project_id = validate_project_id(&request.id)?;
        let project_id = project_id.as_str().to_string();
        if request.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("project name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if !user_exists_tx(&tx, actor_user_id)? {
            return Err(StoreError::UnknownUser);
        }
        if project_exists(&tx, &project_id)? {
            return Err(StoreError::ProjectExists);
        }

        tx.execute(
            "INSERT INTO projects(id, name, created_at_ms, updated_at_ms) VALUES (?1, ?2, ?3, ?4)",
            params![&project_id, &request.name, now_ms, now_ms],
        )?;
        tx.execute(
            r#"
            INSERT INTO memberships(project_id, user_id, role, created_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                &project_id,
                actor_user_id,
                ProjectRole::Admin.as_str(),
                now_ms
            ],
        )?;

        let stages = if request.stages.is_empty() {
            DEFAULT_STAGE_TITLES
                .iter()
                .map(|title| crate::NewStage {
                    title: Some((*title).to_string()),
                    ..Default::default()
                })
                .collect()
        } else {
            request.stages
        };

        let mut seen_ids = BTreeSet::new();
        for (idx, spec) in stages.iter().enumerate() {
            let ordinal = (idx + 1) as i64;
            let stage_id = spec
                .id
                .clone()
                .unwrap_or_else(|| format!("{project_id}-{ordinal}"));
            if stage_id.trim().is_empty() {
                return Err(StoreError::InvalidInput("stage id must not be empty"));
            }
            if !seen_ids.insert(stage_id.clone()) {
                return Err(StoreError::InvalidInput("duplicate stage id"));
            }
            let title = spec
                .title
                .clone()
                .unwrap_or_else(|| format!("Stage {ordinal}"));

            let status = if idx == 0 {
                match spec.status {
                    None => StageStatus::InProgress,
                    Some(StageStatus::Done) => {
                        return Err(StoreError::InvalidInput(
                            "first stage must start blocked or in_progress",
                        ));
                    }
                    Some(explicit) => explicit,
                }
            } else {
                StageStatus::Blocked
            };
            let started_at_ms = (status == StageStatus::InProgress).then_some(now_ms);

            if let Some(assignee) = spec.assignee_id.as_deref() {
                if role_of(&tx, &project_id, assignee)?.is_none() {
                    return Err(StoreError::NotAMember);
                }
            }

            tx.execute(
                r#"
                INSERT INTO stages(id, project_id, title, "order", status, assignee_id, started_at_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    &stage_id,
                    &project_id,
                    &title,
                    ordinal,
                    status.as_str(),
                    spec.assignee_id,
                    started_at_ms
                ],
            )?;
        }

        insert_event_tx(
            &tx,
            now_ms,
            &project_id,
            None,
            "project.create",
            &json!({ "name": request.name, "stages": seen_ids.len() }).to_string(),
        )?;

        let detail = fetch_detail(&tx, &project_id)?;
        tx.commit()?;
        Ok(detail)
    }

    pub fn project_get(
        &self,
        actor_user_id: &str,
        project_id: &str,
    ) -> Result<(ProjectDetail, ProjectRole), StoreError> {
        let role = require_member(&self.conn, project_id, actor_user_id)?;
        let detail = fetch_detail(&self.conn, project_id)?;
        Ok((detail, role))
    }

    /// Projects the actor holds a membership in, newest first, each with the
    /// actor's own role.
    pub fn projects_list(&self, actor_user_id: &str) -> Result<Vec<ProjectListItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.name, p.created_at_ms, p.updated_at_ms, m.role
            FROM projects p
            JOIN memberships m ON m.project_id = p.id
            WHERE m.user_id = ?1
            ORDER BY p.created_at_ms DESC, p.id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![actor_user_id], |row| {
            Ok((
                ProjectRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at_ms: row.get(2)?,
                    updated_at_ms: row.get(3)?,
                },
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (project, raw_role) = row?;
            let my_role = ProjectRole::parse(&raw_role)
                .ok_or(StoreError::InvalidInput("unknown role in store"))?;
            let stages = fetch_stages(&self.conn, &project.id)?;
            items.push(ProjectListItem {
                project,
                stages,
                my_role,
            });
        }
        Ok(items)
    }

    pub fn project_rename(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
        name: &str,
    ) -> Result<ProjectDetail, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("project name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_admin(&tx, project_id, actor_user_id)?;

        tx.execute(
            "UPDATE projects SET name = ?2, updated_at_ms = ?3 WHERE id = ?1",
            params![project_id, name, now_ms],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            None,
            "project.rename",
            &json!({ "name": name }).to_string(),
        )?;

        let detail = fetch_detail(&tx, project_id)?;
        tx.commit()?;
        Ok(detail)
    }

    /// Delete a project. Stages, memberships and audit events go with it via
    /// foreign-key cascade.
    pub fn project_delete(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        require_admin(&tx, project_id, actor_user_id)?;
        tx.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn fetch_stages(
    conn: &Connection,
    project_id: &str,
) -> Result<Vec<StageRow>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, title, "order", status, assignee_id, notes, started_at_ms, finished_at_ms
        FROM stages
        WHERE project_id = ?1
        ORDER BY "order" ASC
        "#,
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<i64>>(6)?,
            row.get::<_, Option<i64>>(7)?,
        ))
    })?;

    let mut stages = Vec::new();
    for row in rows {
        let (id, title, order, raw_status, assignee_id, notes, started_at_ms, finished_at_ms) =
            row?;
        let status = StageStatus::parse(&raw_status)
            .ok_or(StoreError::InvalidInput("unknown status in store"))?;
        stages.push(StageRow {
            id,
            title,
            order,
            status,
            assignee_id,
            notes,
            started_at_ms,
            finished_at_ms,
        });
    }
    Ok(stages)
}

pub(crate) fn fetch_detail(
    conn: &Connection,
    project_id: &str,
) -> Result<ProjectDetail, StoreError> {
    let project = conn
        .query_row(
            "SELECT id, name, created_at_ms, updated_at_ms FROM projects WHERE id = ?1",
            params![project_id],
            |row| {
                Ok(ProjectRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at_ms: row.get(2)?,
                    updated_at_ms: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or(StoreError::UnknownProject)?;

    let stages = fetch_stages(conn, project_id)?;

    let mut stmt = conn.prepare(
        r#"
        SELECT m.user_id, u.username, u.display_name, m.role
        FROM memberships m
        JOIN users u ON u.id = m.user_id
        WHERE m.project_id = ?1
        ORDER BY m.created_at_ms ASC, m.user_id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut members = Vec::new();
    for row in rows {
        let (user_id, username, display_name, raw_role) = row?;
        let role =
            ProjectRole::parse(&raw_role).ok_or(StoreError::InvalidInput("unknown role in store"))?;
        members.push(MemberRow {
            user_id,
            username,
            display_name,
            role,
        });
    }

    Ok(ProjectDetail {
        project,
        stages,
        members,
    })
}
