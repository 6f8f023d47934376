#![forbid(unsafe_code)]

use crate::projects::{fetch_detail, fetch_stages};
use crate::users::user_id_by_username_tx;
use crate::{
    ProjectDetail, SqliteStore, StageRow, StoreError, insert_event_tx, now_ms, require_admin,
    require_member, role_of,
};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::json;
use st_core::model::StageStatus;
use st_core::workflow::{Actor, Cascade, plan_transition};

impl SqliteStore {
    /// Change a stage's status: access control, transition policy and the
    /// downstream cascade all run inside one transaction, so either the
    /// whole effect commits or none of it does.
    pub fn stage_set_status(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
        stage_id: &str,
        target: &str,
    ) -> Result<ProjectDetail, StoreError> {
        let Some(target) = StageStatus::parse(target) else {
            return Err(StoreError::InvalidInput(
                "status must be one of: blocked, in_progress, done",
            ));
        };

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let role = require_member(&tx, project_id, actor_user_id)?;

        let stages = fetch_stages(&tx, project_id)?;
        let stage = stages
            .iter()
            .find(|s| s.id == stage_id)
            .ok_or(StoreError::UnknownStage)?;

        let siblings: Vec<_> = stages.iter().map(StageRow::snapshot).collect();
        let actor = Actor::new(actor_user_id, role);
        let plan = plan_transition(&stage.snapshot(), target, &actor, &siblings, now_ms)?;

        tx.execute(
            r#"
            UPDATE stages SET status = ?3, started_at_ms = ?4, finished_at_ms = ?5
            WHERE project_id = ?1 AND id = ?2
            "#,
            params![
                project_id,
                stage_id,
                plan.status.as_str(),
                plan.started_at_ms,
                plan.finished_at_ms
            ],
        )?;

        let cascade_payload = match plan.cascade {
            Cascade::BlockAfter { order } => {
                let blocked = tx.execute(
                    r#"
                    UPDATE stages
                    SET status = ?3, started_at_ms = NULL, finished_at_ms = NULL
                    WHERE project_id = ?1 AND "order" > ?2
                    "#,
                    params![project_id, order, StageStatus::Blocked.as_str()],
                )?;
                json!({ "blockedDownstream": blocked })
            }
            Cascade::UnlockNext { order } => {
                let unlocked = tx.execute(
                    r#"
                    UPDATE stages
                    SET status = ?3, started_at_ms = ?4
                    WHERE project_id = ?1 AND "order" = ?2 AND status = ?5
                    "#,
                    params![
                        project_id,
                        order,
                        StageStatus::InProgress.as_str(),
                        now_ms,
                        StageStatus::Blocked.as_str()
                    ],
                )?;
                json!({ "unlockedNext": unlocked > 0 })
            }
        };

        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            Some(stage_id),
            "stage.status",
            &json!({ "status": plan.status.as_str(), "cascade": cascade_payload }).to_string(),
        )?;

        let detail = fetch_detail(&tx, project_id)?;
        tx.commit()?;
        Ok(detail)
    }

    /// Free-text notes; any member may edit, no workflow constraint.
    pub fn stage_set_notes(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
        stage_id: &str,
        notes: Option<&str>,
    ) -> Result<ProjectDetail, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_member(&tx, project_id, actor_user_id)?;
        require_stage(&tx, project_id, stage_id)?;

        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        tx.execute(
            "UPDATE stages SET notes = ?3 WHERE project_id = ?1 AND id = ?2",
            params![project_id, stage_id, notes],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            Some(stage_id),
            "stage.notes",
            &json!({ "cleared": notes.is_none() }).to_string(),
        )?;

        let detail = fetch_detail(&tx, project_id)?;
        tx.commit()?;
        Ok(detail)
    }

    pub fn stage_set_title(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
        stage_id: &str,
        title: &str,
    ) -> Result<ProjectDetail, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::InvalidInput("stage title must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_admin(&tx, project_id, actor_user_id)?;
        require_stage(&tx, project_id, stage_id)?;

        tx.execute(
            "UPDATE stages SET title = ?3 WHERE project_id = ?1 AND id = ?2",
            params![project_id, stage_id, title],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            Some(stage_id),
            "stage.title",
            &json!({ "title": title }).to_string(),
        )?;

        let detail = fetch_detail(&tx, project_id)?;
        tx.commit()?;
        Ok(detail)
    }

    /// Assign or clear a stage's assignee (admin only). The target is named
    /// by username and must already hold a membership in the project.
    pub fn stage_set_assignee(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
        stage_id: &str,
        target_username: Option<&str>,
    ) -> Result<ProjectDetail, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_admin(&tx, project_id, actor_user_id)?;
        require_stage(&tx, project_id, stage_id)?;

        let assignee_id = match target_username {
            None => None,
            Some(username) => {
                let user_id = user_id_by_username_tx(&tx, username)?
                    .ok_or(StoreError::UnknownUser)?;
                if role_of(&tx, project_id, &user_id)?.is_none() {
                    return Err(StoreError::NotAMember);
                }
                Some(user_id)
            }
        };

        tx.execute(
            "UPDATE stages SET assignee_id = ?3 WHERE project_id = ?1 AND id = ?2",
            params![project_id, stage_id, assignee_id],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            Some(stage_id),
            "stage.assign",
            &json!({ "assigneeId": assignee_id }).to_string(),
        )?;

        let detail = fetch_detail(&tx, project_id)?;
        tx.commit()?;
        Ok(detail)
    }

    /// Delete a stage, close the order gap it leaves, and unlock the new
    /// first stage if the deletion left it blocked. All one transaction.
    pub fn stage_delete(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
        stage_id: &str,
    ) -> Result<ProjectDetail, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_admin(&tx, project_id, actor_user_id)?;

        let deleted_order = tx
            .query_row(
                r#"SELECT "order" FROM stages WHERE project_id = ?1 AND id = ?2"#,
                params![project_id, stage_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownStage)?;

        tx.execute(
            "DELETE FROM stages WHERE project_id = ?1 AND id = ?2",
            params![project_id, stage_id],
        )?;
        // Reindex: stages below the gap keep their order, everything above
        // shifts down by one, keeping 1..N dense.
        tx.execute(
            r#"UPDATE stages SET "order" = "order" - 1 WHERE project_id = ?1 AND "order" > ?2"#,
            params![project_id, deleted_order],
        )?;

        // The unlock check fires only on the literal first stage. A blocked
        // stage behind a done first stage stays blocked.
        let unlocked_first = tx.execute(
            r#"
            UPDATE stages
            SET status = ?2, started_at_ms = ?3
            WHERE project_id = ?1 AND "order" = 1 AND status = ?4
            "#,
            params![
                project_id,
                StageStatus::InProgress.as_str(),
                now_ms,
                StageStatus::Blocked.as_str()
            ],
        )?;

        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            Some(stage_id),
            "stage.delete",
            &json!({ "order": deleted_order, "unlockedFirst": unlocked_first > 0 }).to_string(),
        )?;

        let detail = fetch_detail(&tx, project_id)?;
        tx.commit()?;
        Ok(detail)
    }
}

fn require_stage(
    conn: &Connection,
    project_id: &str,
    stage_id: &str,
) -> Result<(), StoreError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM stages WHERE project_id = ?1 AND id = ?2",
            params![project_id, stage_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(StoreError::UnknownStage)
    }
}
