#![forbid(unsafe_code)]

use crate::users::user_id_by_username_tx;
use crate::{
    SqliteStore, StoreError, insert_event_tx, now_ms, require_admin, require_member, role_of,
};
use rusqlite::params;
use serde_json::json;
use st_core::model::ProjectRole;

impl SqliteStore {
    /// Add a user to the project by username (admin only). Role defaults to
    /// `executor` at the api boundary.
    pub fn member_invite(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
        target_username: &str,
        role: ProjectRole,
    ) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_admin(&tx, project_id, actor_user_id)?;

        let user_id =
            user_id_by_username_tx(&tx, target_username)?.ok_or(StoreError::UnknownUser)?;
        if role_of(&tx, project_id, &user_id)?.is_some() {
            return Err(StoreError::InvalidInput("user is already a member"));
        }

        tx.execute(
            r#"
            INSERT INTO memberships(project_id, user_id, role, created_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![project_id, &user_id, role.as_str(), now_ms],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            None,
            "member.invite",
            &json!({ "userId": user_id, "role": role.as_str() }).to_string(),
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Remove the actor's own membership. The sole remaining admin may not
    /// leave; stages assigned to the departing member are unassigned so the
    /// assignee-must-be-a-member rule keeps holding.
    pub fn member_leave(
        &mut self,
        actor_user_id: &str,
        project_id: &str,
    ) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let role = require_member(&tx, project_id, actor_user_id)?;

        if role == ProjectRole::Admin {
            let other_admins: i64 = tx.query_row(
                r#"
                SELECT COUNT(*) FROM memberships
                WHERE project_id = ?1 AND role = ?2 AND user_id != ?3
                "#,
                params![project_id, ProjectRole::Admin.as_str(), actor_user_id],
                |row| row.get(0),
            )?;
            if other_admins == 0 {
                return Err(StoreError::LastAdmin);
            }
        }

        tx.execute(
            "DELETE FROM memberships WHERE project_id = ?1 AND user_id = ?2",
            params![project_id, actor_user_id],
        )?;
        tx.execute(
            "UPDATE stages SET assignee_id = NULL WHERE project_id = ?1 AND assignee_id = ?2",
            params![project_id, actor_user_id],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            project_id,
            None,
            "member.leave",
            &json!({ "userId": actor_user_id }).to_string(),
        )?;

        tx.commit()?;
        Ok(())
    }
}
