#![forbid(unsafe_code)]

use crate::{EventRow, SqliteStore, StoreError, require_member};
use rusqlite::params;

impl SqliteStore {
    /// Page through a project's audit log in commit order. Member read.
    pub fn events_list(
        &self,
        actor_user_id: &str,
        project_id: &str,
        since_seq: i64,
        limit: usize,
    ) -> Result<Vec<EventRow>, StoreError> {
        require_member(&self.conn, project_id, actor_user_id)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, ts_ms, project_id, stage_id, type, payload_json
            FROM events
            WHERE project_id = ?1 AND seq > ?2
            ORDER BY seq ASC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt.query_map(params![project_id, since_seq, limit as i64], |row| {
            Ok(EventRow {
                seq: row.get(0)?,
                ts_ms: row.get(1)?,
                project_id: row.get(2)?,
                stage_id: row.get(3)?,
                event_type: row.get(4)?,
                payload_json: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
