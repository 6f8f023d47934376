#![forbid(unsafe_code)]

use st_core::model::{GlobalRole, ProjectRole, StageStatus};
use st_core::workflow::StageSnapshot;

#[derive(Clone, Debug)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: GlobalRole,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct StageRow {
    pub id: String,
    pub title: String,
    pub order: i64,
    pub status: StageStatus,
    pub assignee_id: Option<String>,
    pub notes: Option<String>,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
}

impl StageRow {
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            id: self.id.clone(),
            order: self.order,
            status: self.status,
            assignee_id: self.assignee_id.clone(),
            started_at_ms: self.started_at_ms,
            finished_at_ms: self.finished_at_ms,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemberRow {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub role: ProjectRole,
}

/// A project with its ordered stages and member list, re-read at the end of
/// every mutating operation inside the same transaction.
#[derive(Clone, Debug)]
pub struct ProjectDetail {
    pub project: ProjectRow,
    pub stages: Vec<StageRow>,
    pub members: Vec<MemberRow>,
}

/// One entry of a membership-filtered project listing.
#[derive(Clone, Debug)]
pub struct ProjectListItem {
    pub project: ProjectRow,
    pub stages: Vec<StageRow>,
    pub my_role: ProjectRole,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: GlobalRole,
}

/// Caller-supplied stage at project creation. Missing fields are defaulted:
/// id to `<project>-<ordinal>`, title to `Stage <ordinal>`, status per the
/// first-stage rule.
#[derive(Clone, Debug, Default)]
pub struct NewStage {
    pub id: Option<String>,
    pub title: Option<String>,
    pub status: Option<StageStatus>,
    pub assignee_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CreateProjectRequest {
    pub id: String,
    pub name: String,
    /// Empty means "use the default template".
    pub stages: Vec<NewStage>,
}

#[derive(Clone, Debug)]
pub struct EventRow {
    pub seq: i64,
    pub ts_ms: i64,
    pub project_id: String,
    pub stage_id: Option<String>,
    pub event_type: String,
    pub payload_json: String,
}
