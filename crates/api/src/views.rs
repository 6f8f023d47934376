#![forbid(unsafe_code)]

use crate::time::ts_ms_to_rfc3339;
use serde::Serialize;
use st_core::duration::stage_duration_ms;
use st_core::model::ProjectRole;
use st_storage::{EventRow, MemberRow, ProjectDetail, ProjectListItem, StageRow, UserRow};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub id: String,
    pub title: String,
    pub order: i64,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub duration_ms: i64,
}

impl StageView {
    pub(crate) fn from_row(row: &StageRow, now_ms: i64) -> Self {
        Self {
            id: row.id.clone(),
            title: row.title.clone(),
            order: row.order,
            status: row.status.as_str(),
            assignee_id: row.assignee_id.clone(),
            notes: row.notes.clone(),
            started_at: row.started_at_ms.map(ts_ms_to_rfc3339),
            finished_at: row.finished_at_ms.map(ts_ms_to_rfc3339),
            duration_ms: stage_duration_ms(row.started_at_ms, row.finished_at_ms, now_ms),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub role: &'static str,
}

impl MemberView {
    fn from_row(row: &MemberRow) -> Self {
        Self {
            user_id: row.user_id.clone(),
            username: row.username.clone(),
            display_name: row.display_name.clone(),
            role: row.role.as_str(),
        }
    }
}

/// Full project as returned by every mutating operation: ordered stages,
/// member list, the caller's own role and the derived total duration.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub name: String,
    pub my_role: &'static str,
    pub duration_ms: i64,
    pub stages: Vec<StageView>,
    pub members: Vec<MemberView>,
}

impl ProjectView {
    pub(crate) fn from_detail(detail: &ProjectDetail, my_role: ProjectRole, now_ms: i64) -> Self {
        let stages: Vec<StageView> = detail
            .stages
            .iter()
            .map(|s| StageView::from_row(s, now_ms))
            .collect();
        let duration_ms = stages.iter().map(|s| s.duration_ms).sum();
        Self {
            id: detail.project.id.clone(),
            name: detail.project.name.clone(),
            my_role: my_role.as_str(),
            duration_ms,
            stages,
            members: detail.members.iter().map(MemberView::from_row).collect(),
        }
    }
}

/// Listing entry: no member roster, but the same role/duration annotations.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryView {
    pub id: String,
    pub name: String,
    pub my_role: &'static str,
    pub duration_ms: i64,
    pub stages: Vec<StageView>,
}

impl ProjectSummaryView {
    pub(crate) fn from_item(item: &ProjectListItem, now_ms: i64) -> Self {
        let stages: Vec<StageView> = item
            .stages
            .iter()
            .map(|s| StageView::from_row(s, now_ms))
            .collect();
        let duration_ms = stages.iter().map(|s| s.duration_ms).sum();
        Self {
            id: item.project.id.clone(),
            name: item.project.name.clone(),
            my_role: item.my_role.as_str(),
            duration_ms,
            stages,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: &'static str,
}

impl UserView {
    pub(crate) fn from_row(row: &UserRow) -> Self {
        Self {
            id: row.id.clone(),
            email: row.email.clone(),
            username: row.username.clone(),
            display_name: row.display_name.clone(),
            role: row.role.as_str(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub seq: i64,
    pub ts: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    pub payload: serde_json::Value,
}

impl EventView {
    pub(crate) fn from_row(row: &EventRow) -> Self {
        Self {
            seq: row.seq,
            ts: ts_ms_to_rfc3339(row.ts_ms),
            event_type: row.event_type.clone(),
            stage_id: row.stage_id.clone(),
            payload: serde_json::from_str(&row.payload_json)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}
