#![forbid(unsafe_code)]

use crate::error::{ApiError, ErrorKind};
use crate::time::now_ms_i64;
use crate::views::{EventView, ProjectSummaryView, ProjectView, UserView};
use st_core::model::{GlobalRole, ProjectRole};
use st_storage::{CreateProjectRequest, NewStage, NewUser, ProjectDetail, SqliteStore, StoreError};
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct RegisterUserRequest {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    /// Account-level role; defaults to `user`.
    pub role: Option<GlobalRole>,
}

/// The engine's external interface. Every mutating operation is authorized,
/// validated and cascaded inside one storage transaction, then the refreshed
/// project is returned.
#[derive(Debug)]
pub struct ProjectService {
    store: SqliteStore,
}

impl ProjectService {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, ApiError> {
        let store = SqliteStore::open(storage_dir).map_err(ApiError::from)?;
        Ok(Self { store })
    }

    pub fn register_user(&mut self, request: RegisterUserRequest) -> Result<UserView, ApiError> {
        let row = self
            .store
            .user_create(NewUser {
                id: request.id,
                email: request.email,
                username: request.username,
                display_name: request.display_name,
                role: request.role.unwrap_or(GlobalRole::User),
            })
            .map_err(|err| fail("user.register", err))?;
        info!(op = "user.register", user = %row.id, "user registered");
        Ok(UserView::from_row(&row))
    }

    pub fn create_project(
        &mut self,
        actor_user_id: &str,
        id: &str,
        name: &str,
        stages: Vec<NewStage>,
    ) -> Result<ProjectView, ApiError> {
        let detail = self
            .store
            .project_create(
                actor_user_id,
                CreateProjectRequest {
                    id: id.to_string(),
                    name: name.to_string(),
                    stages,
                },
            )
            .map_err(|err| fail("project.create", err))?;
        info!(
            op = "project.create",
            project = %detail.project.id,
            actor = actor_user_id,
            stages = detail.stages.len(),
            "project created"
        );
        view_for(&detail, actor_user_id)
    }

    pub fn get_project(
        &self,
        project_id: &str,
        actor_user_id: &str,
    ) -> Result<ProjectView, ApiError> {
        let (detail, role) = self
            .store
            .project_get(actor_user_id, project_id)
            .map_err(|err| fail("project.get", err))?;
        Ok(ProjectView::from_detail(&detail, role, now_ms_i64()))
    }

    pub fn list_projects(
        &self,
        actor_user_id: &str,
    ) -> Result<Vec<ProjectSummaryView>, ApiError> {
        let now_ms = now_ms_i64();
        let items = self
            .store
            .projects_list(actor_user_id)
            .map_err(|err| fail("project.list", err))?;
        Ok(items
            .iter()
            .map(|item| ProjectSummaryView::from_item(item, now_ms))
            .collect())
    }

    pub fn rename_project(
        &mut self,
        project_id: &str,
        actor_user_id: &str,
        name: &str,
    ) -> Result<ProjectView, ApiError> {
        let detail = self
            .store
            .project_rename(actor_user_id, project_id, name)
            .map_err(|err| fail("project.rename", err))?;
        info!(op = "project.rename", project = project_id, actor = actor_user_id, "project renamed");
        view_for(&detail, actor_user_id)
    }

    pub fn delete_project(
        &mut self,
        project_id: &str,
        actor_user_id: &str,
    ) -> Result<(), ApiError> {
        self.store
            .project_delete(actor_user_id, project_id)
            .map_err(|err| fail("project.delete", err))?;
        info!(op = "project.delete", project = project_id, actor = actor_user_id, "project deleted");
        Ok(())
    }

    /// Invite by username; `role` defaults to `executor`.
    pub fn invite_member(
        &mut self,
        project_id: &str,
        actor_user_id: &str,
        target_username: &str,
        role: Option<&str>,
    ) -> Result<(), ApiError> {
        let role = match role {
            None => ProjectRole::Executor,
            Some(raw) => ProjectRole::parse(raw)
                .ok_or_else(|| ApiError::invalid("role must be admin or executor"))?,
        };
        self.store
            .member_invite(actor_user_id, project_id, target_username, role)
            .map_err(|err| fail("member.invite", err))?;
        info!(
            op = "member.invite",
            project = project_id,
            actor = actor_user_id,
            target = target_username,
            role = role.as_str(),
            "member invited"
        );
        Ok(())
    }

    pub fn leave_project(
        &mut self,
        project_id: &str,
        actor_user_id: &str,
    ) -> Result<(), ApiError> {
        self.store
            .member_leave(actor_user_id, project_id)
            .map_err(|err| fail("member.leave", err))?;
        info!(op = "member.leave", project = project_id, actor = actor_user_id, "member left");
        Ok(())
    }

    pub fn set_stage_status(
        &mut self,
        project_id: &str,
        stage_id: &str,
        actor_user_id: &str,
        status: &str,
    ) -> Result<ProjectView, ApiError> {
        let detail = self
            .store
            .stage_set_status(actor_user_id, project_id, stage_id, status)
            .map_err(|err| fail("stage.status", err))?;
        info!(
            op = "stage.status",
            project = project_id,
            stage = stage_id,
            actor = actor_user_id,
            status,
            "stage status changed"
        );
        view_for(&detail, actor_user_id)
    }

    pub fn set_stage_assignee(
        &mut self,
        project_id: &str,
        stage_id: &str,
        actor_user_id: &str,
        target_username: Option<&str>,
    ) -> Result<ProjectView, ApiError> {
        let detail = self
            .store
            .stage_set_assignee(actor_user_id, project_id, stage_id, target_username)
            .map_err(|err| fail("stage.assign", err))?;
        info!(
            op = "stage.assign",
            project = project_id,
            stage = stage_id,
            actor = actor_user_id,
            "stage assignee changed"
        );
        view_for(&detail, actor_user_id)
    }

    pub fn set_stage_notes(
        &mut self,
        project_id: &str,
        stage_id: &str,
        actor_user_id: &str,
        notes: Option<&str>,
    ) -> Result<ProjectView, ApiError> {
        let detail = self
            .store
            .stage_set_notes(actor_user_id, project_id, stage_id, notes)
            .map_err(|err| fail("stage.notes", err))?;
        view_for(&detail, actor_user_id)
    }

    pub fn set_stage_title(
        &mut self,
        project_id: &str,
        stage_id: &str,
        actor_user_id: &str,
        title: &str,
    ) -> Result<ProjectView, ApiError> {
        let detail = self
            .store
            .stage_set_title(actor_user_id, project_id, stage_id, title)
            .map_err(|err| fail("stage.title", err))?;
        view_for(&detail, actor_user_id)
    }

    pub fn delete_stage(
        &mut self,
        project_id: &str,
        stage_id: &str,
        actor_user_id: &str,
    ) -> Result<ProjectView, ApiError> {
        let detail = self
            .store
            .stage_delete(actor_user_id, project_id, stage_id)
            .map_err(|err| fail("stage.delete", err))?;
        info!(
            op = "stage.delete",
            project = project_id,
            stage = stage_id,
            actor = actor_user_id,
            "stage deleted"
        );
        view_for(&detail, actor_user_id)
    }

    pub fn list_events(
        &self,
        project_id: &str,
        actor_user_id: &str,
        since_seq: i64,
        limit: usize,
    ) -> Result<Vec<EventView>, ApiError> {
        let rows = self
            .store
            .events_list(actor_user_id, project_id, since_seq, limit)
            .map_err(|err| fail("events.list", err))?;
        Ok(rows.iter().map(EventView::from_row).collect())
    }
}

fn view_for(detail: &ProjectDetail, actor_user_id: &str) -> Result<ProjectView, ApiError> {
    let role = detail
        .members
        .iter()
        .find(|m| m.user_id == actor_user_id)
        .map(|m| m.role)
        .ok_or_else(|| ApiError {
            kind: ErrorKind::Storage,
            message: "actor membership missing from refreshed project".to_string(),
        })?;
    Ok(ProjectView::from_detail(detail, role, now_ms_i64()))
}

fn fail(op: &'static str, err: StoreError) -> ApiError {
    let api = ApiError::from(err);
    warn!(op, kind = api.kind.as_str(), "{}", api.message);
    api
}
