#![forbid(unsafe_code)]

use st_api::{ErrorKind, NewStage, ProjectService, RegisterUserRequest};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("st_api_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn register(service: &mut ProjectService, id: &str) {
    service
        .register_user(RegisterUserRequest {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: id.to_string(),
            display_name: id.to_string(),
            role: None,
        })
        .expect("register user");
}

fn stage(id: &str) -> NewStage {
    NewStage {
        id: Some(id.to_string()),
        title: Some(id.to_uppercase()),
        ..Default::default()
    }
}

fn seeded_service(test_name: &str) -> ProjectService {
    init_tracing();
    let mut service = ProjectService::open(temp_dir(test_name)).expect("open service");
    register(&mut service, "alice");
    register(&mut service, "bob");
    service
        .create_project("alice", "proj", "Project", vec![stage("a"), stage("b"), stage("c")])
        .expect("create project");
    service
        .invite_member("proj", "alice", "bob", None)
        .expect("invite bob");
    service
}

#[test]
fn workflow_round_trip_through_the_service() {
    let mut service = seeded_service("workflow_round_trip");

    let view = service
        .set_stage_status("proj", "a", "alice", "done")
        .expect("complete a");
    assert_eq!(view.stages[0].status, "done");
    assert_eq!(view.stages[1].status, "in_progress");
    assert!(view.stages[1].started_at.is_some());
    assert_eq!(view.stages[2].status, "blocked");

    let view = service
        .set_stage_status("proj", "a", "alice", "in_progress")
        .expect("reopen a");
    assert_eq!(view.stages[1].status, "blocked");
    assert!(view.stages[1].started_at.is_none());
    assert_eq!(view.stages[2].status, "blocked");
}

#[test]
fn wire_shape_uses_camel_case_and_rfc3339() {
    let mut service = seeded_service("wire_shape");
    let view = service
        .set_stage_status("proj", "a", "alice", "done")
        .expect("complete a");

    let value = serde_json::to_value(&view).expect("serialize view");
    assert_eq!(value["myRole"], "admin");
    assert!(value["durationMs"].is_i64());

    let first = &value["stages"][0];
    assert_eq!(first["id"], "a");
    assert!(first["startedAt"].is_string());
    assert!(first["finishedAt"].is_string());
    let started = first["startedAt"].as_str().expect("string");
    assert!(started.ends_with('Z'), "RFC 3339 UTC, got {started}");
    assert!(first["durationMs"].as_i64().expect("int") >= 0);

    // Unset optionals are omitted, not null.
    let last = &value["stages"][2];
    assert!(last.get("startedAt").is_none());
    assert!(last.get("finishedAt").is_none());
    assert!(last.get("assigneeId").is_none());

    let member = &value["members"][0];
    assert_eq!(member["userId"], "alice");
    assert_eq!(member["displayName"], "alice");
}

#[test]
fn error_kinds_carry_transport_hints() {
    let mut service = seeded_service("error_kinds");

    let err = service
        .set_stage_status("proj", "a", "mallory", "done")
        .expect_err("mallory is not registered as a member");
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.kind.status_hint(), 404);

    let err = service
        .set_stage_status("proj", "b", "bob", "done")
        .expect_err("executor cannot complete");
    // b is blocked behind a: the advance rule fires before authorization.
    assert_eq!(err.kind, ErrorKind::PredecessorIncomplete);
    assert_eq!(err.kind.status_hint(), 400);

    service
        .set_stage_status("proj", "a", "alice", "done")
        .expect("complete a");
    let err = service
        .set_stage_status("proj", "b", "bob", "done")
        .expect_err("unassigned executor cannot complete");
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(err.kind.status_hint(), 403);

    let err = service
        .set_stage_status("proj", "b", "alice", "paused")
        .expect_err("invalid status");
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    assert_eq!(err.kind.status_hint(), 400);

    let err = service
        .create_project("alice", "proj", "Again", Vec::new())
        .expect_err("duplicate project id");
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.kind.status_hint(), 409);

    register(&mut service, "carol");
    let err = service
        .set_stage_assignee("proj", "b", "alice", Some("carol"))
        .expect_err("carol is not a member");
    assert_eq!(err.kind, ErrorKind::NotAMember);

    let err = service
        .leave_project("proj", "alice")
        .expect_err("sole admin cannot leave");
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[test]
fn listing_reflects_membership_and_duration() {
    let mut service = seeded_service("listing");
    register(&mut service, "carol");

    service
        .create_project("carol", "side", "Side quest", Vec::new())
        .expect("carol's project");

    let mine = service.list_projects("alice").expect("alice list");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, "proj");
    assert_eq!(mine[0].my_role, "admin");

    let bobs = service.list_projects("bob").expect("bob list");
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].my_role, "executor");

    // A running first stage accrues duration.
    assert!(bobs[0].duration_ms >= 0);
    let carols = service.list_projects("carol").expect("carol list");
    assert_eq!(carols.len(), 1);
    assert_eq!(carols[0].id, "side");
}

#[test]
fn stage_title_and_notes_round_trip() {
    let mut service = seeded_service("title_notes");

    let view = service
        .set_stage_title("proj", "a", "alice", "Kickoff")
        .expect("retitle");
    assert_eq!(view.stages[0].title, "Kickoff");

    let err = service
        .set_stage_title("proj", "a", "alice", "   ")
        .expect_err("blank title");
    assert_eq!(err.kind, ErrorKind::InvalidInput);

    let view = service
        .set_stage_notes("proj", "a", "bob", Some("ready for review"))
        .expect("bob writes notes");
    assert_eq!(view.stages[0].notes.as_deref(), Some("ready for review"));
}

#[test]
fn delete_stage_reindexes_and_audit_log_records_it() {
    let mut service = seeded_service("delete_and_events");

    let view = service
        .delete_stage("proj", "a", "alice")
        .expect("delete a");
    assert_eq!(view.stages.len(), 2);
    assert_eq!(view.stages[0].id, "b");
    assert_eq!(view.stages[0].order, 1);
    assert_eq!(view.stages[0].status, "in_progress");

    let events = service
        .list_events("proj", "alice", 0, 100)
        .expect("events");
    let deletion = events
        .iter()
        .find(|e| e.event_type == "stage.delete")
        .expect("deletion event");
    assert_eq!(deletion.stage_id.as_deref(), Some("a"));
    assert_eq!(deletion.payload["unlockedFirst"], true);

    let err = service
        .list_events("proj", "bob", 0, 100)
        .map(|_| ())
        .err();
    assert!(err.is_none(), "members may read the audit log");
}

#[test]
fn deleting_a_project_removes_it_for_everyone() {
    let mut service = seeded_service("delete_project");

    service
        .delete_project("proj", "alice")
        .expect("delete project");

    let err = service
        .get_project("proj", "alice")
        .expect_err("project is gone");
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(service.list_projects("bob").expect("bob list").is_empty());
}
