#![forbid(unsafe_code)]

use st_core::model::{GlobalRole, StageStatus};
use st_storage::{CreateProjectRequest, NewStage, NewUser, SqliteStore, StoreError};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("st_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn user(id: &str) -> NewUser {
    NewUser {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        username: id.to_string(),
        display_name: id.to_string(),
        role: GlobalRole::User,
    }
}

fn stage(id: &str) -> NewStage {
    NewStage {
        id: Some(id.to_string()),
        title: Some(id.to_uppercase()),
        ..Default::default()
    }
}

fn store_with_stages(test_name: &str, ids: &[&str]) -> SqliteStore {
    let mut store = SqliteStore::open(temp_dir(test_name)).expect("open store");
    store.user_create(user("alice")).expect("create alice");
    store
        .project_create(
            "alice",
            CreateProjectRequest {
                id: "proj".to_string(),
                name: "Project".to_string(),
                stages: ids.iter().map(|id| stage(id)).collect(),
            },
        )
        .expect("create project");
    store
}

fn orders(store: &SqliteStore) -> Vec<(String, i64)> {
    let (detail, _) = store.project_get("alice", "proj").expect("get project");
    detail
        .stages
        .iter()
        .map(|s| (s.id.clone(), s.order))
        .collect()
}

#[test]
fn deleting_a_middle_stage_closes_the_gap() {
    let mut store = store_with_stages("delete_middle", &["a", "b", "c", "d"]);

    store
        .stage_delete("alice", "proj", "b")
        .expect("delete b");

    assert_eq!(
        orders(&store),
        vec![
            ("a".to_string(), 1),
            ("c".to_string(), 2),
            ("d".to_string(), 3),
        ]
    );
}

#[test]
fn orders_stay_dense_after_any_deletion_sequence() {
    let mut store = store_with_stages("delete_sequence", &["a", "b", "c", "d", "e"]);

    for victim in ["c", "a", "e"] {
        store
            .stage_delete("alice", "proj", victim)
            .expect("delete stage");
        let got: Vec<i64> = orders(&store).into_iter().map(|(_, o)| o).collect();
        let want: Vec<i64> = (1..=got.len() as i64).collect();
        assert_eq!(got, want, "orders must stay 1..N after deleting {victim}");
    }
}

#[test]
fn deleting_the_running_first_stage_unlocks_the_new_first() {
    let mut store = store_with_stages("delete_first", &["a", "b", "c"]);

    let detail = store
        .stage_delete("alice", "proj", "a")
        .expect("delete a");

    let b = &detail.stages[0];
    assert_eq!(b.order, 1);
    assert_eq!(b.status, StageStatus::InProgress);
    assert!(b.started_at_ms.is_some());
    assert_eq!(detail.stages[1].status, StageStatus::Blocked);
}

#[test]
fn unlock_after_delete_only_fires_on_a_blocked_first_stage() {
    // [A(done,1), B(done,2), C(blocked,3)]: deleting B moves C to order 2.
    // Order 1 is done, so nothing is force-unlocked and C stays blocked.
    let mut store = store_with_stages("delete_done_middle", &["a", "b", "c"]);
    store
        .stage_set_status("alice", "proj", "a", "done")
        .expect("complete a");
    store
        .stage_set_status("alice", "proj", "b", "done")
        .expect("complete b");
    store
        .stage_set_status("alice", "proj", "c", "blocked")
        .expect("re-block c");

    let detail = store
        .stage_delete("alice", "proj", "b")
        .expect("delete b");

    assert_eq!(detail.stages[0].id, "a");
    assert_eq!(detail.stages[0].status, StageStatus::Done);
    assert_eq!(detail.stages[1].id, "c");
    assert_eq!(detail.stages[1].order, 2);
    assert_eq!(detail.stages[1].status, StageStatus::Blocked);
}

#[test]
fn deleting_the_last_remaining_stage_leaves_an_empty_project() {
    let mut store = store_with_stages("delete_last", &["a"]);
    let detail = store
        .stage_delete("alice", "proj", "a")
        .expect("delete only stage");
    assert!(detail.stages.is_empty());
}

#[test]
fn duplicate_stage_ids_are_rejected_atomically() {
    let mut store = SqliteStore::open(temp_dir("dup_stage_ids")).expect("open store");
    store.user_create(user("alice")).expect("create alice");

    let err = store
        .project_create(
            "alice",
            CreateProjectRequest {
                id: "proj".to_string(),
                name: "Dup".to_string(),
                stages: vec![stage("a"), stage("a")],
            },
        )
        .expect_err("duplicate stage ids");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    // The failed create must not leave a half-written project behind.
    let err = store
        .project_get("alice", "proj")
        .expect_err("project must not exist");
    assert!(matches!(err, StoreError::UnknownProject));
}

#[test]
fn duplicate_project_id_is_a_conflict() {
    let mut store = store_with_stages("dup_project", &["a"]);
    let err = store
        .project_create(
            "alice",
            CreateProjectRequest {
                id: "proj".to_string(),
                name: "Again".to_string(),
                stages: Vec::new(),
            },
        )
        .expect_err("duplicate project id");
    assert!(matches!(err, StoreError::ProjectExists));
}
