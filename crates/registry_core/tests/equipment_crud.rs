use registry_core::db::open_db_in_memory;
use registry_core::{
    Action, Atomicity, EquipmentCreate, EquipmentKind, EquipmentParameters, EquipmentRepository,
    EquipmentService, FilterSpec, OperationalStatus, RepoError, SqliteEquipmentRepository,
    TargetOutcome, UpdatePatch, ValidationError,
};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn params(value: serde_json::Value) -> EquipmentParameters {
    value.as_object().unwrap().clone()
}

fn drill(depth: i64) -> EquipmentCreate {
    EquipmentCreate::new(
        EquipmentKind::DrillMachine,
        params(json!({ "max_depth_mm": depth })),
    )
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM equipment;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_then_find_returns_default_status() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();

    let intent = EquipmentCreate::new(
        EquipmentKind::RoboticArm,
        params(json!({ "axes": 6, "payload_kg": 12.5, "vendor": "KUKA" })),
    );
    let id = repo.create_one(&intent).unwrap();

    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.kind, EquipmentKind::RoboticArm);
    assert_eq!(loaded.parameters, intent.parameters);
    assert_eq!(loaded.status, OperationalStatus::Operational);
    assert_eq!(loaded.created_at, loaded.updated_at);
}

#[test]
fn create_many_returns_ids_in_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();

    let intents = [drill(10), drill(20), drill(30)];
    let ids = repo.create_many(&intents, Atomicity::Independent).unwrap();
    assert_eq!(ids.len(), 3);

    for (id, intent) in ids.iter().zip(&intents) {
        let loaded = repo.find_by_id(*id).unwrap().unwrap();
        assert_eq!(loaded.parameters, intent.parameters);
    }
}

#[test]
fn atomic_batch_rolls_back_every_row_on_failure() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_deep_drills BEFORE INSERT ON equipment
         WHEN json_extract(NEW.parameters, '$.max_depth_mm') > 100
         BEGIN SELECT RAISE(ABORT, 'too deep'); END;",
    )
    .unwrap();

    let intents = [drill(10), drill(500), drill(30)];
    let err = repo.create_many(&intents, Atomicity::Atomic).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Persistence {
            action: Action::Create,
            ..
        }
    ));
    assert_eq!(err.status_code(), 500);
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn independent_batch_keeps_rows_before_failure() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_deep_drills BEFORE INSERT ON equipment
         WHEN json_extract(NEW.parameters, '$.max_depth_mm') > 100
         BEGIN SELECT RAISE(ABORT, 'too deep'); END;",
    )
    .unwrap();

    let intents = [drill(10), drill(500), drill(30)];
    repo.create_many(&intents, Atomicity::Independent)
        .unwrap_err();
    assert_eq!(row_count(&conn), 1);
}

#[test]
fn blank_parameter_key_is_rejected_before_insert() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();

    let intent = EquipmentCreate::new(EquipmentKind::CNCMachine, params(json!({ " ": 1 })));
    let err = repo.create_one(&intent).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::BlankParameterKey)
    ));
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn update_by_id_changes_only_patched_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let id = repo.create_one(&drill(40)).unwrap();
    conn.execute(
        "UPDATE equipment SET created_at = 1000, updated_at = 1000 WHERE id = ?1;",
        [id.to_string()],
    )
    .unwrap();

    let patch = UpdatePatch::from_status(OperationalStatus::UnderMaintenance);
    assert!(repo.update_by_id(id, &patch).unwrap());

    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.status, OperationalStatus::UnderMaintenance);
    assert_eq!(loaded.parameters, drill(40).parameters);
    assert_eq!(loaded.created_at, 1000);
    assert!(loaded.updated_at > 1000);

    let replacement = params(json!({ "max_depth_mm": 45, "bit": "carbide" }));
    assert!(repo
        .update_by_id(id, &UpdatePatch::from_parameters(replacement.clone()))
        .unwrap());
    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.status, OperationalStatus::UnderMaintenance);
    assert_eq!(loaded.parameters, replacement);
}

#[test]
fn updated_at_never_drops_below_created_at() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let id = repo.create_one(&drill(40)).unwrap();
    let far_future = 32_503_680_000_000_i64;
    conn.execute(
        "UPDATE equipment SET created_at = ?1, updated_at = ?1 WHERE id = ?2;",
        rusqlite::params![far_future, id.to_string()],
    )
    .unwrap();

    let patch = UpdatePatch::from_status(OperationalStatus::Decommissioned);
    assert!(repo.update_by_id(id, &patch).unwrap());
    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.updated_at, far_future);
}

#[test]
fn repository_single_target_misses_are_false_or_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let missing = Uuid::now_v7();

    let patch = UpdatePatch::from_status(OperationalStatus::Decommissioned);
    assert!(!repo.update_by_id(missing, &patch).unwrap());
    assert!(!repo.delete_by_id(missing).unwrap());
    assert!(repo.find_by_id(missing).unwrap().is_none());
}

#[test]
fn delete_twice_observes_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let id = repo.create_one(&drill(5)).unwrap();

    assert!(repo.delete_by_id(id).unwrap());
    assert!(!repo.delete_by_id(id).unwrap());

    let service = EquipmentService::new(repo);
    let err = service.delete_targets(&[id]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            action: Action::Delete,
            ref ids,
        } if ids == &vec![id]
    ));
    assert_eq!(err.status_code(), 404);
    assert!(err.to_string().contains(&id.to_string()));
}

#[test]
fn update_targets_partitions_partial_matches() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let first = repo.create_one(&drill(1)).unwrap();
    let second = repo.create_one(&drill(2)).unwrap();
    let missing = Uuid::now_v7();

    let service = EquipmentService::new(repo);
    let patch = UpdatePatch::from_status(OperationalStatus::UnderMaintenance);
    let requested = [second, missing, first];
    let outcome = service.update_targets(&requested, &patch).unwrap();

    let TargetOutcome::Partial(partition) = &outcome else {
        panic!("expected partial outcome, got {outcome:?}");
    };
    assert_eq!(partition.matched, vec![second, first]);
    assert_eq!(partition.unfound, vec![missing]);
    assert_eq!(outcome.status_code(204), 207);

    let mut union = partition.matched.clone();
    union.extend(&partition.unfound);
    union.sort();
    let mut expected = requested.to_vec();
    expected.sort();
    assert_eq!(union, expected);
}

#[test]
fn single_target_update_miss_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    repo.create_one(&drill(1)).unwrap();
    let service = EquipmentService::new(repo);

    let missing = Uuid::now_v7();
    let err = service
        .update_targets(
            &[missing],
            &UpdatePatch::from_status(OperationalStatus::Decommissioned),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            action: Action::Update,
            ..
        }
    ));
}

#[test]
fn find_targets_returns_records_in_request_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let ids = repo
        .create_many(&[drill(1), drill(2), drill(3)], Atomicity::Atomic)
        .unwrap();
    let service = EquipmentService::new(repo);

    let requested = [ids[2], ids[0], ids[1]];
    let outcome = service.find_targets(&requested).unwrap();
    let found = outcome.matched().iter().map(|record| record.id).collect::<Vec<_>>();
    assert_eq!(found, requested.to_vec());
    assert!(!outcome.is_partial());
}

#[test]
fn empty_target_sets_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    repo.create_one(&drill(1)).unwrap();

    assert!(matches!(
        repo.delete_by_ids(&[]),
        Err(RepoError::Validation(ValidationError::EmptyTargetSet))
    ));
    assert_eq!(row_count(&conn), 1);
}

#[test]
fn update_by_conditions_with_empty_patch_has_no_side_effects() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let id = repo.create_one(&drill(1)).unwrap();
    let before = repo.find_by_id(id).unwrap().unwrap();

    let err = repo
        .update_by_conditions(&FilterSpec::default(), &UpdatePatch::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::NothingToUpdate)
    ));
    assert_eq!(err.status_code(), 400);
    assert_eq!(repo.find_by_id(id).unwrap().unwrap(), before);
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteEquipmentRepository::try_new(&conn)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn corrupt_row_surfaces_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let id = repo.create_one(&drill(1)).unwrap();
    conn.execute_batch("PRAGMA ignore_check_constraints = ON;")
        .unwrap();
    conn.execute(
        "UPDATE equipment SET kind = 9 WHERE id = ?1;",
        [id.to_string()],
    )
    .unwrap();

    let err = repo.find_by_id(id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn find_targets_partitions_found_records_and_unfound_ids() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let first = repo.create_one(&drill(1)).unwrap();
    let second = repo.create_one(&drill(2)).unwrap();
    let missing = Uuid::now_v7();
    let service = EquipmentService::new(repo);

    let outcome = service.find_targets(&[missing, second, first]).unwrap();
    assert!(outcome.is_partial());
    assert_eq!(outcome.status_code(200), 207);

    let TargetOutcome::Partial(partition) = outcome else {
        panic!("expected partial outcome");
    };
    let found = partition
        .matched
        .iter()
        .map(|record| record.id)
        .collect::<Vec<_>>();
    assert_eq!(found, vec![second, first]);
    assert_eq!(partition.unfound, vec![missing]);

    let body = partition.to_json("found");
    assert_eq!(body["found"][0]["id"], json!(second.to_string()));
    assert_eq!(body["unfound"], json!([missing.to_string()]));
}

#[test]
fn delete_targets_removes_matches_and_reports_unfound() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEquipmentRepository::try_new(&conn).unwrap();
    let kept = repo.create_one(&drill(1)).unwrap();
    let doomed = repo.create_one(&drill(2)).unwrap();
    let missing = Uuid::now_v7();
    let service = EquipmentService::new(repo);

    let outcome = service.delete_targets(&[doomed, missing]).unwrap();
    assert_eq!(outcome.status_code(204), 207);
    let TargetOutcome::Partial(partition) = outcome else {
        panic!("expected partial outcome");
    };
    assert_eq!(partition.matched, vec![doomed]);
    assert_eq!(partition.unfound, vec![missing]);

    assert_eq!(row_count(&conn), 1);
    assert!(service.repository().find_by_id(kept).unwrap().is_some());
    assert!(service.repository().find_by_id(doomed).unwrap().is_none());
}
