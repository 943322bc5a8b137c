//! Session lifecycle, identity upgrades, rollback and event release

mod common;

use std::sync::Arc;

use chronicle_engine::{
    Database, DatabaseConfig, Error, ObjectKind, SessionState, UpdateEventOperation,
};
use common::{Recorder, TestDb};

#[test]
fn identity_upgrade_is_visible_to_every_reference() {
    let t = TestDb::new();
    let mut first = t
        .chronicles
        .new_chronicle(None, "fx", "Currencies", None)
        .unwrap();
    let second = first.clone();
    assert!(first.is_in_construction() && second.is_in_construction());
    assert!(matches!(second.surrogate().id(), Err(Error::Identity { .. })));

    t.chronicles.apply(&mut first).unwrap();
    assert!(!second.is_in_construction());
    assert_eq!(second.surrogate().id().unwrap(), first.surrogate().id().unwrap());

    // a later lookup hands out the same identity
    let found = t.chronicles.get("bt.fx").unwrap();
    assert_eq!(found.surrogate(), second.surrogate());
}

#[test]
fn rollback_reverts_construction_state() {
    let t = TestDb::new();
    let mut fx = t
        .chronicles
        .new_chronicle(None, "fx", "Currencies", None)
        .unwrap();
    t.chronicles.apply(&mut fx).unwrap();
    assert!(!fx.is_in_construction());

    t.db.rollback().unwrap();
    assert!(fx.is_in_construction());
    assert!(matches!(
        t.chronicles.get("bt.fx"),
        Err(Error::NotFound { kind: ObjectKind::Chronicle, .. })
    ));
    let recreated = t
        .chronicles
        .new_chronicle(None, "fx", "Currencies", None)
        .unwrap();
    assert!(recreated.is_in_construction());

    // the rolled back handle can be applied again
    t.chronicles.apply(&mut fx).unwrap();
    t.db.commit().unwrap();
    assert!(t.chronicles.get("bt.fx").is_ok());
}

#[test]
fn schema_edit_is_reapplied_after_rollback() {
    let t = TestDb::new();
    let ticker = t.text_property("Ticker");
    t.series_schema("S", None, &["close"]);
    t.db.commit().unwrap();

    let mut schema = t.schemas.get("S").unwrap();
    schema.add_attribute(0, 1).unwrap();
    schema.set_attribute_property(0, 1, &ticker).unwrap();
    schema.set_series_description(1, Some("Close")).unwrap();
    let diff = t.schemas.apply(&mut schema).unwrap();
    assert_eq!((diff.created(), diff.updated()), (1, 1));

    t.db.rollback().unwrap();
    assert!(t.schemas.get("S").unwrap().own_component(0, 1).is_none());

    // the same handle still carries the edit and writes it again
    let diff = t.schemas.apply(&mut schema).unwrap();
    assert_eq!((diff.created(), diff.updated()), (1, 1));
    t.db.commit().unwrap();

    let stored = t.schemas.get("S").unwrap();
    assert!(stored.own_component(0, 1).is_some());
    assert_eq!(
        stored.own_series(1).unwrap().description(),
        Some("Close")
    );
    assert!(t.schemas.apply(&mut schema).unwrap().is_empty());
}

#[test]
fn rollback_restores_deleted_objects() {
    let t = TestDb::new();
    let fx = t.chronicle(None, "fx", None);
    t.db.commit().unwrap();

    t.chronicles.delete(&fx).unwrap();
    assert!(fx.surrogate().is_invalidated());
    t.db.rollback().unwrap();

    assert!(!fx.surrogate().is_invalidated());
    let found = t.chronicles.get("bt.fx").unwrap();
    assert_eq!(found.surrogate(), fx.surrogate());
}

#[test]
fn events_released_on_commit_and_discarded_on_rollback() {
    let t = TestDb::new();
    let all = Arc::new(Recorder::default());
    let chronicles = Arc::new(Recorder::default());
    t.db.subscribe(&[], all.clone());
    t.db.subscribe(&[ObjectKind::Chronicle], chronicles.clone());

    let fx = t.chronicle(None, "fx", None);
    t.text_property("Ticker");
    assert_eq!(all.len(), 0);

    // value type, property and chronicle
    assert_eq!(t.db.commit().unwrap(), 3);
    assert_eq!(all.len(), 3);
    assert_eq!(chronicles.len(), 1);
    let created = &chronicles.events()[0];
    assert_eq!(created.operation, UpdateEventOperation::Create);
    assert_eq!(created.comment.as_deref(), Some("bt.fx"));

    t.chronicles.delete(&fx).unwrap();
    assert_eq!(t.db.rollback().unwrap(), 1);
    assert_eq!(all.len(), 3);

    t.chronicles.delete(&fx).unwrap();
    t.db.commit().unwrap();
    let deleted = chronicles.events().pop().unwrap();
    assert_eq!(deleted.operation, UpdateEventOperation::Delete);
    assert_eq!(deleted.comment.as_deref(), Some("bt.fx - fx"));

    let metrics = t.db.metrics();
    assert_eq!(metrics.total_rolled_back, 1);
    assert_eq!(metrics.events_discarded, 1);
    assert_eq!(metrics.pending_events, 0);
}

#[test]
fn failed_operation_leaves_no_trace() {
    let t = TestDb::new();
    let schema = t.series_schema("Prices", None, &["close"]);
    let fx = t.chronicle(None, "fx", Some(&schema));
    t.db.commit().unwrap();

    assert!(t.schemas.delete(&schema).is_err());
    assert!(!t.db.has_pending_changes());
    assert!(!schema.surrogate().is_invalidated());
    assert_eq!(t.chronicles.get("bt.fx").unwrap().surrogate(), fx.surrogate());
}

#[test]
fn session_cannot_be_constructed_twice() {
    let name = format!("twice-{}", uuid::Uuid::new_v4());
    let db = Database::new(DatabaseConfig::named(name.clone())).unwrap();
    assert!(matches!(
        Database::new(DatabaseConfig::named(name.clone())),
        Err(Error::Configuration(_))
    ));

    db.open().unwrap();
    assert_eq!(db.state(), SessionState::Open);
    db.close().unwrap();
    assert_eq!(db.state(), SessionState::Closed);
    assert!(matches!(db.commit(), Err(Error::InvalidOperation(_))));

    let again = Database::new(DatabaseConfig::named(name)).unwrap();
    assert_eq!(again.state(), SessionState::Uninitialized);
}

#[test]
fn closing_discards_uncommitted_work() {
    let t = TestDb::new();
    let fx = t.chronicle(None, "fx", None);
    t.db.close().unwrap();
    assert!(fx.is_in_construction());
    assert!(t.chronicles.get("bt.fx").is_err());
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = DatabaseConfig::named(format!("bad-{}", uuid::Uuid::new_v4()));
    config.top_chronicle = "a.b".to_string();
    assert!(matches!(Database::new(config), Err(Error::Configuration(_))));
}
