//! End-to-end use of the re-exported API, as shown in the crate docs

use chronicle_store::{
    Catalog, ChronicleStore, Database, DatabaseConfig, SchemaStore, SeriesStore,
    CONFIG_FILE_NAME,
};

#[test]
fn quick_start_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let name = format!("quickstart-{}", uuid::Uuid::new_v4());
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        format!("name = \"{}\"\ntop_chronicle = \"root\"\n", name),
    )
    .unwrap();
    let db = Database::from_config_dir(dir.path()).unwrap();

    let catalog = Catalog::new(db.clone());
    let text = catalog.create_value_type("text", false, "TEXT").unwrap();
    let ticker = catalog.create_property("Ticker", &text).unwrap();

    let schemas = SchemaStore::new(db.clone());
    let mut equity = schemas.new_schema("Equity", None).unwrap();
    equity.add_attribute(0, 1).unwrap();
    equity.set_attribute_property(0, 1, &ticker).unwrap();
    equity.add_series(1).unwrap();
    equity.set_series_name(1, "close").unwrap();
    equity.set_series_type(1, "numeric").unwrap();
    equity.set_series_time_domain(1, "daily").unwrap();
    schemas.apply(&mut equity).unwrap();

    let chronicles = ChronicleStore::new(db.clone());
    let mut acme = chronicles
        .new_chronicle(None, "acme", "Acme Corp", Some(&equity))
        .unwrap();
    chronicles.apply(&mut acme).unwrap();
    chronicles.set_attribute(&acme, &ticker, "ACM", None).unwrap();

    let series = SeriesStore::new(db.clone());
    let close = series.create(&acme, "close").unwrap();
    assert_eq!(close.full_name(), "root.acme.close");

    assert!(db.commit().unwrap() > 0);
    assert!(!db.has_pending_changes());

    let found = chronicles.get("root.acme").unwrap();
    assert_eq!(
        chronicles.get_attribute(&found, &ticker).unwrap().as_deref(),
        Some("ACM")
    );
}
