//! Index store tests: checkpoint round-trips, resumable reopen, counts.

use zdb_index::engine::db_ops::{
    checkpoint_index, load_index, open_db, open_db_in_memory, record_count,
};
use zdb_index::engine::merge::DnodeIndex;
use zdb_index::types::{DnodeRecord, FieldValue};

fn sample_record(id: u64) -> DnodeRecord {
    DnodeRecord::new(
        id,
        1,
        "128K".into(),
        "512".into(),
        "1K".into(),
        "512".into(),
        "512".into(),
        100.0,
        "ZFS plain file".into(),
    )
}

#[test]
fn test_checkpoint_then_load_round_trips_all_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    index.upsert_mandatory(sample_record(42)).unwrap();
    index
        .merge_optional(42, FieldValue::Flags("USED_BYTES".into()))
        .unwrap();
    index.merge_optional(42, FieldValue::MaxBlkId(7)).unwrap();
    index
        .merge_optional(42, FieldValue::Path(b"/srv/\xff/data.bin".to_vec()))
        .unwrap();
    index.merge_optional(42, FieldValue::Uid(1000)).unwrap();
    index.merge_optional(42, FieldValue::Gid(100)).unwrap();
    index
        .merge_optional(42, FieldValue::Atime("Wed Dec 2 22:29:33 2020".into()))
        .unwrap();
    index
        .merge_optional(42, FieldValue::Mode("100644".into()))
        .unwrap();
    index.merge_optional(42, FieldValue::Size(4096)).unwrap();
    index.merge_optional(42, FieldValue::Parent(34)).unwrap();
    index.merge_optional(42, FieldValue::Links(1)).unwrap();
    index
        .merge_optional(42, FieldValue::Pflags("40800000004".into()))
        .unwrap();
    // a second record with every optional field still null
    index.upsert_mandatory(sample_record(43)).unwrap();

    checkpoint_index(&mut conn, &index).unwrap();

    let loaded = load_index(&conn).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get(&42), index.get(42));
    assert_eq!(loaded.get(&43), index.get(43));
    assert_eq!(record_count(&conn).unwrap(), 2);
}

#[test]
fn test_recheckpoint_is_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    for id in 1..=5 {
        index.upsert_mandatory(sample_record(id)).unwrap();
    }
    checkpoint_index(&mut conn, &index).unwrap();
    checkpoint_index(&mut conn, &index).unwrap();
    assert_eq!(record_count(&conn).unwrap(), 5);
    assert_eq!(load_index(&conn).unwrap().len(), 5);
}

#[test]
fn test_later_checkpoint_overwrites_enriched_row() {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    index.upsert_mandatory(sample_record(9)).unwrap();
    checkpoint_index(&mut conn, &index).unwrap();
    assert_eq!(load_index(&conn).unwrap().get(&9).unwrap().path, None);

    index
        .merge_optional(9, FieldValue::Path(b"/late".to_vec()))
        .unwrap();
    checkpoint_index(&mut conn, &index).unwrap();
    assert_eq!(
        load_index(&conn).unwrap().get(&9).unwrap().path.as_deref(),
        Some(b"/late".as_slice())
    );
}

#[test]
fn test_reopen_file_backed_store_resumes_in_enrichment_mode() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tank_data.db");

    {
        let mut conn = open_db(&db_path).unwrap();
        let mut index = DnodeIndex::new();
        index.upsert_mandatory(sample_record(1)).unwrap();
        index.merge_optional(1, FieldValue::Parent(34)).unwrap();
        checkpoint_index(&mut conn, &index).unwrap();
    }

    let conn = open_db(&db_path).unwrap();
    let stored = load_index(&conn).unwrap();
    let index = DnodeIndex::from_records(stored);
    assert!(index.enrichment());
    assert_eq!(index.len(), 1);
    assert_eq!(index.get(1).unwrap().parent, Some(34));
}

#[test]
fn test_empty_store_loads_fresh() {
    let conn = open_db_in_memory().unwrap();
    let index = DnodeIndex::from_records(load_index(&conn).unwrap());
    assert!(!index.enrichment());
    assert!(index.is_empty());
}
