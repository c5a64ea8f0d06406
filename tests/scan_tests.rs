//! End-to-end tests for the consume loop: fresh scans, re-scans, enrichment,
//! early exit, and crash-resume, all over synthetic zdb streams.

use std::io;

use rusqlite::Connection;
use zdb_index::engine::db_ops::{load_index, open_db, open_db_in_memory, record_count};
use zdb_index::engine::merge::DnodeIndex;
use zdb_index::error::ScanError;
use zdb_index::pipeline::{StreamOpts, consume_lines};

const HEADER_RAW: &[u8] = b"    Object  lvl   iblk   dblk  dsize  dnsize  lsize   %full  type\n";

fn stream(lines: &[&[u8]]) -> Vec<io::Result<Vec<u8>>> {
    lines.iter().map(|l| Ok(l.to_vec())).collect()
}

/// A small dataset dump: two plain files (one already pathed) and a directory.
fn structural_stream() -> Vec<io::Result<Vec<u8>>> {
    stream(&[
        b"Dataset tank/data [ZPL], ID 54, cr_txg 1, 96K, 8 objects\n",
        b"\n",
        HEADER_RAW,
        b"12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
        b"\tparent\t5\n",
        b"\tuid\t1000\n",
        HEADER_RAW,
        b"13 0 512 512 1024 168 1024 5.0 ZFS directory\n",
        b"\tparent\t5\n",
        HEADER_RAW,
        b"14 0 512 512 2048 168 2048 20.0 ZFS plain file\n",
        b"\tparent\t13\n",
        b"\tpath\t/data/known.txt\n",
    ])
}

/// Phase-2 style re-dump of object 12 with path resolution.
fn enrichment_stream_for_12() -> Vec<io::Result<Vec<u8>>> {
    stream(&[
        HEADER_RAW,
        b"12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
        b"\tparent\t5\n",
        b"\tuid\t1000\n",
        b"\tpath\t/data/found.bin\n",
    ])
}

fn fresh_scan(lines: Vec<io::Result<Vec<u8>>>) -> (DnodeIndex, Connection) {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    consume_lines(lines, &mut index, &mut conn, &StreamOpts::default()).unwrap();
    (index, conn)
}

#[test]
fn test_structural_scan_persists_everything() {
    let (index, conn) = fresh_scan(structural_stream());
    assert_eq!(index.len(), 3);
    assert_eq!(record_count(&conn).unwrap(), 3);
    assert_eq!(load_index(&conn).unwrap(), *index.records());

    let summary = index.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.with_parent, 3);
    assert_eq!(summary.distinct_parents, 2);
}

#[test]
fn test_rescan_from_scratch_is_byte_identical() {
    let (a, _) = fresh_scan(structural_stream());
    let (b, _) = fresh_scan(structural_stream());
    assert_eq!(a.records(), b.records());
}

#[test]
fn test_rescan_over_existing_store_only_confirms() {
    let (_, conn) = fresh_scan(structural_stream());
    let mut index = DnodeIndex::from_records(load_index(&conn).unwrap());
    assert!(index.enrichment());

    let mut conn2 = open_db_in_memory().unwrap();
    let outcome = consume_lines(
        structural_stream(),
        &mut index,
        &mut conn2,
        &StreamOpts::default(),
    )
    .unwrap();
    assert_eq!(outcome.finalized, 3);
    assert_eq!(index.len(), 3);
    assert_eq!(load_index(&conn2).unwrap(), load_index(&conn).unwrap());
}

#[test]
fn test_enrichment_fills_missing_path() {
    let (mut index, mut conn) = fresh_scan(structural_stream());
    assert_eq!(index.plain_file_ids_missing_path(), vec![12]);

    index.enable_enrichment();
    consume_lines(
        enrichment_stream_for_12(),
        &mut index,
        &mut conn,
        &StreamOpts::default(),
    )
    .unwrap();

    assert_eq!(
        index.get(12).unwrap().path.as_deref(),
        Some(b"/data/found.bin".as_slice())
    );
    assert!(index.plain_file_ids_missing_path().is_empty());
    assert_eq!(load_index(&conn).unwrap(), *index.records());
}

#[test]
fn test_enrichment_disagreement_is_fatal() {
    let (mut index, mut conn) = fresh_scan(structural_stream());
    index.enable_enrichment();

    let mutated = stream(&[
        HEADER_RAW,
        b"12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
        b"\tuid\t1001\n",
    ]);
    let err = consume_lines(mutated, &mut index, &mut conn, &StreamOpts::default()).unwrap_err();
    assert!(matches!(
        err,
        ScanError::InconsistentEnrichment {
            id: 12,
            field: "uid",
            ..
        }
    ));
}

#[test]
fn test_duplicate_id_in_fresh_scan_is_fatal_and_unpersisted() {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    let dup = stream(&[
        HEADER_RAW,
        b"12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
        HEADER_RAW,
        b"12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
    ]);
    let err = consume_lines(dup, &mut index, &mut conn, &StreamOpts::default()).unwrap_err();
    assert!(matches!(err, ScanError::DuplicateRecord { id: 12 }));
    // no checkpoint runs on the fatal path
    assert_eq!(record_count(&conn).unwrap(), 0);
}

#[test]
fn test_exit_early_stops_after_ceiling_but_checkpoints() {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    let outcome = consume_lines(
        structural_stream(),
        &mut index,
        &mut conn,
        &StreamOpts {
            exit_early: Some(1),
            ..StreamOpts::default()
        },
    )
    .unwrap();
    assert!(outcome.stopped_early);
    assert_eq!(outcome.finalized, 1);
    assert_eq!(index.len(), 1);
    assert!(index.get(12).is_some());
    assert_eq!(record_count(&conn).unwrap(), 1);
}

#[test]
fn test_checkpoint_cadence_mid_stream() {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    // cadence of 1 forces a checkpoint per record; combined with the
    // unconditional final one, that is the worst-case write pattern
    let outcome = consume_lines(
        structural_stream(),
        &mut index,
        &mut conn,
        &StreamOpts {
            checkpoint_every: 1,
            ..StreamOpts::default()
        },
    )
    .unwrap();
    assert_eq!(outcome.finalized, 3);
    assert_eq!(load_index(&conn).unwrap(), *index.records());
}

#[test]
fn test_interrupted_scan_resumes_to_same_result() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tank_data.db");

    // first run dies after record 12 (ceiling stands in for a crash;
    // consume_lines checkpoints whatever was parsed)
    {
        let mut conn = open_db(&db_path).unwrap();
        let mut index = DnodeIndex::new();
        consume_lines(
            structural_stream(),
            &mut index,
            &mut conn,
            &StreamOpts {
                exit_early: Some(1),
                ..StreamOpts::default()
            },
        )
        .unwrap();
    }

    // second run reopens the store and replays the full stream
    let resumed = {
        let mut conn = open_db(&db_path).unwrap();
        let mut index = DnodeIndex::from_records(load_index(&conn).unwrap());
        assert!(index.enrichment());
        consume_lines(
            structural_stream(),
            &mut index,
            &mut conn,
            &StreamOpts::default(),
        )
        .unwrap();
        load_index(&conn).unwrap()
    };

    let (uninterrupted, _) = fresh_scan(structural_stream());
    assert_eq!(resumed, *uninterrupted.records());
}

#[test]
fn test_pending_path_batches_partition_the_ids() {
    let mut conn = open_db_in_memory().unwrap();
    let mut index = DnodeIndex::new();
    let mut lines: Vec<io::Result<Vec<u8>>> = Vec::new();
    for id in 1..=7_u64 {
        let lead_in = format!("{id} 0 512 512 1024 168 1024 10.0 ZFS plain file\n");
        lines.push(Ok(HEADER_RAW.to_vec()));
        lines.push(Ok(lead_in.into_bytes()));
    }
    consume_lines(lines, &mut index, &mut conn, &StreamOpts::default()).unwrap();

    let pending = index.plain_file_ids_missing_path();
    assert_eq!(pending, vec![1, 2, 3, 4, 5, 6, 7]);
    let batches: Vec<&[u64]> = pending.chunks(3).collect();
    assert_eq!(batches, vec![&[1, 2, 3][..], &[4, 5, 6], &[7]]);
}
