//! Index store operations.
//!
//! One table, one row per dnode. The checkpoint unit is the whole in-memory
//! mapping: a single transaction upserts every record, then the WAL is
//! truncated. Reopening a non-empty store is how a later run resumes or
//! extends a prior one.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, Result, params};

use crate::engine::merge::DnodeIndex;
use crate::types::DnodeRecord;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS dnodes (
    object_id INTEGER PRIMARY KEY,
    lvl       INTEGER NOT NULL,
    iblk      TEXT NOT NULL,
    dblk      TEXT NOT NULL,
    dsize     TEXT NOT NULL,
    dnsize    TEXT NOT NULL,
    lsize     TEXT NOT NULL,
    pct_full  REAL NOT NULL,
    obj_type  TEXT NOT NULL,
    flags     TEXT,
    maxblkid  INTEGER,
    path      BLOB,
    uid       INTEGER,
    gid       INTEGER,
    atime     TEXT,
    mtime     TEXT,
    ctime     TEXT,
    crtime    TEXT,
    gen       INTEGER,
    mode      TEXT,
    size      INTEGER,
    parent    INTEGER,
    links     INTEGER,
    pflags    TEXT
);
CREATE INDEX IF NOT EXISTS idx_dnodes_parent ON dnodes(parent);
"#;

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO dnodes (
    object_id, lvl, iblk, dblk, dsize, dnsize, lsize, pct_full, obj_type,
    flags, maxblkid, path, uid, gid, atime, mtime, ctime, crtime,
    gen, mode, size, parent, links, pflags
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)";

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.execute_batch(
        r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#,
    )?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Open or create the index DB and ensure schema + WAL.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    apply_wal_and_schema(&conn)?;
    Ok(conn)
}

/// In-memory DB with the same schema (tests; no WAL pragmas needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn opt_i64(v: Option<u64>) -> Option<i64> {
    v.map(|x| x as i64)
}

/// Durably persist the entire current mapping in one transaction, then
/// truncate the WAL. Called on the checkpoint cadence and at stream end.
pub fn checkpoint_index(conn: &mut Connection, index: &DnodeIndex) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
        for rec in index.records().values() {
            stmt.execute(params![
                rec.object_id as i64,
                rec.lvl as i64,
                rec.iblk,
                rec.dblk,
                rec.dsize,
                rec.dnsize,
                rec.lsize,
                rec.pct_full,
                rec.obj_type,
                rec.flags,
                opt_i64(rec.maxblkid),
                rec.path,
                opt_i64(rec.uid),
                opt_i64(rec.gid),
                rec.atime,
                rec.mtime,
                rec.ctime,
                rec.crtime,
                opt_i64(rec.r#gen),
                rec.mode,
                opt_i64(rec.size),
                opt_i64(rec.parent),
                opt_i64(rec.links),
                rec.pflags,
            ])?;
        }
    }
    tx.commit()?;

    // Reclaim WAL space after the bulk upsert.
    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
    Ok(())
}

/// Load the full stored mapping. An empty map means a fresh scan; a non-empty
/// one puts the merge engine in enrichment mode.
pub fn load_index(conn: &Connection) -> Result<HashMap<u64, DnodeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT object_id, lvl, iblk, dblk, dsize, dnsize, lsize, pct_full, obj_type,
                flags, maxblkid, path, uid, gid, atime, mtime, ctime, crtime,
                gen, mode, size, parent, links, pflags
         FROM dnodes",
    )?;
    let rows = stmt.query_map([], |row| {
        let object_id: i64 = row.get(0)?;
        let lvl: i64 = row.get(1)?;
        let mut rec = DnodeRecord::new(
            object_id as u64,
            lvl as u64,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        );
        rec.flags = row.get(9)?;
        rec.maxblkid = row.get::<_, Option<i64>>(10)?.map(|v| v as u64);
        rec.path = row.get(11)?;
        rec.uid = row.get::<_, Option<i64>>(12)?.map(|v| v as u64);
        rec.gid = row.get::<_, Option<i64>>(13)?.map(|v| v as u64);
        rec.atime = row.get(14)?;
        rec.mtime = row.get(15)?;
        rec.ctime = row.get(16)?;
        rec.crtime = row.get(17)?;
        rec.r#gen = row.get::<_, Option<i64>>(18)?.map(|v| v as u64);
        rec.mode = row.get(19)?;
        rec.size = row.get::<_, Option<i64>>(20)?.map(|v| v as u64);
        rec.parent = row.get::<_, Option<i64>>(21)?.map(|v| v as u64);
        rec.links = row.get::<_, Option<i64>>(22)?.map(|v| v as u64);
        rec.pflags = row.get(23)?;
        Ok(rec)
    })?;
    let mut map = HashMap::new();
    for row in rows {
        let rec = row?;
        map.insert(rec.object_id, rec);
    }
    Ok(map)
}

/// Stored record count (cheap, no full load).
pub fn record_count(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM dnodes", [], |row| row.get(0))?;
    Ok(n.max(0) as usize)
}
