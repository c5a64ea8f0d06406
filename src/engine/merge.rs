//! Merge/upsert engine: the only writer of the in-memory index.
//!
//! Fresh-scan mode treats any repetition (duplicate object id, duplicate
//! field within one record span) as a framing failure. Enrichment mode — in
//! effect whenever the store was non-empty at open time, and always during
//! the phase-2 path pass — may only fill null optional fields or confirm
//! existing values; a disagreement between passes is fatal, never silently
//! resolved.

use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::{ScanError, ScanResult};
use crate::types::{DnodeRecord, FieldValue};

/// Counts reported to the operator at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub total: usize,
    pub with_parent: usize,
    pub without_parent: usize,
    pub distinct_parents: usize,
}

/// The authoritative object-id → record mapping for one run.
#[derive(Debug, Default)]
pub struct DnodeIndex {
    records: HashMap<u64, DnodeRecord>,
    enrichment: bool,
}

fn set_or_verify<T: PartialEq + Debug>(
    slot: &mut Option<T>,
    new: T,
    id: u64,
    field: &'static str,
    enrichment: bool,
) -> ScanResult<()> {
    match slot {
        None => {
            *slot = Some(new);
            Ok(())
        }
        Some(old) if enrichment => {
            if *old == new {
                Ok(())
            } else {
                Err(ScanError::InconsistentEnrichment {
                    id,
                    field,
                    stored: format!("{old:?}"),
                    observed: format!("{new:?}"),
                })
            }
        }
        Some(_) => Err(ScanError::DuplicateField { id, field }),
    }
}

impl DnodeIndex {
    /// Empty index in fresh-scan mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index seeded from a reopened store. Enrichment mode switches on when
    /// the store already held records.
    pub fn from_records(records: HashMap<u64, DnodeRecord>) -> Self {
        let enrichment = !records.is_empty();
        Self {
            records,
            enrichment,
        }
    }

    pub fn enrichment(&self) -> bool {
        self.enrichment
    }

    /// Switch to enrichment semantics. The orchestrator calls this between
    /// phase 1 and phase 2 of a single run.
    pub fn enable_enrichment(&mut self) {
        self.enrichment = true;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&DnodeRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> &HashMap<u64, DnodeRecord> {
        &self.records
    }

    /// Insert a record freshly decoded from a lead-in row, or — in enrichment
    /// mode — look up the existing one and verify the re-emitted mandatory
    /// fields did not change. Returns the object id of the now-current record.
    pub fn upsert_mandatory(&mut self, rec: DnodeRecord) -> ScanResult<u64> {
        let id = rec.object_id;
        match self.records.get(&id) {
            None => {
                self.records.insert(id, rec);
                Ok(id)
            }
            Some(_) if !self.enrichment => Err(ScanError::DuplicateRecord { id }),
            Some(existing) => {
                if existing.mandatory_eq(&rec) {
                    Ok(id)
                } else {
                    Err(ScanError::InconsistentEnrichment {
                        id,
                        field: "lead-in row",
                        stored: format!("{existing:?}"),
                        observed: format!("{rec:?}"),
                    })
                }
            }
        }
    }

    /// Merge one optional field into record `id`. First write wins; a second
    /// write must match exactly in enrichment mode and is a fatal duplicate
    /// in fresh-scan mode.
    pub fn merge_optional(&mut self, id: u64, fv: FieldValue) -> ScanResult<()> {
        let field = fv.name();
        let Some(rec) = self.records.get_mut(&id) else {
            return Err(ScanError::FieldOutsideRecord {
                line: format!("{field} for unknown object {id}"),
            });
        };
        let e = self.enrichment;
        match fv {
            FieldValue::Flags(v) => set_or_verify(&mut rec.flags, v, id, field, e),
            FieldValue::MaxBlkId(v) => set_or_verify(&mut rec.maxblkid, v, id, field, e),
            FieldValue::Path(v) => set_or_verify(&mut rec.path, v, id, field, e),
            FieldValue::Uid(v) => set_or_verify(&mut rec.uid, v, id, field, e),
            FieldValue::Gid(v) => set_or_verify(&mut rec.gid, v, id, field, e),
            FieldValue::Atime(v) => set_or_verify(&mut rec.atime, v, id, field, e),
            FieldValue::Mtime(v) => set_or_verify(&mut rec.mtime, v, id, field, e),
            FieldValue::Ctime(v) => set_or_verify(&mut rec.ctime, v, id, field, e),
            FieldValue::Crtime(v) => set_or_verify(&mut rec.crtime, v, id, field, e),
            FieldValue::Gen(v) => set_or_verify(&mut rec.r#gen, v, id, field, e),
            FieldValue::Mode(v) => set_or_verify(&mut rec.mode, v, id, field, e),
            FieldValue::Size(v) => set_or_verify(&mut rec.size, v, id, field, e),
            FieldValue::Parent(v) => set_or_verify(&mut rec.parent, v, id, field, e),
            FieldValue::Links(v) => set_or_verify(&mut rec.links, v, id, field, e),
            FieldValue::Pflags(v) => set_or_verify(&mut rec.pflags, v, id, field, e),
        }
    }

    /// Ids the phase-2 pass still has to resolve: plain files without a path.
    /// Sorted so batches are deterministic across runs.
    pub fn plain_file_ids_missing_path(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .records
            .values()
            .filter(|r| r.is_plain_file() && r.path.is_none())
            .map(|r| r.object_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Operator summary: totals and parent statistics.
    pub fn summary(&self) -> IndexSummary {
        let total = self.records.len();
        let parents: Vec<u64> = self.records.values().filter_map(|r| r.parent).collect();
        let with_parent = parents.len();
        let mut distinct = parents;
        distinct.sort_unstable();
        distinct.dedup();
        IndexSummary {
            total,
            with_parent,
            without_parent: total - with_parent,
            distinct_parents: distinct.len(),
        }
    }
}
