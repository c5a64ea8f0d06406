//! Error taxonomy for the scan pipeline.
//!
//! Everything here is fatal: a corrupted lead-in row means the stream's
//! framing assumption is broken, and an enrichment mismatch means two zdb
//! invocations disagreed about the same object. Unrecognized lines are NOT
//! errors; the state machine logs and counts them and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures while scanning or storing. Whatever was checkpointed before
/// the failure survives; a rerun reopens the store and resumes in enrichment
/// mode.
#[derive(Error, Debug)]
pub enum ScanError {
    /// zdb (or whatever binary is configured) could not be started.
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The row after a header marker failed positional/numeric decoding.
    #[error("malformed lead-in row: {line:?}")]
    MalformedLeadInRow { line: String },

    /// A header group repeated an object id already finalized in this
    /// fresh-scan pass.
    #[error("duplicate object id {id} in fresh scan")]
    DuplicateRecord { id: u64 },

    /// The same optional field appeared twice within one record's span
    /// during a fresh scan.
    #[error("duplicate field `{field}` within object {id}'s span")]
    DuplicateField { id: u64, field: &'static str },

    /// A recognized field line whose value failed conversion, or a path line
    /// violating the fixed-offset/trailing-newline invariant. Fatal for
    /// optional fields too: correctness over completeness.
    #[error("unparseable `{field}` value {value:?} for object {id}")]
    MalformedField {
        id: u64,
        field: &'static str,
        value: String,
    },

    /// A field line arrived outside any record's span.
    #[error("field line outside a record span: {line:?}")]
    FieldOutsideRecord { line: String },

    /// Enrichment observed a different value than the one already stored.
    #[error(
        "enrichment mismatch for object {id} field `{field}`: stored {stored:?}, observed {observed:?}"
    )]
    InconsistentEnrichment {
        id: u64,
        field: &'static str,
        stored: String,
        observed: String,
    },

    /// Index database could not be located (no home directory).
    #[error("cannot determine index directory for dataset {dataset:?} (no home dir); pass --db")]
    NoIndexDir { dataset: String },

    /// Index store failure.
    #[error("index store error at {path:?}")]
    Store {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite failure with no better location context.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Stream I/O failure while reading zdb output.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;
