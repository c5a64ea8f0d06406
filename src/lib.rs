//! zdb-index: resumable per-object metadata index for ZFS pools.
//!
//! Streams the diagnostic output of `zdb`, parses each dnode's record group
//! into a typed record, and maintains a crash-safe SQLite index keyed by
//! object id. A fast structural pass covers the whole dataset; a slower
//! second pass fills in filesystem paths for plain files, in bounded batches,
//! without ever contradicting what the first pass stored.

pub mod engine;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use error::{ScanError, ScanResult};
pub use types::*;

/// Result alias used by the CLI-facing API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
