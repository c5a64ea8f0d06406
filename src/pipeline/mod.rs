//! Pipeline module: the zdb line source and the scan orchestrator.

pub mod line_source;
pub mod orchestrator;

pub use line_source::LineSource;
pub use orchestrator::{ScanSummary, StreamOpts, StreamOutcome, consume_lines, run_scan};
