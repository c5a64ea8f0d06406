//! Engine module: CLI surface, index store, and the merge engine.

pub mod arg_parser;
pub mod db_ops;
pub mod handlers;
pub mod merge;
pub mod progress;

// Re-export commonly used items
pub use arg_parser::{Cli, Commands, CommonArgs};
pub use db_ops::{checkpoint_index, load_index, open_db, open_db_in_memory, record_count};
pub use handlers::handle_run;
pub use merge::{DnodeIndex, IndexSummary};
