//! Streaming parser for zdb's line-oriented diagnostic output: normalization
//! and noise classification, field extraction, and the per-stream record
//! state machine.

pub mod fields;
pub mod normalize;
pub mod state;

pub use fields::extract_field;
pub use normalize::{HEADER_MARKER, LineClass, classify, normalize};
pub use state::{FeedEvent, RecordParser};
