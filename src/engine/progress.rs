//! Status counter for long scans (the `checking id @ N id/sec` display).

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

pub type ProgressBar = Arc<Mutex<Bar>>;

/// Counter for an unknown total: shows records and rate, no percentage.
pub fn create_counter() -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = "indexing",
        animation = Animation::Classic,
        position = 0,
        unit = " dnodes"
    )))
}

/// Update the counter if available.
/// Uses try_lock so a contended bar never blocks the pipeline.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Force a refresh (so the counter shows "0 dnodes" immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}
