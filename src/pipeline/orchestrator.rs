//! Scan orchestration: the consume loop shared by both phases, and the
//! two-phase acquisition strategy (structural pass, then batched path
//! enrichment for plain files).

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::engine::db_ops::{checkpoint_index, load_index, open_db};
use crate::engine::merge::{DnodeIndex, IndexSummary};
use crate::engine::progress::{ProgressBar, create_counter, refresh_bar, update_progress_bar};
use crate::error::{ScanError, ScanResult};
use crate::parser::{FeedEvent, RecordParser};
use crate::pipeline::line_source::LineSource;
use crate::types::Opts;
use crate::utils::config::{
    CHECKPOINT_EVERY, DEFAULT_ENRICH_BATCH, index_db_path, phase1_argv, phase2_argv,
};

/// Per-stream knobs for [`consume_lines`].
pub struct StreamOpts<'a> {
    /// Stop after this many finalized records (testing only). Not an error.
    pub exit_early: Option<u64>,
    /// Checkpoint cadence in finalized records.
    pub checkpoint_every: u64,
    /// Print `object_id parent_id` to stdout for records whose parent is in
    /// this set.
    pub watch_parents: &'a [u64],
    /// Cooperative cancellation (Ctrl+C). Treated like the record ceiling.
    pub cancel: Option<&'a AtomicBool>,
    /// Optional status counter, bumped once per finalized record.
    pub progress: Option<&'a ProgressBar>,
}

impl Default for StreamOpts<'_> {
    fn default() -> Self {
        Self {
            exit_early: None,
            checkpoint_every: CHECKPOINT_EVERY,
            watch_parents: &[],
            cancel: None,
            progress: None,
        }
    }
}

/// What one stream produced.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamOutcome {
    pub finalized: u64,
    pub anomalies: u64,
    /// The record ceiling or a cancellation stopped the stream before EOF.
    pub stopped_early: bool,
}

/// Result of a whole run, for the operator report.
#[derive(Clone, Copy, Debug)]
pub struct ScanSummary {
    pub index: IndexSummary,
    pub anomalies: u64,
    pub cancelled: bool,
}

fn print_watch_match(index: &DnodeIndex, id: u64, watch: &[u64]) {
    if watch.is_empty() {
        return;
    }
    if let Some(rec) = index.get(id)
        && let Some(parent) = rec.parent
        && watch.contains(&parent)
    {
        println!("{id} {parent}");
    }
}

/// Drive one line stream through the parser and merge engine, checkpointing
/// on the configured cadence and once unconditionally at the end. The final
/// checkpoint also runs on the early-exit path, so whatever was parsed
/// survives. Fatal parse/merge errors propagate after no further writes.
pub fn consume_lines<I>(
    lines: I,
    index: &mut DnodeIndex,
    conn: &mut rusqlite::Connection,
    opts: &StreamOpts<'_>,
) -> ScanResult<StreamOutcome>
where
    I: IntoIterator<Item = io::Result<Vec<u8>>>,
{
    let mut parser = RecordParser::new();
    let mut outcome = StreamOutcome::default();

    'stream: for line in lines {
        let line = line?;
        let event = parser.feed(&line, index)?;
        if let FeedEvent::RecordFinalized(id) = event {
            outcome.finalized += 1;
            print_watch_match(index, id, opts.watch_parents);
            if let Some(bar) = opts.progress {
                update_progress_bar(bar, 1);
            }
            if outcome.finalized.is_multiple_of(opts.checkpoint_every) {
                debug!("checkpoint at {} records", outcome.finalized);
                checkpoint_index(conn, index)?;
            }
            if let Some(ceiling) = opts.exit_early
                && outcome.finalized >= ceiling
            {
                info!("exiting early after {} records", outcome.finalized);
                outcome.stopped_early = true;
                break 'stream;
            }
        }
        if let Some(cancel) = opts.cancel
            && cancel.load(Ordering::Relaxed)
        {
            warn!("cancellation requested; stopping stream");
            outcome.stopped_early = true;
            break 'stream;
        }
    }

    if !outcome.stopped_early
        && let Some(id) = parser.finish()
    {
        outcome.finalized += 1;
        print_watch_match(index, id, opts.watch_parents);
        if let Some(bar) = opts.progress {
            update_progress_bar(bar, 1);
        }
    }

    outcome.anomalies = parser.anomalies;
    checkpoint_index(conn, index)?;
    Ok(outcome)
}

/// Spawn one zdb invocation and consume it. On a drained stream the child is
/// reaped and a non-zero exit status is logged (stream end is still treated
/// as a complete result — operators post-validate counts); on early exit the
/// child is killed.
fn run_invocation(
    argv: &[String],
    index: &mut DnodeIndex,
    conn: &mut rusqlite::Connection,
    opts: &StreamOpts<'_>,
) -> ScanResult<StreamOutcome> {
    let source = LineSource::spawn(argv)?;
    match consume_lines(source.lines(), index, conn, opts) {
        Ok(outcome) if outcome.stopped_early => {
            source.abort();
            Ok(outcome)
        }
        Ok(outcome) => {
            let status = source.finish()?;
            if !status.success() {
                warn!("{} exited with {status}; indexed output kept", argv[0]);
            }
            Ok(outcome)
        }
        Err(e) => {
            source.abort();
            Err(e)
        }
    }
}

/// Run the two-phase scan for `dataset` against its index store.
///
/// Phase 1 dumps the whole dataset without path resolution and inserts
/// records (fresh mode on an empty store, enrichment mode on a reopened one).
/// Phase 2 asks zdb again, in bounded batches, for the plain files still
/// missing a path. The `parents` subcommand reuses this with
/// `opts.skip_paths` forced on and a watch set.
pub fn run_scan(dataset: &str, opts: &Opts) -> ScanResult<ScanSummary> {
    let db_path = index_db_path(dataset, opts.db_path.as_ref())?;
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut conn = open_db(&db_path).map_err(|source| ScanError::Store {
        path: db_path.clone(),
        source,
    })?;
    let stored = load_index(&conn)?;
    if !stored.is_empty() {
        info!(
            "reopened index with {} records; continuing in enrichment mode",
            stored.len()
        );
    }
    let mut index = DnodeIndex::from_records(stored);

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::Relaxed);
    }) {
        debug!("Ctrl+C handler not installed: {e}");
    }

    let bar = opts.status.then(create_counter);
    if let Some(b) = &bar {
        refresh_bar(b);
    }
    let mut anomalies = 0_u64;

    info!("phase 1: structural scan of {dataset}");
    let outcome = run_invocation(
        &phase1_argv(dataset),
        &mut index,
        &mut conn,
        &StreamOpts {
            exit_early: opts.exit_early,
            watch_parents: &opts.watch_parents,
            cancel: Some(&cancel),
            progress: bar.as_ref(),
            ..StreamOpts::default()
        },
    )?;
    anomalies += outcome.anomalies;
    debug!(
        "phase 1 done: {} records this pass, {} total, {} anomalies",
        outcome.finalized,
        index.len(),
        outcome.anomalies
    );

    let cancelled = cancel.load(Ordering::Relaxed);
    if !opts.skip_paths && !cancelled {
        // Everything after phase 1 only confirms or fills fields.
        index.enable_enrichment();
        let batch_size = opts.batch_size.unwrap_or(DEFAULT_ENRICH_BATCH).max(1);
        let pending = index.plain_file_ids_missing_path();
        info!(
            "phase 2: resolving paths for {} plain files in batches of {batch_size}",
            pending.len()
        );
        for batch in pending.chunks(batch_size) {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let outcome = run_invocation(
                &phase2_argv(dataset, batch),
                &mut index,
                &mut conn,
                &StreamOpts {
                    exit_early: opts.exit_early,
                    cancel: Some(&cancel),
                    progress: bar.as_ref(),
                    ..StreamOpts::default()
                },
            )?;
            anomalies += outcome.anomalies;
        }
    }

    let cancelled = cancel.load(Ordering::Relaxed);
    if cancelled {
        warn!("scan cancelled; partial index was checkpointed to {db_path:?}");
    }
    info!("index saved in {db_path:?}");
    Ok(ScanSummary {
        index: index.summary(),
        anomalies,
        cancelled,
    })
}
