//! Command handlers: thin glue between the CLI and the scan orchestrator.

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::engine::arg_parser::{Cli, Commands, CommonArgs};
use crate::engine::db_ops::{load_index, open_db};
use crate::engine::merge::{DnodeIndex, IndexSummary};
use crate::pipeline::orchestrator::run_scan;
use crate::types::Opts;
use crate::utils::config::index_db_path;
use crate::utils::setup_logging;

/// zdb reads pool devices directly; without root most invocations fail.
#[cfg(unix)]
fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

/// The dataset must be a single pool/filesystem token; a bare pool name would
/// dump the meta objset instead of a filesystem.
fn validate_dataset(dataset: &str) -> Result<()> {
    if dataset.split_whitespace().count() != 1 {
        bail!("dataset name must be a single token: {dataset:?}");
    }
    if !dataset.contains('/') {
        bail!("expected pool/filesystem, got {dataset:?}");
    }
    Ok(())
}

/// Setup logging and build Opts from the shared flags.
fn setup_operation(common: &CommonArgs) -> Opts {
    setup_logging(common.debug);
    Opts {
        db_path: common.db.clone(),
        status: !common.no_status,
        exit_early: common.exit_early,
        skip_paths: false,
        batch_size: None,
        watch_parents: Vec::new(),
    }
}

fn print_summary(summary: &IndexSummary, anomalies: u64) {
    info!("# of id's: {}", summary.total);
    info!("# of id's with no parent: {}", summary.without_parent);
    info!("# of id's with parent: {}", summary.with_parent);
    info!("# of unique parents: {}", summary.distinct_parents);
    if anomalies > 0 {
        warn!("{anomalies} unrecognized lines were skipped");
    }
}

fn handle_scan(common: &CommonArgs, skip_paths: bool, batch_size: Option<usize>) -> Result<()> {
    let mut opts = setup_operation(common);
    opts.skip_paths = skip_paths;
    opts.batch_size = batch_size;
    validate_dataset(&common.dataset)?;
    if !running_as_root() {
        info!("not running as root; zdb usually needs root to read pool devices");
    }
    let summary = run_scan(&common.dataset, &opts)
        .with_context(|| format!("scan of {} failed", common.dataset))?;
    print_summary(&summary.index, summary.anomalies);
    if summary.cancelled {
        bail!("scan interrupted; partial index was saved");
    }
    Ok(())
}

fn handle_parents(common: &CommonArgs, parents: &[u64]) -> Result<()> {
    let mut opts = setup_operation(common);
    opts.skip_paths = true;
    opts.watch_parents = parents.to_vec();
    validate_dataset(&common.dataset)?;
    if !running_as_root() {
        info!("not running as root; zdb usually needs root to read pool devices");
    }
    info!("gathering all id->parent mappings");
    if !parents.is_empty() {
        info!("looking for id's with parent(s): {parents:?}");
    }
    let summary = run_scan(&common.dataset, &opts)
        .with_context(|| format!("scan of {} failed", common.dataset))?;
    print_summary(&summary.index, summary.anomalies);
    if summary.cancelled {
        bail!("scan interrupted; partial index was saved");
    }
    Ok(())
}

fn handle_report(common: &CommonArgs) -> Result<()> {
    let opts = setup_operation(common);
    let db_path = index_db_path(&common.dataset, opts.db_path.as_ref())?;
    if !db_path.exists() {
        bail!("no index at {db_path:?}; run `zdb-index scan` first");
    }
    let conn = open_db(&db_path).with_context(|| format!("open index at {db_path:?}"))?;
    let index = DnodeIndex::from_records(load_index(&conn)?);
    print_summary(&index.summary(), 0);
    Ok(())
}

/// Dispatch the parsed CLI.
pub fn handle_run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Scan {
            common,
            skip_paths,
            batch_size,
        } => handle_scan(common, *skip_paths, *batch_size),
        Commands::Parents { common, parents } => handle_parents(common, parents),
        Commands::Report { common } => handle_report(common),
    }
}
