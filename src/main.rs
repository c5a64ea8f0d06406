//! zdb-index CLI: scan a dataset, hunt parents, or report on an index.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use zdb_index::engine::arg_parser::Cli;
use zdb_index::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
