//! cdxurls CLI: list archived URLs for a domain pattern.

use anyhow::Result;
use cdxurls::engine::arg_parser::Cli;
use cdxurls::engine::handle_run;
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
