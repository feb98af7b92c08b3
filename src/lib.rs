//! cdxurls: stream historical URLs for a domain out of the Wayback Machine CDX index

pub mod engine;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use log::debug;
use std::sync::Arc;

use pipeline::{CancelToken, OutputSinks, ProgressSink};

/// Result alias used by public cdxurls API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: fetch every CDX page for `config`, write deduplicated values to `sinks`.
///
/// - **`progress`** receives the page total and each completed page; pass
///   [`NoProgress`](crate::pipeline::NoProgress) when nothing should render.
/// - **`cancel`** stops new page fetches once set; values already written stay written and the
///   returned summary has `cancelled = true`.
///
/// Fails before any network activity on bad configuration, and before any worker starts if the
/// page count can't be fetched. Pages that fail every attempt are skipped, not fatal.
pub fn run(
    config: &PipelineConfig,
    sinks: OutputSinks,
    progress: Arc<dyn ProgressSink>,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        config
    );
    debug!("{}", config_str);
    pipeline::run_pipeline(config, sinks, progress, cancel)
}
