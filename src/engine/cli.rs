//! CLI command handler: build options from the settings file and flags, then run the pipeline.

use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::arg_parser::Cli;
use crate::engine::progress::BarProgress;
use crate::pipeline::{CancelToken, NoProgress, OutputSinks, ProgressSink};
use crate::utils::settings_toml::{SettingsToml, apply_file_to_opts, load_settings_toml};
use crate::utils::{Colors, setup_logging};
use crate::{Opts, PipelineConfig, RunSummary};

/// Settings file first, then explicit flags on top.
pub fn build_opts(cli: &Cli, file: Option<&SettingsToml>) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = file {
        apply_file_to_opts(file, &mut opts);
    }
    opts.url_pattern = cli.url.clone();
    opts.output = cli.output.clone();
    opts.mode = cli.mode();
    if cli.include_ext.is_some() {
        opts.include_ext = cli.include_ext.clone();
    }
    if cli.exclude_ext.is_some() {
        opts.exclude_ext = cli.exclude_ext.clone();
    }
    if let Some(v) = cli.exclude_defaults {
        opts.exclude_defaults = v;
    }
    if let Some(n) = cli.workers {
        opts.workers = n;
    }
    if let Some(n) = cli.page_workers {
        opts.page_workers = n;
    }
    if let Some(secs) = cli.timeout {
        opts.timeout = Duration::from_secs(secs);
    }
    if let Some(ref endpoint) = cli.endpoint {
        opts.endpoint = endpoint.clone();
    }
    if cli.no_progress {
        opts.progress = false;
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    opts
}

/// One-line run summary: pages, failures and values written.
fn format_summary(summary: &RunSummary) -> String {
    format!(
        "{} | {} | {}",
        Colors::colorize(
            Colors::PAGES,
            &format!("Pages: {}/{}", summary.pages_completed, summary.pages_total)
        ),
        Colors::colorize(Colors::FAILED, &format!("Failed: {}", summary.pages_failed)),
        Colors::colorize(
            Colors::EMITTED,
            &format!(
                "Written: {} (from {} lines)",
                summary.values_written, summary.lines_fetched
            )
        )
    )
}

/// Run the CLI end to end. A Ctrl+C stops new page fetches; output written so far is kept.
pub fn handle_run(cli: &Cli) -> Result<()> {
    setup_logging(cli.verbose.unwrap_or(false));
    let cwd = std::env::current_dir().context("resolve current directory")?;
    let file = load_settings_toml(&cwd);
    let opts = build_opts(cli, file.as_ref());
    debug!("{} OPTS: {:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);

    let config = PipelineConfig::from_opts(&opts)?;

    let cancel = CancelToken::new();
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_handler.cancel();
    })
    .context("set Ctrl+C handler")?;

    let progress: Arc<dyn ProgressSink> = if opts.progress {
        Arc::new(BarProgress::new())
    } else {
        Arc::new(NoProgress)
    };
    let sinks = OutputSinks::stdout(config.output.as_deref())?;

    let summary = crate::run(&config, sinks, progress, &cancel)?;
    info!("{}", format_summary(&summary));
    if summary.cancelled {
        return Err(anyhow::anyhow!(
            "cancelled by user; partial output was flushed"
        ));
    }
    Ok(())
}
