//! Public and internal types for the cdxurls API and pipeline.

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::filter::{ExtensionFilter, effective_exclude};
use crate::engine::tools::{base_domain, normalize_pattern_for_cdx};
use crate::utils::config::{DEFAULT_CDX_ENDPOINT, FetchConsts, WorkerDefaults};

/// The single active transform applied to archive records. Exactly one per run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Full original URL.
    #[default]
    Full,
    /// Raw query string only.
    OnlyQuery,
    /// Each query parameter key.
    OnlyQueryKeys,
    /// URL with its query removed.
    NoQuery,
    /// Unique path segments.
    ExtractPaths,
    /// Unique subdomains of the base domain.
    Subdomains,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Full => "full",
            OutputMode::OnlyQuery => "only-query",
            OutputMode::OnlyQueryKeys => "only-query-keys",
            OutputMode::NoQuery => "no-query",
            OutputMode::ExtractPaths => "extract-paths",
            OutputMode::Subdomains => "subs",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw options from the CLI and settings file. Validated into [`PipelineConfig`] by [`PipelineConfig::from_opts`].
#[derive(Clone, Debug)]
pub struct Opts {
    /// Target URL pattern (e.g. `example.com`, `*.example.com`).
    pub url_pattern: String,
    /// Mirror output to this file in addition to stdout.
    pub output: Option<PathBuf>,
    pub mode: OutputMode,
    /// Comma-separated extensions to keep. Overrides any exclude list.
    pub include_ext: Option<String>,
    /// Comma-separated extensions to drop. `None` when the flag was omitted; `Some("")` selects the default list.
    pub exclude_ext: Option<String>,
    /// Use the default exclude list regardless of `exclude_ext`.
    pub exclude_defaults: bool,
    /// Line processor threads.
    pub workers: usize,
    /// Page fetcher threads.
    pub page_workers: usize,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// CDX search endpoint.
    pub endpoint: String,
    /// Backoff unit between page fetch attempts.
    pub retry_backoff: Duration,
    /// Show progress bar (CLI only).
    pub progress: bool,
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            url_pattern: String::new(),
            output: None,
            mode: OutputMode::Full,
            include_ext: None,
            exclude_ext: None,
            exclude_defaults: false,
            workers: WorkerDefaults::PROCESS_WORKERS,
            page_workers: WorkerDefaults::PAGE_WORKERS,
            timeout: Duration::from_secs(FetchConsts::TIMEOUT_SECS),
            endpoint: DEFAULT_CDX_ENDPOINT.to_string(),
            retry_backoff: FetchConsts::BACKOFF_UNIT,
            progress: true,
            verbose: false,
        }
    }
}

/// Immutable configuration shared read-only by every pipeline stage.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Pattern as given by the user.
    pub url_pattern: String,
    /// Value sent as the CDX `url=` parameter.
    pub cdx_pattern: String,
    /// Base domain for subdomain mode. `None` when it can't be derived.
    pub base_domain: Option<String>,
    pub mode: OutputMode,
    pub filter: ExtensionFilter,
    /// Fetcher threads, at least 1.
    pub page_workers: usize,
    /// Processor threads, at least 1.
    pub workers: usize,
    pub timeout: Duration,
    pub endpoint: String,
    pub retry_backoff: Duration,
    pub output: Option<PathBuf>,
}

impl PipelineConfig {
    /// Validate `opts` and compile the extension filter. Fails before any network activity.
    pub fn from_opts(opts: &Opts) -> Result<Self> {
        let pattern = opts.url_pattern.trim();
        if pattern.is_empty() {
            anyhow::bail!("a URL pattern is required");
        }
        let exclude = effective_exclude(opts.exclude_ext.as_deref(), opts.exclude_defaults);
        let filter = ExtensionFilter::compile(opts.include_ext.as_deref(), exclude.as_deref())
            .context("compile extension filter")?;
        let subdomains = opts.mode == OutputMode::Subdomains;
        let base = base_domain(pattern);

        Ok(Self {
            url_pattern: pattern.to_string(),
            cdx_pattern: normalize_pattern_for_cdx(pattern, subdomains),
            base_domain: (!base.is_empty()).then_some(base),
            mode: opts.mode,
            filter,
            page_workers: opts.page_workers.max(1),
            workers: opts.workers.max(1),
            timeout: opts.timeout,
            endpoint: opts.endpoint.clone(),
            retry_backoff: opts.retry_backoff,
            output: opts.output.clone(),
        })
    }
}

/// Counts reported at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages reported by the CDX server.
    pub pages_total: usize,
    /// Pages finished, including abandoned ones.
    pub pages_completed: usize,
    /// Pages abandoned after exhausting their attempts.
    pub pages_failed: usize,
    /// Non-blank lines received from the CDX server.
    pub lines_fetched: usize,
    /// Lines written to the sinks after dedup.
    pub values_written: usize,
    pub cancelled: bool,
}
