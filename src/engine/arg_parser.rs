use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::OutputMode;

/// Enumerate historical URLs for a domain from the Wayback Machine CDX index.
#[derive(Clone, Parser)]
#[command(name = "cdxurls")]
#[command(about = "Fetch archived URLs for a domain pattern; results stream to stdout as pages arrive.")]
#[command(group(
    ArgGroup::new("mode")
        .args(["only_query", "only_query_keys", "no_query", "extract_paths", "subs"])
        .multiple(false)
))]
pub struct Cli {
    /// Target URL pattern (e.g. example.com or *.example.com).
    #[arg(long = "url", short = 'u', value_name = "PATTERN")]
    pub url: String,

    /// Output file (results are also printed to stdout).
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output only full query strings.
    #[arg(long)]
    pub only_query: bool,

    /// Output only query parameter keys.
    #[arg(long)]
    pub only_query_keys: bool,

    /// Remove query strings from URLs.
    #[arg(long)]
    pub no_query: bool,

    /// Print each unique path segment on its own line.
    #[arg(long)]
    pub extract_paths: bool,

    /// Only print unique subdomains of the base domain (example.com -> a.example.com, b.example.com).
    #[arg(long)]
    pub subs: bool,

    /// Comma-separated extensions to exclude. Given without a value, uses the default list; omitted, nothing is excluded.
    #[arg(long, value_name = "LIST", num_args = 0..=1, default_missing_value = "")]
    pub exclude_ext: Option<String>,

    /// Use the default extension excludes (js,css,png,jpg,... see --exclude-ext).
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub exclude_defaults: Option<bool>,

    /// Comma-separated extensions to include (overrides excludes).
    #[arg(long, value_name = "LIST")]
    pub include_ext: Option<String>,

    /// Number of concurrent processing workers (for URL lines). Default: 20.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Number of concurrent page fetchers (CDX pages). Default: 10.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub page_workers: Option<usize>,

    /// HTTP timeout in seconds. Default: 80.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64))]
    pub timeout: Option<u64>,

    /// CDX search endpoint.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Don't show the page progress bar.
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// The single output mode selected on the command line.
    pub fn mode(&self) -> OutputMode {
        if self.subs {
            OutputMode::Subdomains
        } else if self.extract_paths {
            OutputMode::ExtractPaths
        } else if self.only_query {
            OutputMode::OnlyQuery
        } else if self.only_query_keys {
            OutputMode::OnlyQueryKeys
        } else if self.no_query {
            OutputMode::NoQuery
        } else {
            OutputMode::Full
        }
    }
}
