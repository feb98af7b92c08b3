//! Application configuration constants.
//! Tuning and defaults in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived file names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    settings_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                settings_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Settings file looked up in the current directory (e.g. `.cdxurls.toml`).
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }
}

// ---- CDX endpoint ----

/// Wayback Machine CDX search endpoint.
pub const DEFAULT_CDX_ENDPOINT: &str = "https://web.archive.org/cdx/search/cdx";

// ---- Extension filter ----

/// Extensions excluded by `--exclude-defaults` (or `--exclude-ext` with no value).
pub const DEFAULT_EXCLUDE_EXTENSIONS: &str = "js,css,png,jpg,jpeg,gif,svg,webp,ico,bmp,tif,tiff,woff,woff2,ttf,eot,mp4,mp3,wav,avi,mov,mkv,zip,rar,7z,pdf";

// ---- Worker threads ----

/// Default worker counts for the two pools.
pub struct WorkerDefaults;

impl WorkerDefaults {
    /// Line processors (filter + transform).
    pub const PROCESS_WORKERS: usize = 20;
    /// Concurrent CDX page fetchers.
    pub const PAGE_WORKERS: usize = 10;
}

// ---- HTTP / retry ----

/// Request timeout and retry policy for CDX requests.
pub struct FetchConsts;

impl FetchConsts {
    /// Default HTTP timeout in seconds.
    pub const TIMEOUT_SECS: u64 = 80;
    /// Attempts per page before the page is abandoned.
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Backoff unit: attempt `n` sleeps `n * BACKOFF_UNIT` before the next one.
    pub const BACKOFF_UNIT: Duration = Duration::from_secs(1);
}

// ---- Streaming channel caps ----

/// Capacities of the raw-line and results queues. The page-index queue is sized to the fetcher count.
pub struct StreamingChannelCap;

impl StreamingChannelCap {
    pub const RAW_LINES: usize = 2000;
    pub const RESULTS: usize = 2000;
}
