//! Load `.cdxurls.toml` from a directory (CLI only). The library takes its settings as [`Opts`] from the caller.

use serde::Deserialize;
use std::path::Path;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct SettingsToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    workers: Option<usize>,
    page_workers: Option<usize>,
    timeout: Option<u64>,
    include_ext: Option<String>,
    exclude_ext: Option<String>,
    exclude_defaults: Option<bool>,
    endpoint: Option<String>,
    progress: Option<bool>,
}

/// Load the settings file from `dir` if present. Returns None if missing, unreadable or invalid.
pub fn load_settings_toml(dir: &Path) -> Option<SettingsToml> {
    let path = dir.join(PackagePaths::get().settings_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_settings(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_settings(s: &str) -> Result<SettingsToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file settings to opts (only fields present in the file). Call before applying CLI flags.
/// The URL pattern, output file, output mode and verbosity are never read from the file.
pub fn apply_file_to_opts(file: &SettingsToml, opts: &mut Opts) {
    let sec = &file.settings;
    apply_file_opt!(sec, opts, workers => workers);
    apply_file_opt!(sec, opts, page_workers => page_workers);
    if let Some(secs) = sec.timeout {
        opts.timeout = std::time::Duration::from_secs(secs);
    }
    if sec.include_ext.is_some() {
        opts.include_ext = sec.include_ext.clone();
    }
    if sec.exclude_ext.is_some() {
        opts.exclude_ext = sec.exclude_ext.clone();
    }
    apply_file_opt!(sec, opts, exclude_defaults => exclude_defaults);
    apply_file_opt!(sec, opts, endpoint => endpoint);
    apply_file_opt!(sec, opts, progress => progress);
}
