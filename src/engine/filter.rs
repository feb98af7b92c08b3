//! Extension include/exclude filter.

use anyhow::Result;
use regex::{Regex, RegexBuilder};

use crate::utils::config::DEFAULT_EXCLUDE_EXTENSIONS;

/// Pick the exclude list actually in effect.
///
/// `--exclude-defaults` wins; an omitted `--exclude-ext` means no excludes; `--exclude-ext` with an
/// empty value selects the default list; otherwise the given list is used.
pub fn effective_exclude(exclude_ext: Option<&str>, exclude_defaults: bool) -> Option<String> {
    if exclude_defaults {
        return Some(DEFAULT_EXCLUDE_EXTENSIONS.to_string());
    }
    match exclude_ext {
        None => None,
        Some(list) if list.trim().is_empty() => Some(DEFAULT_EXCLUDE_EXTENSIONS.to_string()),
        Some(list) => Some(list.to_string()),
    }
}

/// Split a comma-separated extension list into clean tokens. Empty tokens are dropped.
pub fn parse_extension_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|t| t.trim().trim_start_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compiled extension matcher plus whether it selects (include) or rejects (exclude) matches.
#[derive(Clone, Debug, Default)]
pub struct ExtensionFilter {
    matcher: Option<Regex>,
    include_mode: bool,
}

impl ExtensionFilter {
    /// Filter that lets every path through.
    pub fn pass_all() -> Self {
        Self::default()
    }

    /// Build from the include and exclude lists. A non-empty include list wins and the exclude list is ignored.
    pub fn compile(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        let include = include.map(parse_extension_list).unwrap_or_default();
        if !include.is_empty() {
            return Ok(Self {
                matcher: Some(build_matcher(&include)?),
                include_mode: true,
            });
        }
        let exclude = exclude.map(parse_extension_list).unwrap_or_default();
        if !exclude.is_empty() {
            return Ok(Self {
                matcher: Some(build_matcher(&exclude)?),
                include_mode: false,
            });
        }
        Ok(Self::pass_all())
    }

    pub fn is_active(&self) -> bool {
        self.matcher.is_some()
    }

    pub fn include_mode(&self) -> bool {
        self.include_mode
    }

    /// True if `path` ends in `.` + one of the listed extensions (case-insensitive).
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.as_ref().is_some_and(|re| re.is_match(path))
    }

    /// Whether a record with this path survives the filter.
    pub fn keeps(&self, path: &str) -> bool {
        match &self.matcher {
            None => true,
            Some(re) => re.is_match(path) == self.include_mode,
        }
    }
}

fn build_matcher(extensions: &[String]) -> Result<Regex> {
    let alternatives = extensions
        .iter()
        .map(|e| regex::escape(e))
        .collect::<Vec<_>>()
        .join("|");
    let re = RegexBuilder::new(&format!(r"\.(?:{alternatives})$"))
        .case_insensitive(true)
        .build()?;
    Ok(re)
}
