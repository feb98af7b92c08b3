//! Pattern normalization and CDX request URL helpers

use anyhow::{Context, Result};
use url::Url;

/// Strip scheme, path/port suffix, wildcards and stray dots/spaces: `https://*.Example.com:443/x` → `Example.com`.
fn core_host(pattern: &str) -> &str {
    let s = strip_scheme(pattern.trim());
    let s = match s.find(['/', ':', '\\']) {
        Some(idx) => &s[..idx],
        None => s,
    };
    s.trim_matches(|c| c == '*' || c == '.' || c == ' ')
}

fn strip_scheme(s: &str) -> &str {
    s.strip_prefix("http://")
        .or_else(|| s.strip_prefix("https://"))
        .unwrap_or(s)
}

/// Prepare a user pattern for the CDX `url=` parameter.
///
/// Subdomain mode asks for `*.<host>` so the index returns captures of every subdomain. Otherwise a
/// trailing `*` is appended unless the user already placed a wildcard, in which case their pattern
/// (scheme stripped) is passed through.
pub fn normalize_pattern_for_cdx(pattern: &str, subdomains: bool) -> String {
    let core = core_host(pattern).replace('*', "");
    let core = core.trim_matches(|c| c == '.' || c == ' ');
    if subdomains {
        return format!("*.{core}");
    }
    if !pattern.contains('*') {
        return format!("{core}*");
    }
    strip_scheme(pattern.trim()).to_string()
}

/// Base domain used to recognise subdomains. Empty when nothing usable remains.
pub fn base_domain(pattern: &str) -> String {
    core_host(pattern)
        .replace('*', "")
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string()
}

/// `<endpoint>?url=<pattern>&showNumPages=true`
pub fn page_count_url(endpoint: &str, cdx_pattern: &str) -> Result<Url> {
    Url::parse_with_params(
        endpoint,
        &[("url", cdx_pattern), ("showNumPages", "true")],
    )
    .with_context(|| format!("build page count URL from endpoint {endpoint}"))
}

/// `<endpoint>?url=<pattern>&page=<p>&fl=original&collapse=urlkey`
pub fn page_url(endpoint: &str, cdx_pattern: &str, page: usize) -> Result<Url> {
    let page = page.to_string();
    Url::parse_with_params(
        endpoint,
        &[
            ("url", cdx_pattern),
            ("page", page.as_str()),
            ("fl", "original"),
            ("collapse", "urlkey"),
        ],
    )
    .with_context(|| format!("build page URL from endpoint {endpoint}"))
}

/// Interpret a page-count response body: `None` for a blank body, `Some(None)` when the first
/// non-blank line isn't a non-negative integer.
pub fn parse_page_count(body: &str) -> Option<Option<usize>> {
    let line = body.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.parse::<usize>().ok())
}
