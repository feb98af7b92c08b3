//! Per-record transforms: extension filtering, output-mode derivation, subdomain and path extraction.

use std::borrow::Cow;
use url::Url;

use crate::OutputMode;
use crate::engine::filter::ExtensionFilter;

/// A URL reference split into its raw parts. Nothing is decoded, normalized or re-encoded, so the
/// query and path come out exactly as they appear in the archive record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawUrl<'a> {
    /// `scheme:` and `//authority`, whichever are present.
    head: &'a str,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> RawUrl<'a> {
    /// Lenient parse that also accepts scheme-less references (`example.com/p?x=1`).
    ///
    /// Rejects control characters, an empty scheme, whitespace in the authority, a colon in the
    /// first segment of a scheme-less path and malformed `%` escapes outside the query.
    fn parse(s: &'a str) -> Option<Self> {
        if s.is_empty() || s.starts_with(':') || s.bytes().any(|b| b < 0x20 || b == 0x7f) {
            return None;
        }
        let (rest, fragment) = match s.split_once('#') {
            Some((rest, frag)) => (rest, Some(frag)),
            None => (s, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, q)) => (rest, Some(q)),
            None => (rest, None),
        };
        if has_malformed_escape(rest) || fragment.is_some_and(has_malformed_escape) {
            return None;
        }

        let after_scheme = scheme_len(rest).map_or(0, |n| n + 1);
        let hier = &rest[after_scheme..];
        let head_len = if let Some(authority) = hier.strip_prefix("//") {
            let end = authority.find('/').unwrap_or(authority.len());
            if authority[..end].contains(char::is_whitespace) {
                return None;
            }
            after_scheme + 2 + end
        } else if after_scheme > 0 && !hier.starts_with('/') {
            // Opaque reference (`mailto:x`): no hierarchical path.
            rest.len()
        } else {
            after_scheme
        };
        let path = &rest[head_len..];
        if head_len == 0 && path.split('/').next().is_some_and(|seg| seg.contains(':')) {
            return None;
        }

        Some(Self {
            head: &rest[..head_len],
            path,
            query,
            fragment,
        })
    }

    /// The reference with its query component removed.
    fn without_query(&self) -> String {
        let mut out = format!("{}{}", self.head, self.path);
        if let Some(frag) = self.fragment {
            out.push('#');
            out.push_str(frag);
        }
        out
    }
}

/// Length of a leading `scheme` when `s` starts with `scheme:`.
fn scheme_len(s: &str) -> Option<usize> {
    for (i, c) in s.char_indices() {
        match c {
            'a'..='z' | 'A'..='Z' => {}
            '0'..='9' | '+' | '-' | '.' if i > 0 => {}
            ':' if i > 0 => return Some(i),
            _ => return None,
        }
    }
    None
}

/// True if some `%` isn't followed by two hex digits.
fn has_malformed_escape(s: &str) -> bool {
    let b = s.as_bytes();
    b.iter().enumerate().any(|(i, &c)| {
        c == b'%'
            && !(b.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && b.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}

fn decode_lossy(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

/// Turn one raw CDX line into zero or more derived values for the results queue.
///
/// Subdomain and path extraction happen later in the sink; here those modes pass the full URL through.
pub fn process_line(line: &str, filter: &ExtensionFilter, mode: OutputMode) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let parsed = RawUrl::parse(line);
    let decoded_path = parsed
        .filter(|u| !u.path.is_empty())
        .map(|u| decode_lossy(u.path));
    if !filter.keeps(decoded_path.as_deref().unwrap_or(line)) {
        return Vec::new();
    }

    let query = parsed.and_then(|u| u.query).filter(|q| !q.is_empty());
    match mode {
        OutputMode::OnlyQuery => query.map(|q| vec![q.to_string()]).unwrap_or_default(),
        OutputMode::OnlyQueryKeys => query.map(query_keys).unwrap_or_default(),
        OutputMode::NoQuery => match parsed {
            Some(u) => vec![u.without_query()],
            // Unparsable lines are dropped rather than emitted half-stripped.
            None => Vec::new(),
        },
        OutputMode::Full | OutputMode::ExtractPaths | OutputMode::Subdomains => {
            vec![line.to_string()]
        }
    }
}

/// Keys of a raw query string, in order, duplicates included. `+` is a space. Keys with a
/// malformed `%` escape, or that aren't valid UTF-8 once decoded, are kept in their raw form.
pub fn query_keys(raw_query: &str) -> Vec<String> {
    raw_query
        .split(['&', ';'])
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').map_or(pair, |(k, _)| k))
        .filter(|key| !key.is_empty())
        .map(|key| {
            if has_malformed_escape(key) {
                return key.to_string();
            }
            let spaced = key.replace('+', " ");
            urlencoding::decode(&spaced)
                .map(Cow::into_owned)
                .unwrap_or_else(|_| key.to_string())
        })
        .collect()
}

/// Lower-cased host of `value` if it is a strict subdomain of `base` (already lower-cased).
pub fn subdomain_of(value: &str, base: &str) -> Option<String> {
    let url = Url::parse(value).ok()?;
    let host = url.host_str()?.trim().to_ascii_lowercase();
    if host.is_empty() || host == base {
        return None;
    }
    let is_sub = host
        .strip_suffix(base)
        .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'));
    is_sub.then_some(host)
}

/// Decoded, trimmed, non-empty segments of the raw path of `value`. Dot segments are kept as
/// they appear. Empty when `value` doesn't parse or has no path.
pub fn path_segments(value: &str) -> Vec<String> {
    let Some(url) = RawUrl::parse(value.trim()) else {
        return Vec::new();
    };
    url.path
        .split('/')
        .map(|seg| decode_lossy(seg).trim().to_string())
        .filter(|seg| !seg.is_empty())
        .collect()
}
