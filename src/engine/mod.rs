//! Engine module: CDX access, filtering, transforms and the CLI surface

pub mod arg_parser;
pub mod cdx;
pub mod cli;
pub mod filter;
pub mod progress;
pub mod tools;
pub mod transform;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cdx::{CdxClient, FailureKind, FetchError};
pub use cli::{build_opts, handle_run};
pub use filter::{ExtensionFilter, effective_exclude, parse_extension_list};
pub use tools::{base_domain, normalize_pattern_for_cdx, page_count_url, page_url, parse_page_count};
pub use transform::{path_segments, process_line, query_keys, subdomain_of};
