pub mod config;
pub mod logger;
pub mod settings_toml;

pub use config::*;
pub use logger::{Colors, setup_logging};
