//! User configuration loaded from `config.toml`.
//!
//! Every key is optional; a missing file or a file that fails to parse yields
//! the defaults. Config errors are soft failures printed to stderr, since
//! logging is configured from this file and is not up yet.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::viewport::DEFAULT_PAGE_SIZE;

/// Settings read from the config file; CLI flags override them in `main`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Messages per viewport page.
    pub page_size: usize,
    /// Threads in the diff worker pool.
    pub diff_workers: usize,
    /// Largest LCS table (old lines × new lines) diffed on the owner loop.
    pub inline_diff_limit: usize,
    /// SQLite database holding synced transcripts.
    pub database: PathBuf,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            diff_workers: 2,
            inline_diff_limit: 10_000,
            database: PathBuf::from(".trailview/transcripts.db"),
            log_level: "info".to_owned(),
        }
    }
}

/// Returns the path to the trailview config file.
///
/// Prefers `$XDG_CONFIG_HOME/trailview/config.toml`; falls back to
/// `~/.config/trailview/config.toml` when the env var is absent.
pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("trailview").join("config.toml")
}

/// Loads the config at `path`. Never fails.
pub fn load(path: &Path) -> Config {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };
    parse(&raw).unwrap_or_else(|e| {
        eprintln!("trailview: config parse error in {:?}: {}", path, e);
        Config::default()
    })
}

fn parse(raw: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(raw)
}
