//! Resolves the effective settings from the config file and the command line.
use super::args::AppArgs;
use crate::logio::{DialOptions, JsonMode, LogLevel};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Namespace for the translator's cache keys.
pub const CACHE_NAMESPACE: &str = "logio-dashboard";

/// Settings read from the optional JSON config file. Every field can be
/// overridden on the command line.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub origin: Option<String>,
    pub token: Option<String>,
    pub level: Option<LogLevel>,
    pub lang: Option<String>,
    pub lang_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub json_mode: Option<JsonMode>,
    pub dial_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// The effective settings for a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dial: DialOptions,
    pub token: String,
    pub level: Option<LogLevel>,
    pub lang: Option<String>,
    pub lang_dir: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub use_cache: bool,
    pub verbose: bool,
}

impl Settings {
    /// Merges `args` over `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if no origin or no token is configured.
    pub fn resolve(args: &AppArgs, file: FileConfig) -> Result<Self> {
        let origin = args
            .origin
            .clone()
            .or(file.origin)
            .ok_or_else(|| anyhow!("No dashboard origin configured. Supply --origin or set it in the config file."))?;
        let token = args
            .token
            .clone()
            .or(file.token)
            .ok_or_else(|| anyhow!("No access token configured. Supply --token or set LOGIO_TOKEN."))?;

        let mut dial = DialOptions::new(origin);
        if let Some(secs) = args.dial_timeout.or(file.dial_timeout_secs) {
            dial.connect_timeout = Duration::from_secs(secs);
            dial.auth_timeout = Duration::from_secs(secs);
        }
        dial.json_mode = if args.strict_json {
            JsonMode::Strict
        } else {
            file.json_mode.unwrap_or_default()
        };

        Ok(Self {
            dial,
            token,
            level: args.level.or(file.level),
            lang: args.lang.clone().or(file.lang),
            lang_dir: args.lang_dir.as_ref().map(PathBuf::from).or(file.lang_dir),
            data_dir: args
                .data_dir
                .as_ref()
                .map(PathBuf::from)
                .or(file.data_dir)
                .unwrap_or_else(|| PathBuf::from("data")),
            use_cache: !args.no_cache,
            verbose: args.verbose,
        })
    }
}
