//! Run configuration: flags (and their env fallbacks) over an optional RON
//! file over built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docfetch_engine::{
    ConcurrencyLimiter, FetchSettings, NavigateOptions, PipelineSettings, WaitUntil,
};
use serde::Deserialize;
use thiserror::Error;

use crate::cli::Cli;

pub const DEFAULT_DEST: &str = "output/pdfs";
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid wait_until in config: {0}")]
    WaitUntil(String),
}

/// Settings file contents. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub dest: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub nav_timeout_ms: Option<u64>,
    pub wait_until: Option<String>,
    pub render_fallback: Option<bool>,
    pub archive: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub redirect_limit: Option<usize>,
    pub max_bytes: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub report_path: PathBuf,
    pub render_fallback: bool,
    pub pipeline: PipelineSettings,
    pub fetch: FetchSettings,
}

impl RunConfig {
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let wait_until = match (cli.wait_until, file.wait_until.as_deref()) {
            (Some(wait), _) => wait,
            (None, Some(raw)) => raw.parse().map_err(ConfigError::WaitUntil)?,
            (None, None) => WaitUntil::DomContentLoaded,
        };
        let nav_timeout_ms = cli
            .nav_timeout_ms
            .or(file.nav_timeout_ms)
            .unwrap_or(DEFAULT_NAV_TIMEOUT_MS);
        let navigation = NavigateOptions::new(wait_until, Duration::from_millis(nav_timeout_ms));

        let dest = cli
            .dest
            .clone()
            .or(file.dest)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEST));
        let mut pipeline = PipelineSettings::new(absolute(dest), navigation);
        pipeline.concurrency = cli
            .concurrency
            .or(file.concurrency)
            .unwrap_or(ConcurrencyLimiter::DEFAULT_MAX);
        pipeline.archive = !cli.no_archive && file.archive.unwrap_or(true);

        let mut fetch = FetchSettings::default();
        if let Some(secs) = file.request_timeout_secs {
            fetch.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.connect_timeout_secs {
            fetch.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = file.redirect_limit {
            fetch.redirect_limit = limit;
        }
        if let Some(max) = file.max_bytes {
            fetch.max_bytes = max;
        }

        Ok(Self {
            input: cli.input.clone(),
            report_path: cli.report.clone(),
            render_fallback: !cli.no_render && file.render_fallback.unwrap_or(true),
            pipeline,
            fetch,
        })
    }
}

/// Report paths are absolute, like the files they name.
fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
