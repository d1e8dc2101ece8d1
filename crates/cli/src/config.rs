//! Configuration management for the CLI
//!
//! Settings are layered: built-in defaults, then the optional file at
//! `~/.config/kubetop/config.json`, then `KUBETOP_*` environment variables.
//! Command-line flags override all of them.

use anyhow::{bail, Context, Result};
use kubetop_lib::rank::{DEFAULT_HIGH_REPLICA_FRAGMENTS, DEFAULT_TRUNCATE_TO};
use kubetop_lib::report::DEFAULT_TIMEOUT;
use kubetop_lib::table::DEFAULT_WATERMARK;
use kubetop_lib::ReportOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Percentage below which ratios are highlighted
    #[serde(default = "default_watermark")]
    pub watermark: f64,

    /// Budget for fetching and aggregating cluster data
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Namespace used by `pod` when neither `-n` nor `-A` is given
    #[serde(default)]
    pub default_namespace: Option<String>,

    /// Pod name fragments that trigger truncation when ranked first
    #[serde(default = "default_high_replica_fragments")]
    pub high_replica_fragments: Vec<String>,

    /// Rows kept after truncation
    #[serde(default = "default_truncate_to")]
    pub truncate_to: usize,
}

fn default_watermark() -> f64 {
    DEFAULT_WATERMARK
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_high_replica_fragments() -> Vec<String> {
    DEFAULT_HIGH_REPLICA_FRAGMENTS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_truncate_to() -> usize {
    DEFAULT_TRUNCATE_TO
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watermark: default_watermark(),
            timeout_secs: default_timeout_secs(),
            default_namespace: None,
            high_replica_fragments: default_high_replica_fragments(),
            truncate_to: default_truncate_to(),
        }
    }
}

impl Config {
    /// Load configuration from the user config file and environment
    pub fn load() -> Result<Self> {
        let path = Self::config_path().ok();
        Self::load_from(path.as_deref())
    }

    /// Load configuration from `path` (if it exists) and environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("KUBETOP")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("high_replica_fragments"),
            )
            .build()
            .context("Failed to read configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if config.truncate_to == 0 {
            bail!("truncate_to must be at least 1");
        }
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("kubetop").join("config.json"))
    }

    /// Engine settings derived from this configuration
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            high_replica_fragments: self.high_replica_fragments.clone(),
            truncate_to: self.truncate_to,
        }
    }
}
