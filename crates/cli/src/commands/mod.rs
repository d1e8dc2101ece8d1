//! CLI command implementations

pub mod node;
pub mod pod;

use crate::config::Config;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use kubetop_lib::table::TableOptions;
use kubetop_lib::ReportEngine;
use std::path::PathBuf;

/// Settings shared by every command of one invocation
pub struct CommandContext {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub format: OutputFormat,
    pub config: Config,
}

impl CommandContext {
    /// Connect to the cluster
    pub async fn engine(&self) -> Result<ReportEngine> {
        ReportEngine::connect(
            self.kubeconfig.as_deref(),
            self.context.as_deref(),
            self.config.report_options(),
        )
        .await
        .context("Failed to connect to the cluster")
    }

    pub fn table_options(&self, wide: bool, show_namespace: bool) -> TableOptions {
        TableOptions {
            wide,
            show_namespace,
            watermark: self.config.watermark,
        }
    }
}
