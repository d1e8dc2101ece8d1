//! Node report command

use anyhow::{Context, Result};
use clap::Args;
use kubetop_lib::table::node_table;
use kubetop_lib::{NodeReportOutput, NodeReportRequest, NodeSortKey, ReportError};

use super::CommandContext;
use crate::output::{self, format_percentage, OutputFormat};

#[derive(Debug, Args)]
pub struct NodeArgs {
    /// Sort key: cpu.request, mem.request (remaining), cpu.util or mem.util
    #[arg(long, default_value = "cpu.request")]
    pub sort_by: String,

    /// Show allocatable, allocated and free quantities
    #[arg(long, short)]
    pub wide: bool,
}

impl NodeArgs {
    pub fn sort_key(&self) -> Result<NodeSortKey, ReportError> {
        self.sort_by.parse()
    }
}

/// Show remaining allocatable and live utilization per node
pub async fn run(ctx: &CommandContext, args: NodeArgs) -> Result<()> {
    let sort_key = args.sort_key()?;

    let engine = ctx.engine().await?;
    let report = engine
        .node_report(&NodeReportRequest {
            sort_by: sort_key.to_string(),
        })
        .await
        .context("Failed to build node report")?;

    let table = node_table(&report.nodes, &ctx.table_options(args.wide, false));
    output::print_report(&table, &report, ctx.format)?;
    if ctx.format == OutputFormat::Table {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &NodeReportOutput) {
    let summary = &report.summary;

    if summary.dropped > 0 {
        output::print_warning(&format!(
            "{} node(s) without usable metrics were left out",
            summary.dropped
        ));
    }

    output::print_info(&format!(
        "{} nodes, cpu {} remaining / {} used, memory {} remaining / {} used",
        summary.nodes,
        format_percentage(summary.cpu_remaining),
        format_percentage(summary.cpu_utilization),
        format_percentage(summary.memory_remaining),
        format_percentage(summary.memory_utilization),
    ));
}
