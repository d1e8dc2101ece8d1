//! Pod report command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use kubetop_lib::table::{container_table, pod_table};
use kubetop_lib::{PodReportOutput, PodReportRequest, PodScope, PodSortKey, ReportError};

use super::CommandContext;
use crate::output::{self, format_cpu, format_memory, format_percentage, OutputFormat};

#[derive(Debug, Args)]
pub struct PodArgs {
    /// Namespace to report on (defaults to the configured namespace, then "default")
    #[arg(long, short, conflicts_with = "all_namespaces")]
    pub namespace: Option<String>,

    /// Report on pods in every namespace
    #[arg(long, short = 'A')]
    pub all_namespaces: bool,

    /// Sort key: cpu.request, mem.request, cpu.limit or mem.limit
    #[arg(long, default_value = "cpu.request")]
    pub sort_by: String,

    /// Show one row per container
    #[arg(long)]
    pub by_container: bool,

    /// Do not keep pods of the same workload together
    #[arg(long)]
    pub no_group: bool,

    /// Show requests, limits and usage quantities
    #[arg(long, short)]
    pub wide: bool,
}

impl PodArgs {
    pub fn sort_key(&self) -> Result<PodSortKey, ReportError> {
        self.sort_by.parse()
    }

    fn scope(&self, default_namespace: Option<&str>) -> PodScope {
        if self.all_namespaces {
            return PodScope::All;
        }
        let namespace = self
            .namespace
            .as_deref()
            .or(default_namespace)
            .unwrap_or("default");
        PodScope::Namespace(namespace.to_string())
    }
}

/// Show pod usage against requests and limits
pub async fn run(ctx: &CommandContext, args: PodArgs) -> Result<()> {
    let sort_key = args.sort_key()?;
    let scope = args.scope(ctx.config.default_namespace.as_deref());

    let engine = ctx.engine().await?;
    let request = PodReportRequest {
        scope: scope.clone(),
        sort_by: sort_key.to_string(),
        group_by_workload: !args.no_group,
        by_container: args.by_container,
    };
    let report = engine
        .pod_report(&request)
        .await
        .with_context(|| format!("Failed to build pod report for {}", scope))?;

    let options = ctx.table_options(args.wide, scope == PodScope::All);
    let table = if report.by_container {
        container_table(&report.pods, &options)
    } else {
        pod_table(&report.pods, &options)
    };

    output::print_report(&table, &report, ctx.format)?;
    if ctx.format == OutputFormat::Table {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &PodReportOutput) {
    let summary = &report.summary;

    if let Some(before) = report.truncated_from {
        output::print_info(&format!(
            "Showing the first {} of {} pods of a per-node workload",
            report.pods.len(),
            before
        ));
    }
    if summary.dropped > 0 {
        output::print_warning(&format!(
            "{} pod(s) without metrics were left out",
            summary.dropped
        ));
    }

    output::print_info(&format!(
        "{} {} pods, cpu {} ({} of requests), memory {} ({} of requests)",
        report.scope.bold(),
        summary.pods,
        format_cpu(summary.usage.cpu_millis),
        format_percentage(summary.ratios.cpu_request),
        format_memory(summary.usage.memory_mib),
        format_percentage(summary.ratios.memory_request),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(namespace: Option<&str>, all_namespaces: bool) -> PodArgs {
        PodArgs {
            namespace: namespace.map(str::to_string),
            all_namespaces,
            sort_by: "cpu.request".into(),
            by_container: false,
            no_group: false,
            wide: false,
        }
    }

    #[test]
    fn test_scope_resolution() {
        assert_eq!(
            args(Some("shop"), false).scope(Some("ops")),
            PodScope::Namespace("shop".into())
        );
        assert_eq!(
            args(None, false).scope(Some("ops")),
            PodScope::Namespace("ops".into())
        );
        assert_eq!(
            args(None, false).scope(None),
            PodScope::Namespace("default".into())
        );
        assert_eq!(args(None, true).scope(Some("ops")), PodScope::All);
    }
}
