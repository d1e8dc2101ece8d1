//! kubetop CLI
//!
//! A point-in-time view of how pods use what they request and how much
//! allocatable room is left on each node.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{node, pod, CommandContext};
use kubetop_lib::ReportError;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// kubetop CLI
#[derive(Parser)]
#[command(name = "kubetop")]
#[command(author, version, about = "Resource utilization report for Kubernetes pods and nodes", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (standard resolution if not specified)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Highlight percentages below this value
    #[arg(long, global = true)]
    pub watermark: Option<f64>,

    /// Timeout in seconds for collecting cluster data
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show pod usage as a percentage of requests and limits
    #[command(visible_aliases = ["po", "pods"])]
    Pod(pod::PodArgs),

    /// Show remaining allocatable and live utilization per node
    #[command(visible_aliases = ["no", "nodes"])]
    Node(node::NodeArgs),

    /// Print version information
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,kubetop_lib=debug,kubetop=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    // Reject a bad sort key before reading config or touching the cluster
    match &cli.command {
        Commands::Pod(args) => {
            args.sort_key()?;
        }
        Commands::Node(args) => {
            args.sort_key()?;
        }
        Commands::Version => {}
    }

    let mut config = config::Config::load()?;
    if let Some(watermark) = cli.watermark {
        config.watermark = watermark;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }

    let ctx = CommandContext {
        kubeconfig: cli.kubeconfig,
        context: cli.context,
        format: cli.format,
        config,
    };

    match cli.command {
        Commands::Pod(args) => pod::run(&ctx, args).await?,
        Commands::Node(args) => node::run(&ctx, args).await?,
        Commands::Version => println!("kubetop {}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}

/// Exit status for a failed run; engine errors carry their own
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<ReportError>()
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_engine_errors_keep_their_exit_code() {
        let err = anyhow::Error::new(ReportError::ScopeNotFound("ghost".into()));
        assert_eq!(exit_code(&err), 2);

        let wrapped = anyhow::Error::new(ReportError::Timeout(std::time::Duration::from_secs(5)))
            .context("Failed to build pod report");
        assert_eq!(exit_code(&wrapped), 5);

        assert_eq!(exit_code(&anyhow::anyhow!("bad config")), 1);
    }

    #[test]
    fn test_pod_aliases_and_flags() {
        let cli = Cli::try_parse_from(["kubetop", "po", "-n", "shop", "--sort-by", "mem.limit", "--wide"])
            .unwrap();
        match cli.command {
            Commands::Pod(args) => {
                assert_eq!(args.namespace.as_deref(), Some("shop"));
                assert_eq!(args.sort_by, "mem.limit");
                assert!(args.wide);
                assert!(!args.no_group);
            }
            _ => panic!("expected pod command"),
        }

        // a namespace and -A together make no sense
        assert!(Cli::try_parse_from(["kubetop", "pods", "-n", "shop", "-A"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kubetop", "nodes", "--format", "json", "--timeout", "9"]).unwrap();
        assert_eq!(cli.format, output::OutputFormat::Json);
        assert_eq!(cli.timeout, Some(9));
        assert!(matches!(cli.command, Commands::Node(_)));
    }
}
