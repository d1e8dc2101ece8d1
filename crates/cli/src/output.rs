//! Output formatting utilities

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use kubetop_lib::table::{Cell, ReportTable};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Render display rows as a borderless, left-aligned table
pub fn render_table(table: &ReportTable) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.headers.iter().cloned());
    for row in &table.rows {
        builder.push_record(row.iter().map(paint));
    }

    let mut rendered = builder.build();
    rendered.with(Style::blank());
    rendered.to_string()
}

/// Cell text, red when below the watermark
fn paint(cell: &Cell) -> String {
    if cell.below_watermark {
        cell.text.red().to_string()
    } else {
        cell.text.clone()
    }
}

/// Print a report either as a table or as its JSON document
pub fn print_report<T: Serialize>(table: &ReportTable, data: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if table.is_empty() {
                print_warning("No resources found");
                return Ok(());
            }
            println!("{}", render_table(table));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).context("Failed to serialize report")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a percentage, `-` when absent
pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(pct) => format!("{:.2}%", pct),
        None => "-".to_string(),
    }
}

/// Format millicores as cores
pub fn format_cpu(millicores: u64) -> String {
    if millicores >= 1000 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Format MiB as a binary-suffixed quantity
pub fn format_memory(mib: u64) -> String {
    const GIB: u64 = 1024;

    if mib >= GIB {
        format!("{:.2}Gi", mib as f64 / GIB as f64)
    } else {
        format!("{}Mi", mib)
    }
}
