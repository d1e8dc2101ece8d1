//! Display rows handed to the renderer
//!
//! Every cell is produced from a typed [`DisplayValue`], so the formatting
//! rules live in one exhaustive match: quantities print as integers,
//! percentages with two decimals, and absent percentages as `-`.

use crate::models::{NodeReport, PodReport, ResourceTotals};
use serde::Serialize;

/// Percentage below which a ratio cell is flagged
pub const DEFAULT_WATERMARK: f64 = 20.0;

/// Text used for a value with no data
pub const ABSENT: &str = "-";

/// A typed value awaiting display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayValue {
    /// Millicores or MiB
    Quantity(u64),
    Percentage(Option<f64>),
}

impl DisplayValue {
    pub fn text(&self) -> String {
        match self {
            DisplayValue::Quantity(value) => value.to_string(),
            DisplayValue::Percentage(Some(pct)) => format!("{:.2}%", pct),
            DisplayValue::Percentage(None) => ABSENT.to_string(),
        }
    }

    /// Format without any watermark marker
    pub fn cell(&self) -> Cell {
        Cell::plain(self.text())
    }

    /// Format, flagging percentages under `watermark`
    pub fn marked(&self, watermark: f64) -> Cell {
        let below_watermark = match self {
            DisplayValue::Percentage(Some(pct)) => *pct < watermark,
            DisplayValue::Percentage(None) | DisplayValue::Quantity(_) => false,
        };
        Cell {
            text: self.text(),
            below_watermark,
        }
    }
}

/// One formatted table cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    pub below_watermark: bool,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            below_watermark: false,
        }
    }
}

/// Headers and rows of display strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    fn new(headers: Vec<&str>) -> Self {
        Self {
            headers: headers.into_iter().map(str::to_string).collect(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Layout settings for the row builders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableOptions {
    /// Add absolute quantity columns
    pub wide: bool,
    /// Prefix pod rows with their namespace
    pub show_namespace: bool,
    pub watermark: f64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            wide: false,
            show_namespace: false,
            watermark: DEFAULT_WATERMARK,
        }
    }
}

const RATIO_HEADERS: [&str; 4] = ["CPU/REQ", "MEM/REQ", "CPU/LIM", "MEM/LIM"];
const QUANTITY_HEADERS: [&str; 6] = [
    "CPU REQ(m)",
    "MEM REQ(Mi)",
    "CPU LIM(m)",
    "MEM LIM(Mi)",
    "CPU USE(m)",
    "MEM USE(Mi)",
];

fn pod_headers<'a>(leading: &[&'a str], options: &TableOptions) -> Vec<&'a str> {
    let mut headers = Vec::new();
    if options.show_namespace {
        headers.push("NAMESPACE");
    }
    headers.extend_from_slice(leading);
    headers.extend_from_slice(&RATIO_HEADERS);
    if options.wide {
        headers.extend_from_slice(&QUANTITY_HEADERS);
    }
    headers
}

fn ratio_cells(ratios: &crate::models::UtilizationRatios, watermark: f64) -> [Cell; 4] {
    [
        DisplayValue::Percentage(ratios.cpu_request).marked(watermark),
        DisplayValue::Percentage(ratios.memory_request).marked(watermark),
        DisplayValue::Percentage(ratios.cpu_limit).marked(watermark),
        DisplayValue::Percentage(ratios.memory_limit).marked(watermark),
    ]
}

fn quantity_cells(requests: ResourceTotals, limits: ResourceTotals, usage: Option<ResourceTotals>) -> Vec<Cell> {
    let mut cells = vec![
        DisplayValue::Quantity(requests.cpu_millis).cell(),
        DisplayValue::Quantity(requests.memory_mib).cell(),
        DisplayValue::Quantity(limits.cpu_millis).cell(),
        DisplayValue::Quantity(limits.memory_mib).cell(),
    ];
    match usage {
        Some(usage) => {
            cells.push(DisplayValue::Quantity(usage.cpu_millis).cell());
            cells.push(DisplayValue::Quantity(usage.memory_mib).cell());
        }
        None => {
            cells.push(Cell::plain(ABSENT));
            cells.push(Cell::plain(ABSENT));
        }
    }
    cells
}

fn node_cell(report: &PodReport) -> Cell {
    Cell::plain(report.node_name.as_deref().unwrap_or("<none>"))
}

/// One row per pod
pub fn pod_table(reports: &[PodReport], options: &TableOptions) -> ReportTable {
    let mut table = ReportTable::new(pod_headers(&["NODE", "POD"], options));

    for report in reports {
        let mut row = Vec::with_capacity(table.headers.len());
        if options.show_namespace {
            row.push(Cell::plain(&report.key.namespace));
        }
        row.push(node_cell(report));
        row.push(Cell::plain(&report.key.name));
        row.extend(ratio_cells(&report.ratios, options.watermark));
        if options.wide {
            row.extend(quantity_cells(
                report.resources.requests,
                report.resources.limits,
                Some(report.usage),
            ));
        }
        table.rows.push(row);
    }

    table
}

/// One row per container, pods in ranked order
pub fn container_table(reports: &[PodReport], options: &TableOptions) -> ReportTable {
    let mut table = ReportTable::new(pod_headers(&["NODE", "POD", "CONTAINER"], options));

    for report in reports {
        for container in &report.containers {
            let mut row = Vec::with_capacity(table.headers.len());
            if options.show_namespace {
                row.push(Cell::plain(&report.key.namespace));
            }
            row.push(node_cell(report));
            row.push(Cell::plain(&report.key.name));
            row.push(Cell::plain(&container.name));
            row.extend(ratio_cells(&container.ratios, options.watermark));
            if options.wide {
                row.extend(quantity_cells(
                    container.resources.requests,
                    container.resources.limits,
                    container.usage,
                ));
            }
            table.rows.push(row);
        }
    }

    table
}

/// One row per node
///
/// Remaining percentages carry the watermark marker; live utilization does
/// not.
pub fn node_table(reports: &[NodeReport], options: &TableOptions) -> ReportTable {
    let headers = if options.wide {
        vec![
            "NODE",
            "CPU TOTAL(m)",
            "CPU ALLOCATED(m)",
            "CPU FREE(m)",
            "CPU REMAINING",
            "CPU UTIL",
            "MEM TOTAL(Mi)",
            "MEM ALLOCATED(Mi)",
            "MEM FREE(Mi)",
            "MEM REMAINING",
            "MEM UTIL",
        ]
    } else {
        vec!["NODE", "CPU REMAINING", "CPU UTIL", "MEM REMAINING", "MEM UTIL"]
    };
    let mut table = ReportTable::new(headers);

    for report in reports {
        let cpu = [
            DisplayValue::Percentage(report.cpu_remaining).marked(options.watermark),
            DisplayValue::Percentage(Some(report.cpu_utilization)).cell(),
        ];
        let memory = [
            DisplayValue::Percentage(report.memory_remaining).marked(options.watermark),
            DisplayValue::Percentage(Some(report.memory_utilization)).cell(),
        ];

        let mut row = vec![Cell::plain(&report.name)];
        if options.wide {
            row.extend(absolute_cells(report.allocatable.cpu_millis, report.allocated.cpu_millis));
            row.extend(cpu);
            row.extend(absolute_cells(report.allocatable.memory_mib, report.allocated.memory_mib));
            row.extend(memory);
        } else {
            row.extend(cpu);
            row.extend(memory);
        }
        table.rows.push(row);
    }

    table
}

fn absolute_cells(total: u64, allocated: u64) -> [Cell; 3] {
    [
        DisplayValue::Quantity(total).cell(),
        DisplayValue::Quantity(allocated).cell(),
        DisplayValue::Quantity(total.saturating_sub(allocated)).cell(),
    ]
}
