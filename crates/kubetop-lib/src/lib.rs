//! Resource aggregation and ranking engine for kubetop
//!
//! This crate provides the core functionality for:
//! - Collecting declared resources and live usage from a cluster
//! - Concurrent per-pod and per-node aggregation
//! - Joining declared and observed data into utilization ratios
//! - Ranking and truncating the merged results
//! - Building display rows for the table renderer

pub mod aggregate;
pub mod collector;
pub mod deadline;
pub mod error;
pub mod join;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod rank;
pub mod report;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use deadline::Deadline;
pub use error::ReportError;
pub use models::*;
pub use observability::ReportLogger;
pub use rank::{NodeSortKey, PodSortKey, RankOptions};
pub use report::{
    NodeReportOutput, NodeReportRequest, PodReportOutput, PodReportRequest, PodScope,
    ReportEngine, ReportOptions,
};
pub use table::{Cell, DisplayValue, ReportTable};
