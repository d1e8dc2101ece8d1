//! Ordering and truncation of joined results
//!
//! Pod reports can be grouped by workload (the first two dash-separated
//! tokens of the pod name) and compared either by a pod-level ratio or
//! container by container. Node reports are ordered by remaining allocatable
//! or by live utilization. Absent ratios always sort after present ones.

use crate::error::ReportError;
use crate::models::{ContainerReport, NodeReport, PodReport, UtilizationRatios};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Name fragments of daemon-style workloads that run one replica per node
pub const DEFAULT_HIGH_REPLICA_FRAGMENTS: &[&str] = &["calico-node", "kube-proxy", "nginx-proxy"];

/// Rows kept when a high-replica workload tops the list
pub const DEFAULT_TRUNCATE_TO: usize = 10;

/// Ranking field for pod reports, always ascending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodSortKey {
    #[default]
    #[serde(rename = "cpu.request")]
    CpuRequest,
    #[serde(rename = "mem.request")]
    MemoryRequest,
    #[serde(rename = "cpu.limit")]
    CpuLimit,
    #[serde(rename = "mem.limit")]
    MemoryLimit,
}

impl PodSortKey {
    pub const ALL: [PodSortKey; 4] = [
        PodSortKey::CpuRequest,
        PodSortKey::MemoryRequest,
        PodSortKey::CpuLimit,
        PodSortKey::MemoryLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PodSortKey::CpuRequest => "cpu.request",
            PodSortKey::MemoryRequest => "mem.request",
            PodSortKey::CpuLimit => "cpu.limit",
            PodSortKey::MemoryLimit => "mem.limit",
        }
    }

    /// The ratio this key selects
    pub fn ratio(&self, ratios: &UtilizationRatios) -> Option<f64> {
        match self {
            PodSortKey::CpuRequest => ratios.cpu_request,
            PodSortKey::MemoryRequest => ratios.memory_request,
            PodSortKey::CpuLimit => ratios.cpu_limit,
            PodSortKey::MemoryLimit => ratios.memory_limit,
        }
    }
}

impl fmt::Display for PodSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PodSortKey {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| invalid_key(s, Self::ALL.iter().map(PodSortKey::as_str)))
    }
}

/// Ranking field for node reports
///
/// Remaining allocatable sorts ascending (fullest nodes first); live
/// utilization sorts descending (busiest nodes first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSortKey {
    #[default]
    #[serde(rename = "cpu.request")]
    CpuRequest,
    #[serde(rename = "mem.request")]
    MemoryRequest,
    #[serde(rename = "cpu.util")]
    CpuUtil,
    #[serde(rename = "mem.util")]
    MemoryUtil,
}

impl NodeSortKey {
    pub const ALL: [NodeSortKey; 4] = [
        NodeSortKey::CpuRequest,
        NodeSortKey::MemoryRequest,
        NodeSortKey::CpuUtil,
        NodeSortKey::MemoryUtil,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeSortKey::CpuRequest => "cpu.request",
            NodeSortKey::MemoryRequest => "mem.request",
            NodeSortKey::CpuUtil => "cpu.util",
            NodeSortKey::MemoryUtil => "mem.util",
        }
    }

    pub fn value(&self, node: &NodeReport) -> Option<f64> {
        match self {
            NodeSortKey::CpuRequest => node.cpu_remaining,
            NodeSortKey::MemoryRequest => node.memory_remaining,
            NodeSortKey::CpuUtil => Some(node.cpu_utilization),
            NodeSortKey::MemoryUtil => Some(node.memory_utilization),
        }
    }

    pub fn descending(&self) -> bool {
        matches!(self, NodeSortKey::CpuUtil | NodeSortKey::MemoryUtil)
    }
}

impl fmt::Display for NodeSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeSortKey {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| invalid_key(s, Self::ALL.iter().map(NodeSortKey::as_str)))
    }
}

fn invalid_key<'a>(key: &str, expected: impl Iterator<Item = &'a str>) -> ReportError {
    ReportError::InvalidSortKey {
        key: key.to_string(),
        expected: expected.collect::<Vec<_>>().join(", "),
    }
}

/// Pod ranking settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankOptions {
    pub sort_key: PodSortKey,
    /// Keep pods of the same workload adjacent
    pub group_by_workload: bool,
    /// Compare container lists instead of pod totals
    pub by_container: bool,
    pub high_replica_fragments: Vec<String>,
    pub truncate_to: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            sort_key: PodSortKey::default(),
            group_by_workload: true,
            by_container: false,
            high_replica_fragments: DEFAULT_HIGH_REPLICA_FRAGMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            truncate_to: DEFAULT_TRUNCATE_TO,
        }
    }
}

impl RankOptions {
    pub fn is_high_replica(&self, name: &str) -> bool {
        self.high_replica_fragments
            .iter()
            .any(|fragment| name.contains(fragment.as_str()))
    }
}

/// Ranked records and the length before truncation, if any happened
#[derive(Debug, Clone)]
pub struct Ranked<T> {
    pub records: Vec<T>,
    pub truncated_from: Option<usize>,
}

/// Workload a pod belongs to, from its first two dash-separated tokens
///
/// A name with fewer than three tokens is its own group.
pub fn workload_group(name: &str) -> &str {
    match name.match_indices('-').nth(1) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

/// Compare two optional ratios, absent values last regardless of direction
pub fn compare_ratio(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.total_cmp(&a),
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Element-by-element comparison of container lists
///
/// The first difference decides; a shorter list sorts first when the common
/// prefix ties.
pub fn compare_containers(a: &[ContainerReport], b: &[ContainerReport], key: PodSortKey) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_ratio(key.ratio(&x.ratios), key.ratio(&y.ratios), false))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn compare_pods(a: &PodReport, b: &PodReport, options: &RankOptions) -> Ordering {
    let grouping = if options.group_by_workload {
        a.key
            .namespace
            .cmp(&b.key.namespace)
            .then_with(|| workload_group(&a.key.name).cmp(workload_group(&b.key.name)))
    } else {
        Ordering::Equal
    };

    grouping
        .then_with(|| {
            if options.by_container {
                compare_containers(&a.containers, &b.containers, options.sort_key)
            } else {
                compare_ratio(
                    options.sort_key.ratio(&a.ratios),
                    options.sort_key.ratio(&b.ratios),
                    false,
                )
            }
        })
        .then_with(|| a.key.cmp(&b.key))
}

/// Sort pod reports and apply the high-replica truncation rule
///
/// Only the top-ranked pod's name is checked against the fragments.
pub fn rank_pods(mut reports: Vec<PodReport>, options: &RankOptions) -> Ranked<PodReport> {
    reports.sort_by(|a, b| compare_pods(a, b, options));

    let before = reports.len();
    let truncate = reports
        .first()
        .map(|top| options.is_high_replica(&top.key.name))
        .unwrap_or(false)
        && before > options.truncate_to;

    if truncate {
        reports.truncate(options.truncate_to);
    }

    Ranked {
        records: reports,
        truncated_from: truncate.then_some(before),
    }
}

/// Sort node reports by `key`, node name breaking ties
pub fn rank_nodes(mut reports: Vec<NodeReport>, key: NodeSortKey) -> Vec<NodeReport> {
    reports.sort_by(|a, b| {
        compare_ratio(key.value(a), key.value(b), key.descending()).then_with(|| a.name.cmp(&b.name))
    });
    reports
}
