//! Joining declared resources with observed usage
//!
//! The join is a strict inner join on identity: an entity without a usage
//! sample is dropped, never reported with requests alone. Keys are visited
//! in sorted order so two runs over the same snapshot produce the same
//! output.

use crate::models::{
    ContainerReport, DeclaredResources, NodeDeclared, NodeReport, PodDeclared, PodKey,
    PodObserved, PodReport, ResourceTotals, UtilizationRatios,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `usage / denominator * 100`, or `None` when the denominator is zero
pub fn ratio(usage: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    Some(usage as f64 / denominator as f64 * 100.0)
}

/// Percentage of `total` not yet allocated, clamped into `[0, 100]`
///
/// Allocation can exceed the total under overcommit; the result is then 0.
pub fn remaining_percentage(total: u64, allocated: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let remaining = total.saturating_sub(allocated);
    Some((remaining as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

/// Usage against requests and limits, per dimension
pub fn utilization_ratios(usage: ResourceTotals, resources: &DeclaredResources) -> UtilizationRatios {
    UtilizationRatios {
        cpu_request: ratio(usage.cpu_millis, resources.requests.cpu_millis),
        memory_request: ratio(usage.memory_mib, resources.requests.memory_mib),
        cpu_limit: ratio(usage.cpu_millis, resources.limits.cpu_millis),
        memory_limit: ratio(usage.memory_mib, resources.limits.memory_mib),
    }
}

/// An entity left out of the join and the reason it was left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dropped {
    pub name: String,
    pub reason: &'static str,
}

/// Result of a join: the merged records plus what was dropped
#[derive(Debug, Clone)]
pub struct Joined<T> {
    pub records: Vec<T>,
    pub dropped: Vec<Dropped>,
}

/// Merge pod declarations with pod usage
pub fn join_pods(
    declared: HashMap<PodKey, PodDeclared>,
    mut observed: HashMap<PodKey, PodObserved>,
) -> Joined<PodReport> {
    let mut declared: Vec<(PodKey, PodDeclared)> = declared.into_iter().collect();
    declared.sort_by(|a, b| a.0.cmp(&b.0));

    let mut records = Vec::with_capacity(declared.len());
    let mut dropped = Vec::new();

    for (key, pod) in declared {
        let Some(sample) = observed.remove(&key) else {
            dropped.push(Dropped {
                name: key.to_string(),
                reason: "no metrics sample",
            });
            continue;
        };

        let containers = pod
            .containers
            .iter()
            .map(|c| {
                let usage = sample.containers.get(&c.name).copied();
                ContainerReport {
                    name: c.name.clone(),
                    resources: c.resources,
                    usage,
                    ratios: usage
                        .map(|u| utilization_ratios(u, &c.resources))
                        .unwrap_or_default(),
                }
            })
            .collect();

        records.push(PodReport {
            ratios: utilization_ratios(sample.usage, &pod.totals),
            key,
            node_name: pod.node_name,
            resources: pod.totals,
            usage: sample.usage,
            containers,
        });
    }

    Joined { records, dropped }
}

/// Merge node allocation accounting with node usage
///
/// A node without a usage sample, or whose capacity is zero so that no
/// utilization can be computed, is dropped.
pub fn join_nodes(
    declared: HashMap<String, NodeDeclared>,
    observed: HashMap<String, ResourceTotals>,
) -> Joined<NodeReport> {
    let mut declared: Vec<NodeDeclared> = declared.into_values().collect();
    declared.sort_by(|a, b| a.name.cmp(&b.name));

    let mut records = Vec::with_capacity(declared.len());
    let mut dropped = Vec::new();

    for node in declared {
        let Some(usage) = observed.get(&node.name).copied() else {
            dropped.push(Dropped {
                name: node.name,
                reason: "no metrics sample",
            });
            continue;
        };

        let (Some(cpu_utilization), Some(memory_utilization)) = (
            ratio(usage.cpu_millis, node.capacity.cpu_millis),
            ratio(usage.memory_mib, node.capacity.memory_mib),
        ) else {
            dropped.push(Dropped {
                name: node.name,
                reason: "zero capacity",
            });
            continue;
        };

        records.push(NodeReport {
            cpu_remaining: remaining_percentage(
                node.allocatable.cpu_millis,
                node.allocated.cpu_millis,
            ),
            memory_remaining: remaining_percentage(
                node.allocatable.memory_mib,
                node.allocated.memory_mib,
            ),
            cpu_utilization,
            memory_utilization,
            name: node.name,
            allocatable: node.allocatable,
            capacity: node.capacity,
            allocated: node.allocated,
            usage,
        });
    }

    Joined { records, dropped }
}

/// Totals across every pod that made it into a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSummary {
    pub pods: usize,
    pub dropped: usize,
    pub resources: DeclaredResources,
    pub usage: ResourceTotals,
    /// Total usage against total requests and limits
    pub ratios: UtilizationRatios,
}

impl ScopeSummary {
    pub fn from_pods(reports: &[PodReport], dropped: usize) -> Self {
        let resources: DeclaredResources = reports.iter().map(|r| r.resources).sum();
        let usage: ResourceTotals = reports.iter().map(|r| r.usage).sum();

        Self {
            pods: reports.len(),
            dropped,
            ratios: utilization_ratios(usage, &resources),
            resources,
            usage,
        }
    }
}

/// Totals across every node that made it into a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub nodes: usize,
    pub dropped: usize,
    pub allocatable: ResourceTotals,
    pub capacity: ResourceTotals,
    pub allocated: ResourceTotals,
    pub usage: ResourceTotals,
    pub cpu_remaining: Option<f64>,
    pub memory_remaining: Option<f64>,
    pub cpu_utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
}

impl FleetSummary {
    pub fn from_nodes(reports: &[NodeReport], dropped: usize) -> Self {
        let allocatable: ResourceTotals = reports.iter().map(|r| r.allocatable).sum();
        let capacity: ResourceTotals = reports.iter().map(|r| r.capacity).sum();
        let allocated: ResourceTotals = reports.iter().map(|r| r.allocated).sum();
        let usage: ResourceTotals = reports.iter().map(|r| r.usage).sum();

        Self {
            nodes: reports.len(),
            dropped,
            cpu_remaining: remaining_percentage(allocatable.cpu_millis, allocated.cpu_millis),
            memory_remaining: remaining_percentage(allocatable.memory_mib, allocated.memory_mib),
            cpu_utilization: ratio(usage.cpu_millis, capacity.cpu_millis),
            memory_utilization: ratio(usage.memory_mib, capacity.memory_mib),
            allocatable,
            capacity,
            allocated,
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{declare_pod, observe_pod};
    use crate::testing::{container, pod, pod_usage};
    use std::collections::HashSet;

    fn declared_map(pods: Vec<crate::models::PodInventory>) -> HashMap<PodKey, PodDeclared> {
        pods.iter().map(|p| (p.key(), declare_pod(p))).collect()
    }

    fn observed_map(samples: Vec<crate::models::PodUsage>) -> HashMap<PodKey, PodObserved> {
        samples.iter().map(|s| (s.key(), observe_pod(s))).collect()
    }

    fn node_declared(name: &str, allocatable: u64, allocated: u64) -> NodeDeclared {
        NodeDeclared {
            name: name.to_string(),
            allocatable: ResourceTotals::new(allocatable, 8192),
            capacity: ResourceTotals::new(allocatable, 8192),
            allocated: ResourceTotals::new(allocated, 1024),
        }
    }

    #[test]
    fn test_ratio_zero_denominator_is_absent() {
        assert_eq!(ratio(100, 0), None);
        assert_eq!(ratio(0, 0), None);
        assert_eq!(ratio(0, 500), Some(0.0));
        assert_eq!(ratio(250, 500), Some(50.0));
        assert_eq!(ratio(u64::MAX, 1).map(f64::is_finite), Some(true));
    }

    #[test]
    fn test_remaining_is_clamped() {
        assert_eq!(remaining_percentage(4000, 4500), Some(0.0));
        assert_eq!(remaining_percentage(4000, 1000), Some(75.0));
        assert_eq!(remaining_percentage(4000, 0), Some(100.0));
        assert_eq!(remaining_percentage(0, 100), None);
    }

    #[test]
    fn test_web_0_request_ratios() {
        let declared = declared_map(vec![pod(
            "default",
            "web-0",
            Some("n1"),
            vec![container("app", (500, 256), (0, 0))],
        )]);
        let observed = observed_map(vec![pod_usage("default", "web-0", &[("app", 100, 128)])]);

        let joined = join_pods(declared, observed);
        assert_eq!(joined.records.len(), 1);

        let web = &joined.records[0];
        assert_eq!(web.ratios.cpu_request, Some(20.0));
        assert_eq!(web.ratios.memory_request, Some(50.0));
        // no limits declared
        assert_eq!(web.ratios.cpu_limit, None);
        assert_eq!(web.ratios.memory_limit, None);
        assert_eq!(web.containers[0].ratios, web.ratios);
    }

    #[test]
    fn test_join_is_strict_inner_join() {
        let declared = declared_map(vec![
            pod("a", "both", None, vec![container("c", (100, 100), (100, 100))]),
            pod("a", "declared-only", None, vec![container("c", (100, 100), (100, 100))]),
        ]);
        let observed = observed_map(vec![
            pod_usage("a", "both", &[("c", 10, 10)]),
            pod_usage("a", "observed-only", &[("c", 10, 10)]),
        ]);

        let declared_keys: HashSet<_> = declared.keys().cloned().collect();
        let observed_keys: HashSet<_> = observed.keys().cloned().collect();

        let joined = join_pods(declared, observed);
        let output_keys: HashSet<_> = joined.records.iter().map(|r| r.key.clone()).collect();

        assert!(output_keys.is_subset(&declared_keys.intersection(&observed_keys).cloned().collect()));
        assert_eq!(output_keys.len(), 1);
        assert_eq!(joined.dropped.len(), 1);
        assert_eq!(joined.dropped[0].name, "a/declared-only");
    }

    #[test]
    fn test_container_without_sample_has_no_ratios() {
        let declared = declared_map(vec![pod(
            "a",
            "p",
            None,
            vec![
                container("main", (200, 100), (400, 200)),
                container("late", (100, 50), (100, 50)),
            ],
        )]);
        let observed = observed_map(vec![pod_usage("a", "p", &[("main", 100, 50)])]);

        let joined = join_pods(declared, observed);
        let report = &joined.records[0];

        assert_eq!(report.containers[0].usage, Some(ResourceTotals::new(100, 50)));
        assert_eq!(report.containers[0].ratios.cpu_limit, Some(25.0));
        assert_eq!(report.containers[1].usage, None);
        assert_eq!(report.containers[1].ratios, UtilizationRatios::default());
        assert_eq!(report.ratios.cpu_request, Some(100.0 / 300.0 * 100.0));
    }

    #[test]
    fn test_join_output_is_sorted_by_key() {
        let pods = vec![
            pod("b", "z", None, vec![container("c", (1, 1), (1, 1))]),
            pod("a", "y", None, vec![container("c", (1, 1), (1, 1))]),
            pod("a", "x", None, vec![container("c", (1, 1), (1, 1))]),
        ];
        let samples = vec![
            pod_usage("b", "z", &[("c", 1, 1)]),
            pod_usage("a", "y", &[("c", 1, 1)]),
            pod_usage("a", "x", &[("c", 1, 1)]),
        ];

        let joined = join_pods(declared_map(pods), observed_map(samples));
        let names: Vec<String> = joined.records.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(names, vec!["a/x", "a/y", "b/z"]);
    }

    #[test]
    fn test_overcommitted_node_has_zero_remaining() {
        let declared = HashMap::from([("n1".to_string(), node_declared("n1", 4000, 4500))]);
        let observed = HashMap::from([("n1".to_string(), ResourceTotals::new(2000, 4096))]);

        let joined = join_nodes(declared, observed);
        let n1 = &joined.records[0];

        assert_eq!(n1.cpu_remaining, Some(0.0));
        assert_eq!(n1.memory_remaining, Some(87.5));
        assert_eq!(n1.cpu_utilization, 50.0);
        assert_eq!(n1.memory_utilization, 50.0);
    }

    #[test]
    fn test_nodes_without_live_ratio_are_dropped() {
        let mut zero_capacity = node_declared("n3", 4000, 0);
        zero_capacity.capacity = ResourceTotals::default();

        let declared = HashMap::from([
            ("n1".to_string(), node_declared("n1", 4000, 1000)),
            ("n2".to_string(), node_declared("n2", 4000, 1000)),
            ("n3".to_string(), zero_capacity),
        ]);
        let observed = HashMap::from([
            ("n1".to_string(), ResourceTotals::new(100, 100)),
            ("n3".to_string(), ResourceTotals::new(100, 100)),
        ]);

        let joined = join_nodes(declared, observed);
        assert_eq!(joined.records.len(), 1);
        assert_eq!(joined.records[0].name, "n1");
        assert_eq!(
            joined.dropped,
            vec![
                Dropped {
                    name: "n2".into(),
                    reason: "no metrics sample"
                },
                Dropped {
                    name: "n3".into(),
                    reason: "zero capacity"
                },
            ]
        );
    }

    #[test]
    fn test_remaining_stays_in_range() {
        for (allocatable, allocated) in [(1, 0), (1, 1), (1, 2), (4000, 3999), (4000, u64::MAX)] {
            let remaining = remaining_percentage(allocatable, allocated).unwrap();
            assert!((0.0..=100.0).contains(&remaining));
        }
    }

    #[test]
    fn test_scope_summary() {
        let declared = declared_map(vec![
            pod("a", "one", None, vec![container("c", (500, 100), (1000, 200))]),
            pod("a", "two", None, vec![container("c", (500, 100), (0, 0))]),
        ]);
        let observed = observed_map(vec![
            pod_usage("a", "one", &[("c", 250, 50)]),
            pod_usage("a", "two", &[("c", 250, 50)]),
        ]);

        let joined = join_pods(declared, observed);
        let summary = ScopeSummary::from_pods(&joined.records, joined.dropped.len());

        assert_eq!(summary.pods, 2);
        assert_eq!(summary.usage, ResourceTotals::new(500, 100));
        assert_eq!(summary.ratios.cpu_request, Some(50.0));
        assert_eq!(summary.ratios.cpu_limit, Some(50.0));
    }

    #[test]
    fn test_fleet_summary() {
        let declared = HashMap::from([
            ("n1".to_string(), node_declared("n1", 4000, 4500)),
            ("n2".to_string(), node_declared("n2", 4000, 500)),
        ]);
        let observed = HashMap::from([
            ("n1".to_string(), ResourceTotals::new(2000, 0)),
            ("n2".to_string(), ResourceTotals::new(2000, 0)),
        ]);

        let joined = join_nodes(declared, observed);
        let fleet = FleetSummary::from_nodes(&joined.records, 0);

        assert_eq!(fleet.nodes, 2);
        assert_eq!(fleet.cpu_remaining, Some(37.5));
        assert_eq!(fleet.cpu_utilization, Some(50.0));
        assert_eq!(fleet.memory_utilization, Some(0.0));
    }
}
