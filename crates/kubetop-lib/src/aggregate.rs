//! Concurrent aggregation of child quantities into per-parent totals
//!
//! One task is spawned per top-level entity. Each task sums its children
//! from data already in hand, then takes the map lock once to record the
//! result. All tasks are awaited before the maps are handed downstream.

use crate::error::ReportError;
use crate::models::{
    ContainerDeclared, DeclaredResources, NodeDeclared, NodeInventory, NodeUsage, PodDeclared,
    PodInventory, PodKey, PodObserved, PodUsage, ResourceTotals,
};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Keyed map shared by the aggregation tasks
///
/// The map is the only shared mutable state; every write goes through the
/// single lock and holds it only for the insert.
pub struct Accumulator<K, V> {
    inner: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V> Clone for Accumulator<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash, V> Default for Accumulator<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> Accumulator<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a finished value, folding it into an existing one with `merge`
    ///
    /// Returns the key back when it was already present. The lock is
    /// released by the time the caller sees it.
    pub async fn record<M>(&self, key: K, value: V, merge: M) -> Option<K>
    where
        M: FnOnce(&mut V, V),
    {
        let mut map = self.inner.lock().await;
        match map.get_mut(&key) {
            Some(existing) => {
                merge(existing, value);
                Some(key)
            }
            None => {
                map.insert(key, value);
                None
            }
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Take the accumulated map, leaving an empty one behind
    pub async fn take(&self) -> HashMap<K, V> {
        std::mem::take(&mut *self.inner.lock().await)
    }
}

/// Run `unit` concurrently over `items` and collect the results by key
///
/// `unit` returns `None` for items that contribute nothing. Keys seen twice
/// are combined with `merge`, then reported to `on_duplicate` outside the
/// lock. Every task runs to completion before this returns; a panicked task
/// fails the whole aggregation.
pub async fn fan_out<T, K, V, F, M, D>(
    items: Vec<T>,
    unit: F,
    merge: M,
    on_duplicate: D,
) -> Result<HashMap<K, V>, ReportError>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
    F: Fn(T) -> Option<(K, V)> + Send + Sync + 'static,
    M: Fn(&mut V, V) + Send + Sync + 'static,
    D: Fn(&K) + Send + Sync + 'static,
{
    let accumulator = Accumulator::new();
    let unit = Arc::new(unit);
    let merge = Arc::new(merge);
    let on_duplicate = Arc::new(on_duplicate);
    let mut tasks = JoinSet::new();

    for item in items {
        let accumulator = accumulator.clone();
        let unit = Arc::clone(&unit);
        let merge = Arc::clone(&merge);
        let on_duplicate = Arc::clone(&on_duplicate);

        tasks.spawn(async move {
            if let Some((key, value)) = (*unit)(item) {
                let duplicate = accumulator
                    .record(key, value, |existing, value| (*merge)(existing, value))
                    .await;
                if let Some(key) = duplicate {
                    (*on_duplicate)(&key);
                }
            }
        });
    }

    // Barrier: drain every task before anyone reads the map
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            failure.get_or_insert(e);
        }
    }
    if let Some(e) = failure {
        return Err(ReportError::Aggregation(e));
    }

    Ok(accumulator.take().await)
}

/// Sum a pod's regular containers; init containers never count
pub fn declare_pod(pod: &PodInventory) -> PodDeclared {
    let containers: Vec<ContainerDeclared> = pod
        .containers
        .iter()
        .map(|c| ContainerDeclared {
            name: c.name.clone(),
            resources: DeclaredResources {
                requests: c.requests.totals(),
                limits: c.limits.totals(),
            },
        })
        .collect();

    PodDeclared {
        key: pod.key(),
        node_name: pod.node_name.clone(),
        totals: containers.iter().map(|c| c.resources).sum(),
        containers,
    }
}

/// Sum a pod's container usage samples
pub fn observe_pod(sample: &PodUsage) -> PodObserved {
    let containers = sample
        .containers
        .iter()
        .map(|c| (c.name.clone(), c.usage))
        .collect();

    PodObserved {
        key: sample.key(),
        usage: sample.containers.iter().map(|c| c.usage).sum(),
        containers,
    }
}

/// Declared totals per pod
///
/// Fails with `EmptyScope` when there are no pods at all.
pub async fn aggregate_pod_declared(
    scope: &str,
    pods: Vec<PodInventory>,
) -> Result<HashMap<PodKey, PodDeclared>, ReportError> {
    if pods.is_empty() {
        return Err(ReportError::EmptyScope {
            scope: scope.to_string(),
            kind: "pods",
        });
    }

    fan_out(
        pods,
        |pod| {
            let declared = declare_pod(&pod);
            Some((declared.key.clone(), declared))
        },
        |existing, later| *existing = later,
        |key: &PodKey| warn!(pod = %key, "Duplicate pod in inventory, keeping the later record"),
    )
    .await
}

/// Observed usage per pod
pub async fn aggregate_pod_observed(
    samples: Vec<PodUsage>,
) -> Result<HashMap<PodKey, PodObserved>, ReportError> {
    fan_out(
        samples,
        |sample| {
            let observed = observe_pod(&sample);
            Some((observed.key.clone(), observed))
        },
        |existing, later| *existing = later,
        |key: &PodKey| warn!(pod = %key, "Duplicate pod metrics sample, keeping the later one"),
    )
    .await
}

/// Allocation accounting per node
///
/// Each pod's requests are summed in its own task and added to the node it
/// is scheduled on. Unscheduled pods and pods on unknown nodes are ignored.
/// Fails with `EmptyScope` when the cluster has no nodes.
pub async fn aggregate_node_allocated(
    nodes: Vec<NodeInventory>,
    pods: Vec<PodInventory>,
) -> Result<HashMap<String, NodeDeclared>, ReportError> {
    if nodes.is_empty() {
        return Err(ReportError::EmptyScope {
            scope: "cluster".to_string(),
            kind: "nodes",
        });
    }

    let allocated = fan_out(
        pods,
        |pod| {
            let node_name = pod.node_name.clone()?;
            let requests = declare_pod(&pod).totals.requests;
            Some((node_name, requests))
        },
        |total: &mut ResourceTotals, requests| *total += requests,
        |_: &String| {},
    )
    .await?;

    for name in allocated.keys() {
        if !nodes.iter().any(|n| &n.name == name) {
            debug!(node = %name, "Pods scheduled on a node missing from the inventory");
        }
    }

    Ok(nodes
        .into_iter()
        .map(|node| {
            let declared = NodeDeclared {
                allocated: allocated.get(&node.name).copied().unwrap_or_default(),
                name: node.name,
                allocatable: node.allocatable,
                capacity: node.capacity,
            };
            (declared.name.clone(), declared)
        })
        .collect())
}

/// Observed usage per node
pub async fn aggregate_node_observed(
    samples: Vec<NodeUsage>,
) -> Result<HashMap<String, ResourceTotals>, ReportError> {
    fan_out(
        samples,
        |sample| Some((sample.name, sample.usage)),
        |existing, later| *existing = later,
        |name: &String| warn!(node = %name, "Duplicate node metrics sample, keeping the later one"),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerInventory, DeclaredQuantity};
    use crate::testing::{container, node, node_usage, pod, pod_usage};

    #[tokio::test]
    async fn test_pod_totals_equal_container_sums() {
        let pods = vec![pod(
            "default",
            "web-0",
            Some("n1"),
            vec![
                container("app", (500, 256), (1000, 512)),
                container("sidecar", (100, 64), (200, 128)),
            ],
        )];

        let declared = aggregate_pod_declared("namespace default", pods).await.unwrap();
        let web = &declared[&PodKey::new("default", "web-0")];

        assert_eq!(web.totals.requests, ResourceTotals::new(600, 320));
        assert_eq!(web.totals.limits, ResourceTotals::new(1200, 640));
        assert_eq!(web.containers.len(), 2);
        let summed: DeclaredResources = web.containers.iter().map(|c| c.resources).sum();
        assert_eq!(summed, web.totals);
    }

    #[tokio::test]
    async fn test_init_containers_never_contribute() {
        let mut p = pod("default", "job-0", Some("n1"), vec![container("app", (100, 64), (100, 64))]);
        p.init_containers = vec![container("init", (4000, 8192), (4000, 8192))];

        let declared = aggregate_pod_declared("namespace default", vec![p.clone()])
            .await
            .unwrap();
        let job = &declared[&PodKey::new("default", "job-0")];
        assert_eq!(job.totals.requests, ResourceTotals::new(100, 64));
        assert!(job.containers.iter().all(|c| c.name != "init"));

        let nodes = aggregate_node_allocated(vec![node("n1", (4000, 8192), (4000, 8192))], vec![p])
            .await
            .unwrap();
        assert_eq!(nodes["n1"].allocated, ResourceTotals::new(100, 64));
    }

    #[tokio::test]
    async fn test_undeclared_dimension_contributes_zero() {
        let partial = ContainerInventory {
            name: "partial".into(),
            requests: DeclaredQuantity {
                cpu_millis: Some(250),
                memory_mib: None,
            },
            limits: DeclaredQuantity::default(),
        };
        let pods = vec![pod(
            "default",
            "api-0",
            None,
            vec![partial, container("full", (250, 100), (500, 200))],
        )];

        let declared = aggregate_pod_declared("namespace default", pods).await.unwrap();
        let api = &declared[&PodKey::new("default", "api-0")];
        assert_eq!(api.totals.requests, ResourceTotals::new(500, 100));
        assert_eq!(api.totals.limits, ResourceTotals::new(500, 200));
    }

    #[tokio::test]
    async fn test_empty_scope_short_circuits() {
        let err = aggregate_pod_declared("namespace quiet", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyScope { kind: "pods", .. }));

        let err = aggregate_node_allocated(Vec::new(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, ReportError::EmptyScope { kind: "nodes", .. }));
    }

    #[tokio::test]
    async fn test_observed_usage_sums_containers() {
        let samples = vec![pod_usage("default", "web-0", &[("app", 100, 128), ("sidecar", 20, 16)])];

        let observed = aggregate_pod_observed(samples).await.unwrap();
        let web = &observed[&PodKey::new("default", "web-0")];
        assert_eq!(web.usage, ResourceTotals::new(120, 144));
        assert_eq!(web.containers["sidecar"], ResourceTotals::new(20, 16));
    }

    #[tokio::test]
    async fn test_node_allocation_accumulates_across_pods() {
        let nodes = vec![
            node("n1", (4000, 8192), (4000, 8192)),
            node("n2", (2000, 4096), (2000, 4096)),
        ];
        let pods = vec![
            pod("a", "one", Some("n1"), vec![container("c", (1500, 1024), (0, 0))]),
            pod("b", "two", Some("n1"), vec![container("c", (3000, 2048), (0, 0))]),
            pod("b", "pending", None, vec![container("c", (9000, 9000), (0, 0))]),
            pod("b", "lost", Some("gone"), vec![container("c", (1, 1), (0, 0))]),
        ];

        let declared = aggregate_node_allocated(nodes, pods).await.unwrap();
        assert_eq!(declared.len(), 2);
        assert_eq!(declared["n1"].allocated, ResourceTotals::new(4500, 3072));
        assert_eq!(declared["n2"].allocated, ResourceTotals::default());
        assert_eq!(declared["n2"].allocatable, ResourceTotals::new(2000, 4096));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_units_lose_no_writes() {
        let nodes = vec![node("n1", (1_000_000, 1_000_000), (1_000_000, 1_000_000))];
        let pods: Vec<_> = (0..500)
            .map(|i| {
                pod(
                    "load",
                    &format!("worker-{}", i),
                    Some("n1"),
                    vec![container("c", (10, 2), (20, 4))],
                )
            })
            .collect();

        let per_pod = aggregate_pod_declared("namespace load", pods.clone()).await.unwrap();
        assert_eq!(per_pod.len(), 500);

        let per_node = aggregate_node_allocated(nodes, pods).await.unwrap();
        assert_eq!(per_node["n1"].allocated, ResourceTotals::new(5000, 1000));
    }

    #[tokio::test]
    async fn test_duplicate_keys_collapse_to_one_record() {
        let samples = vec![node_usage("n1", 100, 100), node_usage("n1", 200, 200)];
        let observed = aggregate_node_observed(samples).await.unwrap();
        assert_eq!(observed.len(), 1);
        assert!(observed["n1"].cpu_millis == 100 || observed["n1"].cpu_millis == 200);
    }

    #[tokio::test]
    async fn test_accumulator_record_and_take() {
        let acc: Accumulator<&str, u64> = Accumulator::new();
        assert_eq!(acc.record("a", 1, |v, n| *v += n).await, None);
        assert_eq!(acc.record("a", 2, |v, n| *v += n).await, Some("a"));
        assert_eq!(acc.record("b", 5, |v, n| *v += n).await, None);
        assert_eq!(acc.len().await, 2);

        let map = acc.take().await;
        assert_eq!(map["a"], 3);
        assert_eq!(map["b"], 5);
        assert!(acc.is_empty().await);
    }

    #[tokio::test]
    async fn test_panicking_unit_fails_aggregation() {
        let result = fan_out(
            vec![1u32, 2, 3],
            |n| {
                if n == 2 {
                    panic!("unit failed");
                }
                Some((n, n))
            },
            |existing, later| *existing = later,
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(ReportError::Aggregation(_))));
    }

    #[tokio::test]
    async fn test_duplicates_reported_after_merge() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let merged = fan_out(
            vec![("a", 1u64), ("a", 2), ("b", 3), ("a", 4)],
            Some,
            |total, n| *total += n,
            move |key: &&str| {
                assert_eq!(*key, "a");
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

        assert_eq!(merged["a"], 7);
        assert_eq!(merged["b"], 3);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
