//! In-memory cluster used by unit tests

use crate::collector::{async_trait, InventoryProvider, MetricsProvider};
use crate::deadline::Deadline;
use crate::error::ReportError;
use crate::models::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub(crate) struct FakeCluster {
    pub namespaces: Vec<String>,
    pub nodes: Vec<NodeInventory>,
    pub pods: Vec<PodInventory>,
    pub node_usage: Vec<NodeUsage>,
    pub pod_usage: Vec<PodUsage>,
    pub inventory_down: bool,
    pub metrics_down: bool,
    /// Delay applied to every call
    pub latency: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeCluster {
    pub fn with_namespaces(names: &[&str]) -> Self {
        Self {
            namespaces: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn inventory_check(&self, what: &'static str) -> Result<(), ReportError> {
        if self.inventory_down {
            return Err(ReportError::InventoryUnavailable {
                what,
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    fn metrics_check(&self) -> Result<(), ReportError> {
        if self.metrics_down {
            return Err(ReportError::MetricsUnavailable(
                "the server could not find the requested resource".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryProvider for FakeCluster {
    async fn list_namespaces(&self, _deadline: &Deadline) -> Result<Vec<String>, ReportError> {
        self.enter().await;
        self.inventory_check("namespaces")?;
        Ok(self.namespaces.clone())
    }

    async fn list_nodes(&self, _deadline: &Deadline) -> Result<Vec<NodeInventory>, ReportError> {
        self.enter().await;
        self.inventory_check("nodes")?;
        Ok(self.nodes.clone())
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        _deadline: &Deadline,
    ) -> Result<Vec<PodInventory>, ReportError> {
        self.enter().await;
        self.inventory_check("pods")?;
        Ok(self
            .pods
            .iter()
            .filter(|p| namespace.map_or(true, |ns| p.namespace == ns))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MetricsProvider for FakeCluster {
    async fn node_metrics(&self, _deadline: &Deadline) -> Result<Vec<NodeUsage>, ReportError> {
        self.enter().await;
        self.metrics_check()?;
        Ok(self.node_usage.clone())
    }

    async fn pod_metrics(
        &self,
        namespace: Option<&str>,
        _deadline: &Deadline,
    ) -> Result<Vec<PodUsage>, ReportError> {
        self.enter().await;
        self.metrics_check()?;
        Ok(self
            .pod_usage
            .iter()
            .filter(|p| namespace.map_or(true, |ns| p.namespace == ns))
            .cloned()
            .collect())
    }
}

/// Container with fully declared requests and limits
pub(crate) fn container(
    name: &str,
    requests: (u64, u64),
    limits: (u64, u64),
) -> ContainerInventory {
    ContainerInventory {
        name: name.to_string(),
        requests: DeclaredQuantity {
            cpu_millis: Some(requests.0),
            memory_mib: Some(requests.1),
        },
        limits: DeclaredQuantity {
            cpu_millis: Some(limits.0),
            memory_mib: Some(limits.1),
        },
    }
}

pub(crate) fn pod(
    namespace: &str,
    name: &str,
    node: Option<&str>,
    containers: Vec<ContainerInventory>,
) -> PodInventory {
    PodInventory {
        namespace: namespace.to_string(),
        name: name.to_string(),
        node_name: node.map(str::to_string),
        containers,
        init_containers: Vec::new(),
    }
}

/// Pod usage sample, containers given as `(name, cpu_millis, memory_mib)`
pub(crate) fn pod_usage(namespace: &str, name: &str, containers: &[(&str, u64, u64)]) -> PodUsage {
    PodUsage {
        namespace: namespace.to_string(),
        name: name.to_string(),
        containers: containers
            .iter()
            .map(|(c, cpu, mem)| ContainerUsage {
                name: c.to_string(),
                usage: ResourceTotals::new(*cpu, *mem),
            })
            .collect(),
    }
}

pub(crate) fn node(name: &str, allocatable: (u64, u64), capacity: (u64, u64)) -> NodeInventory {
    NodeInventory {
        name: name.to_string(),
        allocatable: ResourceTotals::new(allocatable.0, allocatable.1),
        capacity: ResourceTotals::new(capacity.0, capacity.1),
    }
}

pub(crate) fn node_usage(name: &str, cpu_millis: u64, memory_mib: u64) -> NodeUsage {
    NodeUsage {
        name: name.to_string(),
        usage: ResourceTotals::new(cpu_millis, memory_mib),
    }
}
