//! Inventory and metrics collection
//!
//! This module defines the two provider seams the engine reads from: the
//! inventory provider (declared resources) and the metrics provider (live
//! usage). Both are single request/response calls made up front, bounded by
//! the invocation's `Deadline`, and never retried.

mod kubernetes;


pub use kubernetes::{connect, node_inventory, pod_inventory, KubeInventory, KubeMetrics};

use crate::deadline::Deadline;
use crate::error::ReportError;
use crate::models::{NodeInventory, NodeUsage, PodInventory, PodUsage};
use std::time::Instant;
use tracing::debug;

pub use async_trait::async_trait;

/// Source of declared resources
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Names of every namespace in the cluster
    async fn list_namespaces(&self, deadline: &Deadline) -> Result<Vec<String>, ReportError>;

    /// Every node with its allocatable and capacity
    async fn list_nodes(&self, deadline: &Deadline) -> Result<Vec<NodeInventory>, ReportError>;

    /// Pods in `namespace`, or in every namespace when `None`
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        deadline: &Deadline,
    ) -> Result<Vec<PodInventory>, ReportError>;
}

/// Source of live usage samples
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// One usage sample per node
    async fn node_metrics(&self, deadline: &Deadline) -> Result<Vec<NodeUsage>, ReportError>;

    /// One usage sample per pod in `namespace`, or in every namespace when `None`
    async fn pod_metrics(
        &self,
        namespace: Option<&str>,
        deadline: &Deadline,
    ) -> Result<Vec<PodUsage>, ReportError>;
}

/// Fail with `ScopeNotFound` unless `namespace` exists
pub async fn ensure_namespace(
    inventory: &dyn InventoryProvider,
    namespace: &str,
    deadline: &Deadline,
) -> Result<(), ReportError> {
    let namespaces = deadline.run(inventory.list_namespaces(deadline)).await?;
    if namespaces.iter().any(|ns| ns == namespace) {
        Ok(())
    } else {
        Err(ReportError::ScopeNotFound(namespace.to_string()))
    }
}

/// Fetch the pod inventory for a scope
pub async fn collect_pod_inventory(
    inventory: &dyn InventoryProvider,
    namespace: Option<&str>,
    deadline: &Deadline,
) -> Result<Vec<PodInventory>, ReportError> {
    let start = Instant::now();
    let pods = deadline.run(inventory.list_pods(namespace, deadline)).await?;
    debug!(
        namespace = namespace.unwrap_or("*"),
        pods = pods.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Listed pods"
    );
    Ok(pods)
}

/// Fetch the node inventory together with every pod in the cluster
pub async fn collect_node_inventory(
    inventory: &dyn InventoryProvider,
    deadline: &Deadline,
) -> Result<(Vec<NodeInventory>, Vec<PodInventory>), ReportError> {
    let start = Instant::now();
    let (nodes, pods) = tokio::try_join!(
        deadline.run(inventory.list_nodes(deadline)),
        deadline.run(inventory.list_pods(None, deadline)),
    )?;
    debug!(
        nodes = nodes.len(),
        pods = pods.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Listed nodes and pods"
    );
    Ok((nodes, pods))
}

/// Fetch pod usage for a scope
pub async fn collect_pod_metrics(
    metrics: &dyn MetricsProvider,
    namespace: Option<&str>,
    deadline: &Deadline,
) -> Result<Vec<PodUsage>, ReportError> {
    let start = Instant::now();
    let samples = deadline.run(metrics.pod_metrics(namespace, deadline)).await?;
    debug!(
        namespace = namespace.unwrap_or("*"),
        samples = samples.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Fetched pod metrics"
    );
    Ok(samples)
}

/// Fetch node usage
pub async fn collect_node_metrics(
    metrics: &dyn MetricsProvider,
    deadline: &Deadline,
) -> Result<Vec<NodeUsage>, ReportError> {
    let start = Instant::now();
    let samples = deadline.run(metrics.node_metrics(deadline)).await?;
    debug!(
        samples = samples.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Fetched node metrics"
    );
    Ok(samples)
}
