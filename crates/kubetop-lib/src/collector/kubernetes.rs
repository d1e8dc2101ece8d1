//! Kubernetes-backed providers
//!
//! Declared resources come from the core API (`Namespace`, `Node`, `Pod`).
//! Usage comes from `metrics.k8s.io/v1beta1`, which is served by
//! metrics-server as an aggregated API and has no typed bindings in
//! k8s-openapi, so it is read with raw requests.

use super::{async_trait, InventoryProvider, MetricsProvider};
use crate::deadline::Deadline;
use crate::error::ReportError;
use crate::models::{
    ContainerInventory, ContainerUsage, DeclaredQuantity, NodeInventory, NodeUsage,
    PodInventory, PodUsage, ResourceTotals,
};
use crate::quantity::{parse_cpu_millis, parse_memory_mib};
use k8s_openapi::api::core::v1::{Container, Namespace, Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config, ResourceExt,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const METRICS_API: &str = "/apis/metrics.k8s.io/v1beta1";

/// Build a client from an explicit kubeconfig and/or context, or infer one
pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Client, ReportError> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &options).await?
        }
        None if context.is_some() => Config::from_kubeconfig(&options).await?,
        None => Config::infer().await?,
    };

    debug!(cluster_url = %config.cluster_url, "Using Kubernetes API server");
    Ok(Client::try_from(config)?)
}

/// List parameters with a server-side timeout matching the remaining budget
fn list_params(deadline: &Deadline) -> ListParams {
    let secs = deadline.remaining().as_secs().clamp(1, u32::MAX as u64) as u32;
    ListParams::default().timeout(secs)
}

/// Inventory provider backed by the core API
#[derive(Clone)]
pub struct KubeInventory {
    client: Client,
}

impl KubeInventory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InventoryProvider for KubeInventory {
    async fn list_namespaces(&self, deadline: &Deadline) -> Result<Vec<String>, ReportError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&list_params(deadline))
            .await
            .map_err(|e| inventory_error("namespaces", e))?;

        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_nodes(&self, deadline: &Deadline) -> Result<Vec<NodeInventory>, ReportError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api
            .list(&list_params(deadline))
            .await
            .map_err(|e| inventory_error("nodes", e))?;

        Ok(list.items.iter().map(node_inventory).collect())
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        deadline: &Deadline,
    ) -> Result<Vec<PodInventory>, ReportError> {
        let api: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = api
            .list(&list_params(deadline))
            .await
            .map_err(|e| inventory_error("pods", e))?;

        Ok(list.items.iter().map(pod_inventory).collect())
    }
}

fn inventory_error(what: &'static str, e: kube::Error) -> ReportError {
    ReportError::InventoryUnavailable {
        what,
        reason: e.to_string(),
    }
}

/// Metrics provider backed by metrics-server
#[derive(Clone)]
pub struct KubeMetrics {
    client: Client,
}

impl KubeMetrics {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ReportError> {
        let request = http::Request::builder()
            .method("GET")
            .uri(path)
            .body(Vec::new())
            .map_err(|e| ReportError::MetricsUnavailable(format!("invalid request: {}", e)))?;

        self.client
            .request::<T>(request)
            .await
            .map_err(|e| ReportError::MetricsUnavailable(e.to_string()))
    }
}

#[async_trait]
impl MetricsProvider for KubeMetrics {
    async fn node_metrics(&self, _deadline: &Deadline) -> Result<Vec<NodeUsage>, ReportError> {
        let list: NodeMetricsList = self.get(&format!("{}/nodes", METRICS_API)).await?;
        Ok(list.items.into_iter().map(NodeMetricsItem::into_usage).collect())
    }

    async fn pod_metrics(
        &self,
        namespace: Option<&str>,
        _deadline: &Deadline,
    ) -> Result<Vec<PodUsage>, ReportError> {
        let path = match namespace {
            Some(ns) => format!("{}/namespaces/{}/pods", METRICS_API, ns),
            None => format!("{}/pods", METRICS_API),
        };
        let list: PodMetricsList = self.get(&path).await?;
        Ok(list.items.into_iter().map(PodMetricsItem::into_usage).collect())
    }
}

// ============================================================================
// metrics.k8s.io response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct NodeMetricsList {
    #[serde(default)]
    pub(crate) items: Vec<NodeMetricsItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeMetricsItem {
    metadata: MetricsMetadata,
    #[serde(default)]
    usage: UsageQuantities,
}

impl NodeMetricsItem {
    pub(crate) fn into_usage(self) -> NodeUsage {
        NodeUsage {
            name: self.metadata.name,
            usage: self.usage.totals(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PodMetricsList {
    #[serde(default)]
    pub(crate) items: Vec<PodMetricsItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PodMetricsItem {
    metadata: MetricsMetadata,
    #[serde(default)]
    containers: Vec<ContainerMetricsItem>,
}

impl PodMetricsItem {
    pub(crate) fn into_usage(self) -> PodUsage {
        PodUsage {
            namespace: self.metadata.namespace.unwrap_or_default(),
            name: self.metadata.name,
            containers: self
                .containers
                .into_iter()
                .map(|c| ContainerUsage {
                    name: c.name,
                    usage: c.usage.totals(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetricsMetadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetricsItem {
    name: String,
    #[serde(default)]
    usage: UsageQuantities,
}

#[derive(Debug, Default, Deserialize)]
struct UsageQuantities {
    #[serde(default)]
    cpu: Option<String>,
    #[serde(default)]
    memory: Option<String>,
}

impl UsageQuantities {
    /// Usage is never negative; an unreadable sample counts as zero
    fn totals(&self) -> ResourceTotals {
        ResourceTotals {
            cpu_millis: self
                .cpu
                .as_deref()
                .and_then(|q| parse_logged(q, "cpu", parse_cpu_millis))
                .unwrap_or(0),
            memory_mib: self
                .memory
                .as_deref()
                .and_then(|q| parse_logged(q, "memory", parse_memory_mib))
                .unwrap_or(0),
        }
    }
}

// ============================================================================
// Core API conversions
// ============================================================================

/// Convert a node object into inventory
pub fn node_inventory(node: &Node) -> NodeInventory {
    let status = node.status.as_ref();

    NodeInventory {
        name: node.name_any(),
        allocatable: totals(status.and_then(|s| s.allocatable.as_ref())),
        capacity: totals(status.and_then(|s| s.capacity.as_ref())),
    }
}

/// Convert a pod object into inventory
pub fn pod_inventory(pod: &Pod) -> PodInventory {
    let spec = pod.spec.as_ref();

    PodInventory {
        namespace: pod.namespace().unwrap_or_default(),
        name: pod.name_any(),
        node_name: spec.and_then(|s| s.node_name.clone()),
        containers: spec
            .map(|s| s.containers.iter().map(container_inventory).collect())
            .unwrap_or_default(),
        init_containers: spec
            .and_then(|s| s.init_containers.as_ref())
            .map(|cs| cs.iter().map(container_inventory).collect())
            .unwrap_or_default(),
    }
}

fn container_inventory(container: &Container) -> ContainerInventory {
    let resources = container.resources.as_ref();

    ContainerInventory {
        name: container.name.clone(),
        requests: declared(resources.and_then(|r| r.requests.as_ref())),
        limits: declared(resources.and_then(|r| r.limits.as_ref())),
    }
}

fn declared(map: Option<&BTreeMap<String, Quantity>>) -> DeclaredQuantity {
    DeclaredQuantity {
        cpu_millis: map
            .and_then(|m| m.get("cpu"))
            .and_then(|q| parse_logged(&q.0, "cpu", parse_cpu_millis)),
        memory_mib: map
            .and_then(|m| m.get("memory"))
            .and_then(|q| parse_logged(&q.0, "memory", parse_memory_mib)),
    }
}

fn totals(map: Option<&BTreeMap<String, Quantity>>) -> ResourceTotals {
    declared(map).totals()
}

fn parse_logged(quantity: &str, resource: &str, parse: fn(&str) -> Option<u64>) -> Option<u64> {
    let parsed = parse(quantity);
    if parsed.is_none() {
        debug!(quantity = %quantity, resource = %resource, "Ignoring unparseable quantity");
    }
    parsed
}
