//! Report pipeline
//!
//! A report runs in fixed stages: validate the sort key, check the scope,
//! fetch inventory and metrics concurrently under one deadline, aggregate,
//! join, then rank. Any fatal error aborts the invocation before a single
//! row exists.


use crate::aggregate::{
    aggregate_node_allocated, aggregate_node_observed, aggregate_pod_declared,
    aggregate_pod_observed,
};
use crate::collector::{
    collect_node_inventory, collect_node_metrics, collect_pod_inventory, collect_pod_metrics,
    connect, ensure_namespace, InventoryProvider, KubeInventory, KubeMetrics, MetricsProvider,
};
use crate::deadline::Deadline;
use crate::error::ReportError;
use crate::join::{join_nodes, join_pods, FleetSummary, ScopeSummary};
use crate::models::{NodeReport, PodReport};
use crate::observability::ReportLogger;
use crate::rank::{
    rank_nodes, rank_pods, NodeSortKey, PodSortKey, RankOptions, DEFAULT_HIGH_REPLICA_FRAGMENTS,
    DEFAULT_TRUNCATE_TO,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default wall-clock budget for one report
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by every report an engine produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    /// Bound on fetch plus aggregation
    pub timeout: Duration,
    pub high_replica_fragments: Vec<String>,
    pub truncate_to: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            high_replica_fragments: DEFAULT_HIGH_REPLICA_FRAGMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            truncate_to: DEFAULT_TRUNCATE_TO,
        }
    }
}

/// Namespaces covered by a pod report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodScope {
    Namespace(String),
    All,
}

impl PodScope {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            PodScope::Namespace(ns) => Some(ns.as_str()),
            PodScope::All => None,
        }
    }
}

impl fmt::Display for PodScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodScope::Namespace(ns) => write!(f, "namespace {}", ns),
            PodScope::All => f.write_str("all namespaces"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodReportRequest {
    pub scope: PodScope,
    /// Raw sort key as given by the user
    pub sort_by: String,
    pub group_by_workload: bool,
    pub by_container: bool,
}

impl PodReportRequest {
    pub fn new(scope: PodScope) -> Self {
        Self {
            scope,
            sort_by: PodSortKey::default().to_string(),
            group_by_workload: true,
            by_container: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReportRequest {
    pub sort_by: String,
}

impl Default for NodeReportRequest {
    fn default() -> Self {
        Self {
            sort_by: NodeSortKey::default().to_string(),
        }
    }
}

/// Ranked pod reports ready for rendering
#[derive(Debug, Clone, Serialize)]
pub struct PodReportOutput {
    pub scope: String,
    pub sort_key: PodSortKey,
    pub by_container: bool,
    pub pods: Vec<PodReport>,
    /// Totals over every joined pod, including any truncated away
    pub summary: ScopeSummary,
    /// Number of pods before truncation, when truncation happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated_from: Option<usize>,
    pub generated_at: DateTime<Utc>,
}

/// Ranked node reports ready for rendering
#[derive(Debug, Clone, Serialize)]
pub struct NodeReportOutput {
    pub sort_key: NodeSortKey,
    pub nodes: Vec<NodeReport>,
    pub summary: FleetSummary,
    pub generated_at: DateTime<Utc>,
}

/// Produces pod and node reports from a pair of providers
#[derive(Clone)]
pub struct ReportEngine {
    inventory: Arc<dyn InventoryProvider>,
    metrics: Arc<dyn MetricsProvider>,
    options: ReportOptions,
}

impl ReportEngine {
    pub fn new(
        inventory: Arc<dyn InventoryProvider>,
        metrics: Arc<dyn MetricsProvider>,
        options: ReportOptions,
    ) -> Self {
        Self {
            inventory,
            metrics,
            options,
        }
    }

    /// Engine backed by the cluster named by `kubeconfig` and `context`
    pub async fn connect(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
        options: ReportOptions,
    ) -> Result<Self, ReportError> {
        let client = connect(kubeconfig, context).await?;

        Ok(Self::new(
            Arc::new(KubeInventory::new(client.clone())),
            Arc::new(KubeMetrics::new(client)),
            options,
        ))
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Rank the pods of a scope by usage against requests or limits
    pub async fn pod_report(&self, request: &PodReportRequest) -> Result<PodReportOutput, ReportError> {
        let logger = ReportLogger::new(request.scope.to_string());
        let result = self.run_pod_report(request, &logger).await;
        if let Err(e) = &result {
            logger.log_failure(e);
        }
        result
    }

    /// Rank the nodes of the cluster by remaining allocatable or utilization
    pub async fn node_report(&self, request: &NodeReportRequest) -> Result<NodeReportOutput, ReportError> {
        let logger = ReportLogger::new("cluster");
        let result = self.run_node_report(request, &logger).await;
        if let Err(e) = &result {
            logger.log_failure(e);
        }
        result
    }

    async fn run_pod_report(
        &self,
        request: &PodReportRequest,
        logger: &ReportLogger,
    ) -> Result<PodReportOutput, ReportError> {
        let started = Instant::now();

        // Validated before any request leaves the process
        let options = RankOptions {
            sort_key: request.sort_by.parse()?,
            group_by_workload: request.group_by_workload,
            by_container: request.by_container,
            high_replica_fragments: self.options.high_replica_fragments.clone(),
            truncate_to: self.options.truncate_to,
        };

        let deadline = Deadline::after(self.options.timeout);
        let namespace = request.scope.namespace();
        if let Some(ns) = namespace {
            ensure_namespace(self.inventory.as_ref(), ns, &deadline).await?;
        }

        let (pods, samples) = tokio::join!(
            collect_pod_inventory(self.inventory.as_ref(), namespace, &deadline),
            collect_pod_metrics(self.metrics.as_ref(), namespace, &deadline),
        );
        let pods = pods?;
        logger.log_collection(
            pods.len(),
            samples.as_ref().map_or(0, Vec::len),
            started.elapsed(),
        );

        let declared = aggregate_pod_declared(logger.scope(), pods).await?;
        let observed = aggregate_pod_observed(samples?).await?;
        deadline.check()?;
        logger.log_aggregation(declared.len(), observed.len(), started.elapsed());

        let joined = join_pods(declared, observed);
        for dropped in &joined.dropped {
            logger.log_dropped("pod", dropped);
        }
        let summary = ScopeSummary::from_pods(&joined.records, joined.dropped.len());

        let ranked = rank_pods(joined.records, &options);
        if let (Some(before), Some(top)) = (ranked.truncated_from, ranked.records.first()) {
            logger.log_truncation(&top.key.to_string(), before, ranked.records.len());
        }
        logger.log_report(ranked.records.len(), summary.dropped, started.elapsed());

        Ok(PodReportOutput {
            scope: logger.scope().to_string(),
            sort_key: options.sort_key,
            by_container: options.by_container,
            pods: ranked.records,
            summary,
            truncated_from: ranked.truncated_from,
            generated_at: Utc::now(),
        })
    }

    async fn run_node_report(
        &self,
        request: &NodeReportRequest,
        logger: &ReportLogger,
    ) -> Result<NodeReportOutput, ReportError> {
        let started = Instant::now();
        let sort_key: NodeSortKey = request.sort_by.parse()?;

        let deadline = Deadline::after(self.options.timeout);
        let (inventory, samples) = tokio::join!(
            collect_node_inventory(self.inventory.as_ref(), &deadline),
            collect_node_metrics(self.metrics.as_ref(), &deadline),
        );
        let (nodes, pods) = inventory?;
        logger.log_collection(
            nodes.len(),
            samples.as_ref().map_or(0, Vec::len),
            started.elapsed(),
        );

        let declared = aggregate_node_allocated(nodes, pods).await?;
        let observed = aggregate_node_observed(samples?).await?;
        deadline.check()?;
        logger.log_aggregation(declared.len(), observed.len(), started.elapsed());

        let joined = join_nodes(declared, observed);
        for dropped in &joined.dropped {
            logger.log_dropped("node", dropped);
        }
        let summary = FleetSummary::from_nodes(&joined.records, joined.dropped.len());

        let nodes = rank_nodes(joined.records, sort_key);
        logger.log_report(nodes.len(), summary.dropped, started.elapsed());

        Ok(NodeReportOutput {
            sort_key,
            nodes,
            summary,
            generated_at: Utc::now(),
        })
    }
}
