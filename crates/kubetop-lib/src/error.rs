//! Error types for report generation

use std::time::Duration;

/// Errors that abort a report invocation
///
/// None of these are retried. Per-entity anomalies (a node or pod without
/// usable metrics) are not errors; those entities are dropped and logged.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("namespace \"{0}\" not found")]
    ScopeNotFound(String),

    #[error("no {kind} found in {scope}")]
    EmptyScope { scope: String, kind: &'static str },

    #[error("metrics API unavailable, make sure metrics-server is deployed: {0}")]
    MetricsUnavailable(String),

    #[error("timed out after {0:?} while collecting cluster data")]
    Timeout(Duration),

    #[error("unsupported sort key \"{key}\", expected one of: {expected}")]
    InvalidSortKey { key: String, expected: String },

    #[error("failed to list {what}: {reason}")]
    InventoryUnavailable { what: &'static str, reason: String },

    #[error("failed to create Kubernetes client: {0}")]
    Client(String),

    #[error("aggregation task failed: {0}")]
    Aggregation(#[from] tokio::task::JoinError),
}

impl ReportError {
    /// Process exit status for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            ReportError::ScopeNotFound(_) => 2,
            ReportError::EmptyScope { .. } => 3,
            ReportError::MetricsUnavailable(_) => 4,
            ReportError::Timeout(_) => 5,
            ReportError::InvalidSortKey { .. } => 6,
            ReportError::InventoryUnavailable { .. } => 7,
            ReportError::Client(_) => 8,
            ReportError::Aggregation(_) => 9,
        }
    }
}

impl From<kube::config::KubeconfigError> for ReportError {
    fn from(e: kube::config::KubeconfigError) -> Self {
        ReportError::Client(e.to_string())
    }
}

impl From<kube::config::InferConfigError> for ReportError {
    fn from(e: kube::config::InferConfigError) -> Self {
        ReportError::Client(e.to_string())
    }
}

impl From<kube::Error> for ReportError {
    fn from(e: kube::Error) -> Self {
        ReportError::Client(e.to_string())
    }
}
