//! Structured logging for report invocations
//!
//! Every event carries an `event` field and the report scope so a JSON log
//! line can be filtered without parsing the message.

use crate::error::ReportError;
use crate::join::Dropped;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Logger bound to the scope of one report
pub struct ReportLogger {
    scope: String,
}

impl ReportLogger {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Log the size of both datasets once collection has finished
    pub fn log_collection(&self, declared: usize, observed: usize, elapsed: Duration) {
        debug!(
            event = "collection_finished",
            scope = %self.scope,
            declared = declared,
            observed = observed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Collected inventory and metrics"
        );
    }

    /// Log the aggregation barrier
    pub fn log_aggregation(&self, declared: usize, observed: usize, elapsed: Duration) {
        debug!(
            event = "aggregation_finished",
            scope = %self.scope,
            declared = declared,
            observed = observed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Aggregated per-entity totals"
        );
    }

    /// Log an entity left out of the report
    pub fn log_dropped(&self, kind: &str, dropped: &Dropped) {
        warn!(
            event = "entity_dropped",
            scope = %self.scope,
            kind = %kind,
            name = %dropped.name,
            reason = %dropped.reason,
            "Skipping {} {}: {}",
            kind,
            dropped.name,
            dropped.reason
        );
    }

    /// Log truncation of a high-replica result list
    pub fn log_truncation(&self, top_entity: &str, before: usize, after: usize) {
        info!(
            event = "result_truncated",
            scope = %self.scope,
            top_entity = %top_entity,
            before = before,
            after = after,
            "Truncated high-replica workload listing"
        );
    }

    /// Log a completed report
    pub fn log_report(&self, rows: usize, dropped: usize, elapsed: Duration) {
        info!(
            event = "report_generated",
            scope = %self.scope,
            rows = rows,
            dropped = dropped,
            elapsed_ms = elapsed.as_millis() as u64,
            "Report generated"
        );
    }

    /// Log a fatal error before it is returned to the caller
    pub fn log_failure(&self, error: &ReportError) {
        warn!(
            event = "report_failed",
            scope = %self.scope,
            exit_code = error.exit_code(),
            error = %error,
            "Report failed"
        );
    }
}
