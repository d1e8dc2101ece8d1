//! Wall-clock bound for a single report invocation
//!
//! A `Deadline` is created once per invocation and passed by reference to
//! every provider call. Expiry aborts the whole invocation with
//! `ReportError::Timeout`; partial results are never returned.

use crate::error::ReportError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Duration,
    expires_at: Instant,
}

impl Deadline {
    /// Start a deadline that expires `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            budget,
            expires_at: Instant::now() + budget,
        }
    }

    /// The full budget this deadline was created with
    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Fail with `Timeout` if the deadline has passed
    pub fn check(&self) -> Result<(), ReportError> {
        if self.is_expired() {
            Err(ReportError::Timeout(self.budget))
        } else {
            Ok(())
        }
    }

    /// Run a fallible future, failing with `Timeout` once the deadline passes
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ReportError>
    where
        F: Future<Output = Result<T, ReportError>>,
    {
        match tokio::time::timeout_at(self.expires_at, fut).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::Timeout(self.budget)),
        }
    }
}
