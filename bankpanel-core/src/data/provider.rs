//! Provider traits and structured error types.
//!
//! `FdicSource` and `SeriesSource` abstract over the HTTP clients so the
//! pipeline can run against in-memory fixtures, and so retry/throttle policy
//! stays inside the transport instead of leaking into the fetchers.

use super::query::Query;
use crate::domain::Institution;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// One provider row: the inner `data` object, keyed by provider field code.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Structured transport errors.
///
/// These are designed to be displayable in logs and in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}: {context}")]
    HttpStatus { status: u16, context: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. } => true,
            DataError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// FDIC BankFind endpoints queried by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Institutions,
    Financials,
}

impl Endpoint {
    /// Path relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Institutions => "institutions",
            Endpoint::Financials => "financials",
        }
    }
}

/// The records of one response plus the provider's total match count.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub records: Vec<RawRecord>,
    /// `totals.count` from the response, when present.
    pub total: Option<u64>,
}

/// A source of FDIC BankFind query results.
///
/// Implementations own transport concerns: timeouts, retries, throttling and
/// the circuit breaker. Callers issue one logical query per call.
pub trait FdicSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Run one query against an endpoint.
    fn query(&self, endpoint: Endpoint, query: &Query) -> Result<QueryPage, DataError>;

    /// Check if the source is currently accepting requests.
    fn is_available(&self) -> bool;
}

/// A single macro observation. `value` is `None` where the provider has no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// A source of single-series macro observations (FRED).
pub trait SeriesSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch all observations for one series code within `[start, end]`.
    fn fetch_series(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, DataError>;
}

/// Progress callback for the per-institution fan-out.
///
/// Called from worker threads, hence `Sync`.
pub trait FetchProgress: Send + Sync {
    /// Called once the directory is known.
    fn on_start(&self, total: usize);

    /// Called after each institution finishes. `outcome` is the record count.
    fn on_institution(
        &self,
        institution: &Institution,
        done: usize,
        total: usize,
        outcome: &Result<usize, DataError>,
    );

    /// Called when the whole batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that logs a line every `step_pct` percent.
pub struct LogProgress {
    step_pct: usize,
    last_bucket: AtomicUsize,
}

impl LogProgress {
    pub fn new(step_pct: usize) -> Self {
        Self {
            step_pct: step_pct.clamp(1, 100),
            last_bucket: AtomicUsize::new(0),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(5)
    }
}

impl FetchProgress for LogProgress {
    fn on_start(&self, total: usize) {
        self.last_bucket.store(0, Ordering::Relaxed);
        tracing::info!(total, "fetching financials for {total} institutions");
    }

    fn on_institution(
        &self,
        institution: &Institution,
        done: usize,
        total: usize,
        outcome: &Result<usize, DataError>,
    ) {
        match outcome {
            Ok(n) => tracing::debug!(
                name = %institution.parent_name,
                zip = %institution.zip,
                records = n,
                "fetched"
            ),
            Err(e) => tracing::warn!(
                name = %institution.parent_name,
                zip = %institution.zip,
                "skipping institution: {e}"
            ),
        }

        if total == 0 {
            return;
        }
        let bucket = done * 100 / total / self.step_pct;
        let prev = self.last_bucket.fetch_max(bucket, Ordering::Relaxed);
        if bucket > prev {
            tracing::info!("[{done}/{total}] {}% of institutions fetched", done * 100 / total);
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!("fetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that does nothing (tests, quiet runs).
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _total: usize) {}

    fn on_institution(
        &self,
        _institution: &Institution,
        _done: usize,
        _total: usize,
        _outcome: &Result<usize, DataError>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DataError::NetworkUnreachable("x".into()).is_transient());
        assert!(DataError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(DataError::HttpStatus { status: 503, context: String::new() }.is_transient());
        assert!(!DataError::HttpStatus { status: 400, context: String::new() }.is_transient());
        assert!(!DataError::CircuitBreakerTripped.is_transient());
        assert!(!DataError::ResponseFormatChanged("x".into()).is_transient());
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(Endpoint::Institutions.path(), "institutions");
        assert_eq!(Endpoint::Financials.path(), "financials");
    }

    #[test]
    fn log_progress_buckets_are_monotonic() {
        let p = LogProgress::new(25);
        let inst = Institution::new("Acme Holding", "10001").unwrap();
        p.on_start(4);
        for done in 1..=4 {
            p.on_institution(&inst, done, 4, &Ok(1));
        }
        assert_eq!(p.last_bucket.load(Ordering::Relaxed), 4);
    }
}
