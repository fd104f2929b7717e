//! Request counters.
//!
//! The pipeline counts every completed request by `(path, status_code)`. Where
//! those counts go is decided at construction time by injecting a
//! [`RequestCounter`]:
//!
//! | Counter | Backing store |
//! |---|---|
//! | [`PrometheusCounter`] | the `metrics` recorder installed in the process |
//! | [`RequestTally`] | an in-process map, readable with [`RequestTally::get`] |
//!
//! Counts only ever go up.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use http::StatusCode;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::Error;

/// Default counter name.
pub const REQUESTS_COUNTER: &str = "matchbox_requests";

/// Receives one increment per completed request.
///
/// Implementations are shared by every in-flight request and must tolerate
/// concurrent calls.
pub trait RequestCounter: Send + Sync + 'static {
    fn increment(&self, path: &str, status: StatusCode);
}

// ── Prometheus ────────────────────────────────────────────────────────────────

/// Increments a `metrics` counter labelled by `path` and `status_code`.
///
/// The counter is recorded on whichever recorder is current: the global one
/// installed by [`install_prometheus`], or a local one in tests.
#[derive(Clone, Debug)]
pub struct PrometheusCounter {
    name: String,
}

impl PrometheusCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for PrometheusCounter {
    fn default() -> Self {
        Self::new(REQUESTS_COUNTER)
    }
}

impl RequestCounter for PrometheusCounter {
    fn increment(&self, path: &str, status: StatusCode) {
        counter!(
            self.name.clone(),
            "path" => path.to_owned(),
            "status_code" => status.as_u16().to_string(),
        )
        .increment(1);
    }
}

/// Installs a process-wide Prometheus recorder and describes `counter`.
///
/// Render the returned handle from whatever endpoint exposes metrics.
pub fn install_prometheus(counter: &PrometheusCounter) -> Result<PrometheusHandle, Error> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Metrics(e.to_string()))?;

    describe_counter!(counter.name().to_owned(), "The total number of processed requests");

    Ok(handle)
}

// ── In-process tally ──────────────────────────────────────────────────────────

/// Counts requests in memory.
#[derive(Debug, Default)]
pub struct RequestTally {
    counts: DashMap<(String, u16), AtomicU64>,
}

impl RequestTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen for `path` that completed with `status`.
    pub fn get(&self, path: &str, status: StatusCode) -> u64 {
        self.counts
            .get(&(path.to_owned(), status.as_u16()))
            .map_or(0, |n| n.load(Ordering::Relaxed))
    }

    /// Requests seen across every path and status.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|entry| entry.value().load(Ordering::Relaxed)).sum()
    }
}

impl RequestCounter for RequestTally {
    fn increment(&self, path: &str, status: StatusCode) {
        let key = (path.to_owned(), status.as_u16());
        if let Some(n) = self.counts.get(&key) {
            n.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.counts.entry(key).or_default().fetch_add(1, Ordering::Relaxed);
    }
}
