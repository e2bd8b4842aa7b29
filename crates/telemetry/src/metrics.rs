//! Internal metrics collection.
//!
//! Collects metrics in-memory; the scheduler logs a snapshot periodically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the session lifecycle service.
#[derive(Debug, Default)]
pub struct Metrics {
    // Lifecycle
    pub sign_ins: Counter,
    pub sign_in_failures: Counter,
    pub sessions_created: Counter,
    pub sessions_demoted: Counter,
    pub sessions_terminated: Counter,
    pub self_logouts: Counter,
    pub reauth_failures: Counter,
    pub permission_denied: Counter,
    pub forced_sign_outs: Counter,
    pub sign_out_failures: Counter,

    // Heartbeat
    pub heartbeats: Counter,
    pub heartbeat_errors: Counter,

    // Registry
    pub registry_writes: Counter,
    pub registry_deletes: Counter,
    pub change_events_published: Counter,
    pub subscriber_resyncs: Counter,

    // External lookups
    pub geo_lookups: Counter,
    pub geo_lookup_failures: Counter,
    pub security_lookup_failures: Counter,
    pub tor_list_refreshes: Counter,

    // Latency histograms
    pub sign_in_latency_ms: Histogram,
    pub lookup_latency_ms: Histogram,

    // Gauges
    pub active_clients: Gauge,
    pub account_actors: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub sign_ins: u64,
    pub sign_in_failures: u64,
    pub sessions_created: u64,
    pub sessions_demoted: u64,
    pub sessions_terminated: u64,
    pub self_logouts: u64,
    pub reauth_failures: u64,
    pub permission_denied: u64,
    pub forced_sign_outs: u64,
    pub sign_out_failures: u64,
    pub heartbeats: u64,
    pub heartbeat_errors: u64,
    pub change_events_published: u64,
    pub subscriber_resyncs: u64,
    pub geo_lookup_failures: u64,
    pub security_lookup_failures: u64,
    pub sign_in_latency_mean_ms: f64,
    pub lookup_latency_mean_ms: f64,
    pub active_clients: u64,
    pub account_actors: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            sign_ins: self.sign_ins.get(),
            sign_in_failures: self.sign_in_failures.get(),
            sessions_created: self.sessions_created.get(),
            sessions_demoted: self.sessions_demoted.get(),
            sessions_terminated: self.sessions_terminated.get(),
            self_logouts: self.self_logouts.get(),
            reauth_failures: self.reauth_failures.get(),
            permission_denied: self.permission_denied.get(),
            forced_sign_outs: self.forced_sign_outs.get(),
            sign_out_failures: self.sign_out_failures.get(),
            heartbeats: self.heartbeats.get(),
            heartbeat_errors: self.heartbeat_errors.get(),
            change_events_published: self.change_events_published.get(),
            subscriber_resyncs: self.subscriber_resyncs.get(),
            geo_lookup_failures: self.geo_lookup_failures.get(),
            security_lookup_failures: self.security_lookup_failures.get(),
            sign_in_latency_mean_ms: self.sign_in_latency_ms.mean(),
            lookup_latency_mean_ms: self.lookup_latency_ms.mean(),
            active_clients: self.active_clients.get(),
            account_actors: self.account_actors.get(),
        }
    }
}

/// Emit a snapshot as one structured log line.
pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(json) => tracing::info!(target: "metrics", snapshot = %json, "Metrics snapshot"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize metrics snapshot"),
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
