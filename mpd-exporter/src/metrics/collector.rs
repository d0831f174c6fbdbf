//! Metrics collector implementation.
//!
//! Holds the process-wide observations (endpoint info, fetch status counters,
//! single-valued manifest gauges, bitrate counters) and the table of published
//! per-endpoint period registries.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::domain::BillingKey;

use super::period::PeriodRegistry;
use super::sink::MetricsSink;
use super::table::PeriodTable;

/// Single-valued gauges derived from the manifest root.
///
/// These are overwritten in place on every successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManifestGauges {
    /// Unix seconds, 0 when absent.
    pub availability_start_time: i64,
    /// Unix seconds, 0 when absent.
    pub publish_time: i64,
    pub periods: u64,
    /// Identifier of the last period read as an integer, 0 when not numeric.
    pub last_period: i64,
}

/// Metrics collector for the exporter.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    // Endpoint metrics
    info: DashMap<String, String>,
    fetch_status: DashMap<(String, String), AtomicU64>,
    manifests: DashMap<String, ManifestGauges>,

    // Bitrate metrics
    segment_bytes: DashMap<BillingKey, AtomicU64>,
    segment_probe_errors: DashMap<BillingKey, AtomicU64>,

    // Ephemeral period registries
    periods: PeriodTable,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn period_table(&self) -> &PeriodTable {
        &self.periods
    }

    /// Published period registry of an endpoint.
    pub fn published_periods(&self, endpoint: &str) -> Option<Arc<PeriodRegistry>> {
        self.periods.load(endpoint)
    }

    pub fn manifest_gauges(&self, endpoint: &str) -> Option<ManifestGauges> {
        self.manifests.get(endpoint).map(|g| *g.value())
    }

    pub fn fetch_status_count(&self, endpoint: &str, status: &str) -> u64 {
        self.fetch_status
            .get(&(endpoint.to_string(), status.to_string()))
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn segment_bytes(&self, key: &BillingKey) -> u64 {
        self.segment_bytes
            .get(key)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn segment_probe_errors(&self, key: &BillingKey) -> u64 {
        self.segment_probe_errors
            .get(key)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // ========== Snapshot ==========

    /// Get a snapshot of the process-wide metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            info: self
                .info
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            fetch_status: self
                .fetch_status
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
            manifests: self
                .manifests
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            segment_bytes: self
                .segment_bytes
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
            segment_probe_errors: self
                .segment_probe_errors
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

impl MetricsSink for MetricsCollector {
    fn set_endpoint_info(&self, endpoint: &str, url: &str) {
        self.info.insert(endpoint.to_string(), url.to_string());
        self.periods.register(endpoint);
    }

    fn record_fetch_status(&self, endpoint: &str, status: &str) {
        self.fetch_status
            .entry((endpoint.to_string(), status.to_string()))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn set_manifest_gauges(&self, endpoint: &str, gauges: ManifestGauges) {
        self.manifests.insert(endpoint.to_string(), gauges);
    }

    fn publish_periods(&self, endpoint: &str, registry: PeriodRegistry) {
        self.periods.publish(endpoint, registry);
    }

    fn add_segment_bytes(&self, key: &BillingKey, bytes: u64) {
        if let Some(counter) = self.segment_bytes.get(key) {
            counter.fetch_add(bytes, Ordering::Relaxed);
            return;
        }
        self.segment_bytes
            .entry(key.clone())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_segment_probe_error(&self, key: &BillingKey) {
        self.segment_probe_errors
            .entry(key.clone())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }
}

/// A snapshot of the process-wide metrics at a point in time.
///
/// Maps are ordered so the rendered exposition is stable between scrapes.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Endpoint alias -> manifest URL.
    pub info: BTreeMap<String, String>,
    /// (endpoint, status) -> fetch count.
    pub fetch_status: BTreeMap<(String, String), u64>,
    pub manifests: BTreeMap<String, ManifestGauges>,
    pub segment_bytes: BTreeMap<BillingKey, u64>,
    pub segment_probe_errors: BTreeMap<BillingKey, u64>,
}
