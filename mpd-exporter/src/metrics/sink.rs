//! Write-side seam between the watchers and the metrics store.

use crate::domain::BillingKey;

use super::collector::ManifestGauges;
use super::period::PeriodRegistry;

/// Receives every observation a watcher produces.
///
/// Watchers only ever write through this trait, so tests can hand them an
/// isolated store instead of a process-wide one.
pub trait MetricsSink: Send + Sync + 'static {
    /// Mark an endpoint as configured (`mpd_info = 1`).
    fn set_endpoint_info(&self, endpoint: &str, url: &str);

    /// Count one manifest fetch outcome. `status` is the HTTP status code, or
    /// `"error"` when the request never produced a response.
    fn record_fetch_status(&self, endpoint: &str, status: &str);

    /// Overwrite the single-valued manifest gauges of an endpoint.
    fn set_manifest_gauges(&self, endpoint: &str, gauges: ManifestGauges);

    /// Atomically replace the published period registry of an endpoint.
    fn publish_periods(&self, endpoint: &str, registry: PeriodRegistry);

    /// Add billed segment bytes.
    fn add_segment_bytes(&self, key: &BillingKey, bytes: u64);

    /// Count a failed segment metadata probe.
    fn record_segment_probe_error(&self, key: &BillingKey);
}
