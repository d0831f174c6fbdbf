//! Metrics storage and exposition.
//!
//! Watchers write through [`MetricsSink`]; the HTTP surface renders the
//! stored state with [`PrometheusExporter`].
//!
//! # Families
//!
//! - Process-wide: endpoint info, fetch status counters, manifest gauges,
//!   bitrate counters. Kept for the lifetime of the process.
//! - Ephemeral: per-period structural gauges. Held in a [`PeriodRegistry`]
//!   per endpoint and replaced as a whole on every successful poll.
//!
//! # Example
//!
//! ```ignore
//! use mpd_exporter::metrics::{MetricsCollector, MetricsSink, PrometheusExporter};
//!
//! let collector = Arc::new(MetricsCollector::new());
//! collector.record_fetch_status("live", "200");
//!
//! let text = PrometheusExporter::new(collector).export();
//! ```

mod collector;
mod period;
mod prometheus;
mod sink;
mod table;

pub use collector::{ManifestGauges, MetricsCollector, MetricsSnapshot};
pub use period::{FamilyDesc, LabelValues, PeriodFamily, PeriodRegistry, Samples};
pub use prometheus::PrometheusExporter;
pub use sink::MetricsSink;
pub use table::PeriodTable;
