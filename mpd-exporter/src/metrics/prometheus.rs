//! Prometheus metrics exporter.
//!
//! Exports metrics in Prometheus text format. Every family's `# HELP` and
//! `# TYPE` lines are written once, followed by the samples of all endpoints.

use std::fmt::Write as _;
use std::sync::Arc;

use super::collector::{ManifestGauges, MetricsCollector};
use super::period::PeriodFamily;

/// Prometheus metrics exporter.
pub struct PrometheusExporter {
    collector: Arc<MetricsCollector>,
    namespace: String,
}

#[derive(Clone, Copy)]
enum MetricType {
    Gauge,
    Counter,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter.
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self {
            collector,
            namespace: "mpd".to_string(),
        }
    }

    /// Create a new Prometheus exporter with custom namespace.
    pub fn with_namespace(collector: Arc<MetricsCollector>, namespace: impl Into<String>) -> Self {
        Self {
            collector,
            namespace: namespace.into(),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let snapshot = self.collector.snapshot();
        let mut output = String::new();

        // Endpoint metrics
        if !snapshot.info.is_empty() {
            self.write_header(&mut output, "info", "Configured MPD endpoint", MetricType::Gauge);
            for (endpoint, url) in &snapshot.info {
                self.write_sample(&mut output, "info", &[("mpd", endpoint), ("url", url)], 1.0);
            }
        }

        if !snapshot.fetch_status.is_empty() {
            self.write_header(
                &mut output,
                "fetch_status_code_total",
                "Total MPD fetches by HTTP status code",
                MetricType::Counter,
            );
            for ((endpoint, status), count) in &snapshot.fetch_status {
                self.write_sample(
                    &mut output,
                    "fetch_status_code_total",
                    &[("mpd", endpoint), ("status", status)],
                    *count as f64,
                );
            }
        }

        // Manifest gauges
        if !snapshot.manifests.is_empty() {
            let gauges: [(&str, &str, fn(&ManifestGauges) -> f64); 4] = [
                ("periods", "Number of periods in the MPD", |g| g.periods as f64),
                (
                    "last_period",
                    "Identifier of the last period in the MPD",
                    |g| g.last_period as f64,
                ),
                (
                    "availability_start_time",
                    "MPD availability start time in seconds since the epoch",
                    |g| g.availability_start_time as f64,
                ),
                (
                    "publish_time",
                    "MPD publish time in seconds since the epoch",
                    |g| g.publish_time as f64,
                ),
            ];
            for (name, help, value) in gauges {
                self.write_header(&mut output, name, help, MetricType::Gauge);
                for (endpoint, manifest) in &snapshot.manifests {
                    self.write_sample(&mut output, name, &[("mpd", endpoint)], value(manifest));
                }
            }
        }

        // Period metrics, merged across the published snapshots
        let published = self.collector.period_table().snapshots();
        for family in PeriodFamily::ALL {
            let desc = family.desc();
            if published
                .iter()
                .all(|(_, registry)| registry.samples(family).is_empty())
            {
                continue;
            }

            self.write_header(&mut output, desc.name, desc.help, MetricType::Gauge);
            for (_, registry) in &published {
                for (values, value) in registry.samples(family) {
                    let labels: Vec<(&str, &str)> = desc
                        .labels
                        .iter()
                        .copied()
                        .zip(values.iter().map(String::as_str))
                        .collect();
                    self.write_sample(&mut output, desc.name, &labels, *value);
                }
            }
        }

        // Bitrate metrics
        if !snapshot.segment_bytes.is_empty() {
            self.write_header(
                &mut output,
                "bitrate_segments_size_bytes_total",
                "Total size in bytes of the media segments announced by the MPD",
                MetricType::Counter,
            );
            for (key, bytes) in &snapshot.segment_bytes {
                self.write_sample(
                    &mut output,
                    "bitrate_segments_size_bytes_total",
                    &[
                        ("mpd", &key.endpoint),
                        ("representation_id", &key.representation_id),
                        ("mime_type", &key.media_type),
                    ],
                    *bytes as f64,
                );
            }
        }

        if !snapshot.segment_probe_errors.is_empty() {
            self.write_header(
                &mut output,
                "bitrate_segment_probe_errors_total",
                "Total failed media segment size probes",
                MetricType::Counter,
            );
            for (key, count) in &snapshot.segment_probe_errors {
                self.write_sample(
                    &mut output,
                    "bitrate_segment_probe_errors_total",
                    &[
                        ("mpd", &key.endpoint),
                        ("representation_id", &key.representation_id),
                        ("mime_type", &key.media_type),
                    ],
                    *count as f64,
                );
            }
        }

        output
    }

    fn write_header(&self, output: &mut String, name: &str, help: &str, kind: MetricType) {
        let full_name = format!("{}_{}", self.namespace, name);
        let _ = writeln!(output, "# HELP {} {}", full_name, help);
        let _ = writeln!(output, "# TYPE {} {}", full_name, kind.as_str());
    }

    fn write_sample(&self, output: &mut String, name: &str, labels: &[(&str, &str)], value: f64) {
        let full_name = format!("{}_{}", self.namespace, name);
        if labels.is_empty() {
            let _ = writeln!(output, "{} {}", full_name, format_value(value));
            return;
        }

        let labels_str = labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect::<Vec<_>>()
            .join(",");

        let _ = writeln!(output, "{}{{{}}} {}", full_name, labels_str, format_value(value));
    }
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
