//! Structural extraction: manifest tree to gauges.

use mpd::{AdaptationSet, Mpd, Period, Representation};

use crate::metrics::{ManifestGauges, PeriodFamily, PeriodRegistry};

const UNKNOWN_MIME_TYPE: &str = "unknown";

/// Walk a parsed manifest and produce its single-valued gauges plus a freshly
/// populated period registry. Absent timestamps are reported as 0.
pub fn extract(manifest: &Mpd, alias: &str) -> (ManifestGauges, PeriodRegistry) {
    let gauges = ManifestGauges {
        availability_start_time: manifest.availability_start_time.unwrap_or(0),
        publish_time: manifest.publish_time.unwrap_or(0),
        periods: manifest.periods.len() as u64,
        last_period: manifest
            .periods
            .last()
            .and_then(|p| p.id.as_deref())
            .and_then(|id| id.trim().parse().ok())
            .unwrap_or(0),
    };

    let mut registry = PeriodRegistry::new();
    for (index, period) in manifest.periods.iter().enumerate() {
        extract_period(&mut registry, alias, index, period);
    }

    (gauges, registry)
}

fn extract_period(registry: &mut PeriodRegistry, alias: &str, index: usize, period: &Period) {
    let period_id = label_or_index(period.id.as_deref(), index);
    let start = period.start.map(|s| s.as_secs_f64()).unwrap_or(0.0);
    registry.set(PeriodFamily::Start, &[alias, period_id.as_str()], start);

    for base_url in &period.base_urls {
        registry.set(
            PeriodFamily::BaseUrl,
            &[alias, period_id.as_str(), base_url.url.as_str()],
            1.0,
        );
    }

    for (index, adaptation_set) in period.adaptation_sets.iter().enumerate() {
        extract_adaptation_set(registry, alias, &period_id, index, adaptation_set);
    }
}

fn extract_adaptation_set(
    registry: &mut PeriodRegistry,
    alias: &str,
    period_id: &str,
    index: usize,
    adaptation_set: &AdaptationSet,
) {
    let set_id = label_or_index(adaptation_set.id.as_deref(), index);
    let mime_type = adaptation_set
        .mime_type
        .as_deref()
        .unwrap_or(UNKNOWN_MIME_TYPE);
    registry.set(
        PeriodFamily::MimeType,
        &[alias, period_id, set_id.as_str(), mime_type],
        1.0,
    );

    for (index, representation) in adaptation_set.representations.iter().enumerate() {
        extract_representation(
            registry,
            &[alias, period_id, set_id.as_str()],
            index,
            representation,
        );
    }
}

fn extract_representation(
    registry: &mut PeriodRegistry,
    parent: &[&str; 3],
    index: usize,
    representation: &Representation,
) {
    let id = label_or_index(representation.id.as_deref(), index);
    let labels = [parent[0], parent[1], parent[2], id.as_str()];

    // Absent attributes are not recorded at all.
    if let Some(height) = representation.height {
        registry.set(PeriodFamily::Height, &labels, height as f64);
    }
    if let Some(width) = representation.width {
        registry.set(PeriodFamily::Width, &labels, width as f64);
    }
    if let Some(bandwidth) = representation.bandwidth {
        registry.set(PeriodFamily::Bandwidth, &labels, bandwidth as f64);
    }
    if let Some(codecs) = representation.codecs.as_deref() {
        registry.set(
            PeriodFamily::Codecs,
            &[labels[0], labels[1], labels[2], labels[3], codecs],
            1.0,
        );
    }
}

fn label_or_index(id: Option<&str>, index: usize) -> String {
    match id {
        Some(id) => id.to_string(),
        None => index.to_string(),
    }
}
