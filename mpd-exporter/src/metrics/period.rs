//! Ephemeral per-manifest structural gauges.
//!
//! Live DASH manifests are sliding windows: periods and adaptation sets come
//! and go. A `PeriodRegistry` therefore holds the gauges of exactly one
//! manifest snapshot. It is filled by a single extraction pass, published as
//! a whole, and never touched again, so label sets of periods that left the
//! window disappear with the registry that carried them.

use std::collections::{BTreeMap, BTreeSet};

/// Static description of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyDesc {
    /// Name without the exporter namespace.
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

const PERIOD_LABELS: &[&str] = &["mpd", "period"];
const REPRESENTATION_LABELS: &[&str] = &["mpd", "period", "adaptation_set", "representation"];

/// Gauge families carried by a [`PeriodRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodFamily {
    Start,
    BaseUrl,
    MimeType,
    Height,
    Width,
    Bandwidth,
    Codecs,
}

impl PeriodFamily {
    pub const ALL: [PeriodFamily; 7] = [
        PeriodFamily::Start,
        PeriodFamily::BaseUrl,
        PeriodFamily::MimeType,
        PeriodFamily::Height,
        PeriodFamily::Width,
        PeriodFamily::Bandwidth,
        PeriodFamily::Codecs,
    ];

    pub const fn desc(self) -> FamilyDesc {
        match self {
            Self::Start => FamilyDesc {
                name: "period_start",
                help: "Start of the MPD period in seconds since the presentation start",
                labels: PERIOD_LABELS,
            },
            Self::BaseUrl => FamilyDesc {
                name: "period_base_url",
                help: "Base URL of the MPD period",
                labels: &["mpd", "period", "base_url"],
            },
            Self::MimeType => FamilyDesc {
                name: "adaptation_set_mime_type",
                help: "MIME type of the MPD adaptation set",
                labels: &["mpd", "period", "adaptation_set", "mime_type"],
            },
            Self::Height => FamilyDesc {
                name: "representation_height",
                help: "Height of the MPD representation in pixels",
                labels: REPRESENTATION_LABELS,
            },
            Self::Width => FamilyDesc {
                name: "representation_width",
                help: "Width of the MPD representation in pixels",
                labels: REPRESENTATION_LABELS,
            },
            Self::Bandwidth => FamilyDesc {
                name: "representation_bandwidth",
                help: "Bandwidth of the MPD representation in bits per second",
                labels: REPRESENTATION_LABELS,
            },
            Self::Codecs => FamilyDesc {
                name: "representation_codecs",
                help: "Codecs of the MPD representation",
                labels: &[
                    "mpd",
                    "period",
                    "adaptation_set",
                    "representation",
                    "codecs",
                ],
            },
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Label values of one sample, in the order of the family's label names.
pub type LabelValues = Vec<String>;

/// Samples of one gauge family.
pub type Samples = BTreeMap<LabelValues, f64>;

/// Structural gauges for one manifest snapshot of one endpoint.
#[derive(Debug, Clone, Default)]
pub struct PeriodRegistry {
    families: [Samples; 7],
}

impl PeriodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a gauge value. Setting the same label set twice keeps the last value.
    pub fn set(&mut self, family: PeriodFamily, labels: &[&str], value: f64) {
        debug_assert_eq!(
            labels.len(),
            family.desc().labels.len(),
            "label arity mismatch for {:?}",
            family
        );
        let key = labels.iter().map(|l| (*l).to_string()).collect();
        self.families[family.index()].insert(key, value);
    }

    pub fn samples(&self, family: PeriodFamily) -> &Samples {
        &self.families[family.index()]
    }

    /// Value of a single sample.
    pub fn value(&self, family: PeriodFamily, labels: &[&str]) -> Option<f64> {
        let key: LabelValues = labels.iter().map(|l| (*l).to_string()).collect();
        self.samples(family).get(&key).copied()
    }

    /// Distinct values of one label across a family.
    pub fn label_values(&self, family: PeriodFamily, label: &str) -> BTreeSet<String> {
        let Some(position) = family.desc().labels.iter().position(|l| *l == label) else {
            return BTreeSet::new();
        };
        self.samples(family)
            .keys()
            .filter_map(|values| values.get(position).cloned())
            .collect()
    }

    /// Total number of samples across all families.
    pub fn len(&self) -> usize {
        self.families.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
