//! Document model for the subset of the DASH MPD schema used by the exporter.
//!
//! The XML itself is read by [`dash_mpd`]; its document tree is narrowed here
//! into owned values with Rust field names. Timestamps are Unix seconds and
//! `xs:duration` attributes are [`Duration`]s.

use std::time::Duration;

/// Root `MPD` element.
#[derive(Debug, Clone, Default)]
pub struct Mpd {
    /// `static` or `dynamic`.
    pub presentation_type: Option<String>,

    /// `@availabilityStartTime` in Unix seconds.
    pub availability_start_time: Option<i64>,

    /// `@publishTime` in Unix seconds.
    pub publish_time: Option<i64>,

    pub minimum_update_period: Option<Duration>,

    pub base_urls: Vec<BaseUrl>,

    pub periods: Vec<Period>,
}

/// `BaseURL` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseUrl {
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct Period {
    pub id: Option<String>,

    /// Offset of the period from the presentation start.
    pub start: Option<Duration>,

    pub duration: Option<Duration>,

    pub base_urls: Vec<BaseUrl>,

    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Clone, Default)]
pub struct AdaptationSet {
    pub id: Option<String>,

    pub mime_type: Option<String>,

    pub content_type: Option<String>,

    pub segment_template: Option<SegmentTemplate>,

    pub representations: Vec<Representation>,
}

#[derive(Debug, Clone, Default)]
pub struct Representation {
    pub id: Option<String>,

    pub mime_type: Option<String>,

    pub codecs: Option<String>,

    /// Bits per second.
    pub bandwidth: Option<u64>,

    pub width: Option<u64>,

    pub height: Option<u64>,

    /// Overrides the adaptation set's template when present.
    pub segment_template: Option<SegmentTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentTemplate {
    pub media: Option<String>,

    pub initialization: Option<String>,

    pub timescale: Option<u64>,

    pub start_number: Option<u64>,

    pub segment_timeline: Option<SegmentTimeline>,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentTimeline {
    pub entries: Vec<TimelineEntry>,
}

/// One `S` element: a run of `r + 1` segments of duration `d` starting at `t`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineEntry {
    pub t: Option<u64>,

    pub d: u64,

    /// `-1` means "repeat until the next entry or the period end".
    pub r: Option<i64>,
}

impl TimelineEntry {
    pub fn new(t: Option<u64>, d: u64, r: Option<i64>) -> Self {
        Self { t, d, r }
    }
}

impl Mpd {
    /// First MPD-level `BaseURL`, if any.
    pub fn base_url(&self) -> Option<&str> {
        first_base_url(&self.base_urls)
    }
}

impl Period {
    /// First period-level `BaseURL`, if any.
    pub fn base_url(&self) -> Option<&str> {
        first_base_url(&self.base_urls)
    }
}

impl AdaptationSet {
    /// Segment template that applies to `representation`.
    pub fn template_for<'a>(
        &'a self,
        representation: &'a Representation,
    ) -> Option<&'a SegmentTemplate> {
        representation
            .segment_template
            .as_ref()
            .or(self.segment_template.as_ref())
    }
}

fn first_base_url(urls: &[BaseUrl]) -> Option<&str> {
    urls.iter()
        .map(|b| b.url.trim())
        .find(|url| !url.is_empty())
}

fn base_urls(urls: Vec<dash_mpd::BaseURL>) -> Vec<BaseUrl> {
    urls.into_iter().map(BaseUrl::from).collect()
}

impl From<dash_mpd::MPD> for Mpd {
    fn from(mpd: dash_mpd::MPD) -> Self {
        Self {
            presentation_type: mpd.mpdtype,
            availability_start_time: mpd.availabilityStartTime.map(|t| t.timestamp()),
            publish_time: mpd.publishTime.map(|t| t.timestamp()),
            minimum_update_period: mpd.minimumUpdatePeriod,
            base_urls: base_urls(mpd.base_url),
            periods: mpd.periods.into_iter().map(Period::from).collect(),
        }
    }
}

impl From<dash_mpd::BaseURL> for BaseUrl {
    fn from(base_url: dash_mpd::BaseURL) -> Self {
        Self { url: base_url.base }
    }
}

impl From<dash_mpd::Period> for Period {
    fn from(period: dash_mpd::Period) -> Self {
        Self {
            id: period.id,
            start: period.start,
            duration: period.duration,
            base_urls: base_urls(period.BaseURL),
            adaptation_sets: period
                .adaptations
                .into_iter()
                .map(AdaptationSet::from)
                .collect(),
        }
    }
}

impl From<dash_mpd::AdaptationSet> for AdaptationSet {
    fn from(set: dash_mpd::AdaptationSet) -> Self {
        Self {
            id: set.id,
            mime_type: set.mimeType,
            content_type: set.contentType,
            segment_template: set.SegmentTemplate.map(SegmentTemplate::from),
            representations: set
                .representations
                .into_iter()
                .map(Representation::from)
                .collect(),
        }
    }
}

impl From<dash_mpd::Representation> for Representation {
    fn from(representation: dash_mpd::Representation) -> Self {
        Self {
            id: representation.id,
            mime_type: representation.mimeType,
            codecs: representation.codecs,
            bandwidth: representation.bandwidth,
            width: representation.width,
            height: representation.height,
            segment_template: representation.SegmentTemplate.map(SegmentTemplate::from),
        }
    }
}

impl From<dash_mpd::SegmentTemplate> for SegmentTemplate {
    fn from(template: dash_mpd::SegmentTemplate) -> Self {
        Self {
            media: template.media,
            initialization: template.initialization,
            timescale: template.timescale,
            start_number: template.startNumber,
            segment_timeline: template.SegmentTimeline.map(|timeline| SegmentTimeline {
                entries: timeline
                    .segments
                    .into_iter()
                    .map(|s| TimelineEntry::new(s.t, s.d, s.r))
                    .collect(),
            }),
        }
    }
}
