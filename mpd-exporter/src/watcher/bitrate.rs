//! Segment bitrate accounting.
//!
//! Every poll sees the whole sliding window of a live manifest, so most
//! segments were already seen on earlier polls. The accountant bills a
//! segment only when its start offset lies beyond the ledger value of its
//! billing key, and moves the ledger forward segment by segment.

use std::ops::AddAssign;
use std::sync::Arc;

use mpd::{AdaptationSet, Mpd, Period, Representation, TimelineEntry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::domain::BillingKey;
use crate::metrics::MetricsSink;
use crate::{Error, Result};

use super::ledger::BillingLedgerStore;
use super::source::SegmentProbe;

/// One concrete segment of an unwound timeline, in timescale units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSegment {
    pub start: u64,
    pub duration: u64,
}

/// Expand compact timeline entries into individual segments.
///
/// Each entry yields `r + 1` segments starting at `t` and stepping by `d`.
/// A missing `r` counts as 0, as does a negative one. Entries without `t`
/// are skipped.
pub fn unwind(entries: &[TimelineEntry]) -> impl Iterator<Item = TimelineSegment> + '_ {
    entries.iter().flat_map(|entry| {
        let count = match entry.t {
            Some(_) => entry.r.unwrap_or(0).max(0) as u64 + 1,
            None => 0,
        };
        let start = entry.t.unwrap_or(0);
        let duration = entry.d;
        (0..count).map(move |i| TimelineSegment {
            start: start.saturating_add(i.saturating_mul(duration)),
            duration,
        })
    })
}

/// Outcome of one accounting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountReport {
    pub billed: usize,
    pub bytes: u64,
    pub failed: usize,
}

impl AddAssign for AccountReport {
    fn add_assign(&mut self, rhs: Self) {
        self.billed += rhs.billed;
        self.bytes += rhs.bytes;
        self.failed += rhs.failed;
    }
}

/// Bills newly appeared segments exactly once.
pub struct SegmentAccountant {
    ledger: Arc<dyn BillingLedgerStore>,
    probe: Arc<dyn SegmentProbe>,
    sink: Arc<dyn MetricsSink>,
}

impl SegmentAccountant {
    pub fn new(
        ledger: Arc<dyn BillingLedgerStore>,
        probe: Arc<dyn SegmentProbe>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            ledger,
            probe,
            sink,
        }
    }

    /// Bill the segments of one billing key, in order.
    ///
    /// A segment whose size cannot be read is counted as a probe error and
    /// left unbilled; the ledger is not moved for it. Only cancellation
    /// aborts the pass.
    pub async fn account<I, F>(
        &self,
        key: &BillingKey,
        segments: I,
        url_for: F,
        token: &CancellationToken,
    ) -> Result<AccountReport>
    where
        I: IntoIterator<Item = TimelineSegment>,
        F: Fn(&TimelineSegment) -> Result<Url>,
    {
        let mut report = AccountReport::default();

        for segment in segments {
            if let Some(last) = self.ledger.last_billed(key)
                && segment.start <= last
            {
                continue;
            }

            match self.probe_segment(&segment, &url_for, token).await {
                Ok(bytes) => {
                    self.sink.add_segment_bytes(key, bytes);
                    self.ledger.advance(key, segment.start);
                    report.billed += 1;
                    report.bytes += bytes;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(
                        key = %key,
                        start = segment.start,
                        error = %e,
                        "Failed to read segment size"
                    );
                    self.sink.record_segment_probe_error(key);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn probe_segment<F>(
        &self,
        segment: &TimelineSegment,
        url_for: &F,
        token: &CancellationToken,
    ) -> Result<u64>
    where
        F: Fn(&TimelineSegment) -> Result<Url>,
    {
        let url = url_for(segment)?;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            result = self.probe.content_length(&url) => result,
        }
    }

    /// Bill every representation of a manifest that carries a segment timeline.
    pub async fn collect(
        &self,
        manifest: &Mpd,
        alias: &str,
        manifest_url: &Url,
        token: &CancellationToken,
    ) -> Result<AccountReport> {
        let mut report = AccountReport::default();

        let base = match resolve_base(manifest_url, manifest.base_url()) {
            Ok(base) => base,
            Err(e) => {
                warn!(mpd = %alias, error = %e, "Invalid MPD BaseURL, skipping bitrate accounting");
                return Ok(report);
            }
        };

        for period in &manifest.periods {
            report += self.collect_period(period, alias, &base, token).await?;
        }

        Ok(report)
    }

    async fn collect_period(
        &self,
        period: &Period,
        alias: &str,
        base: &Url,
        token: &CancellationToken,
    ) -> Result<AccountReport> {
        let mut report = AccountReport::default();

        let base = match resolve_base(base, period.base_url()) {
            Ok(base) => base,
            Err(e) => {
                warn!(mpd = %alias, period = ?period.id, error = %e, "Invalid period BaseURL, skipping period");
                return Ok(report);
            }
        };

        for adaptation_set in &period.adaptation_sets {
            for representation in &adaptation_set.representations {
                let Some(target) = BillingTarget::resolve(alias, adaptation_set, representation)
                else {
                    continue;
                };

                let media = target.media_path(representation);
                let url_for = |segment: &TimelineSegment| {
                    let path = media.replace("$Time$", &segment.start.to_string());
                    base.join(&path)
                        .map_err(|e| Error::accounting(path.clone(), e.to_string()))
                };

                report += self
                    .account(&target.key, unwind(target.entries), url_for, token)
                    .await?;
            }
        }

        Ok(report)
    }
}

/// A representation that can be billed, with everything needed to do so.
struct BillingTarget<'a> {
    key: BillingKey,
    media: &'a str,
    entries: &'a [TimelineEntry],
}

impl<'a> BillingTarget<'a> {
    fn resolve(
        alias: &str,
        adaptation_set: &'a AdaptationSet,
        representation: &'a Representation,
    ) -> Option<Self> {
        let Some(id) = representation.id.as_deref() else {
            debug!(mpd = %alias, "Representation without id, skipping bitrate accounting");
            return None;
        };
        let Some(media_type) = adaptation_set
            .mime_type
            .as_deref()
            .or(representation.mime_type.as_deref())
        else {
            debug!(mpd = %alias, representation = %id, "No mime type, skipping bitrate accounting");
            return None;
        };

        let template = adaptation_set.template_for(representation)?;
        let timeline = template.segment_timeline.as_ref()?;
        let media = template.media.as_deref()?;

        Some(Self {
            key: BillingKey::new(alias, id, media_type),
            media,
            entries: &timeline.entries,
        })
    }

    /// Media template with the per-representation placeholders filled in.
    fn media_path(&self, representation: &Representation) -> String {
        let mut path = self
            .media
            .replace("$RepresentationID$", &self.key.representation_id);
        if let Some(bandwidth) = representation.bandwidth {
            path = path.replace("$Bandwidth$", &bandwidth.to_string());
        }
        path
    }
}

/// Resolve an optional `BaseURL` against `base`. Relative values are joined,
/// absolute ones replace `base`.
fn resolve_base(base: &Url, base_url: Option<&str>) -> std::result::Result<Url, url::ParseError> {
    match base_url {
        Some(value) => base.join(value),
        None => base.join("."),
    }
}
