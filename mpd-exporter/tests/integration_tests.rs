//! Integration tests for the watcher pipeline.
//!
//! Watchers run against in-memory manifest sources and segment probes, and
//! results are checked through the collector and the Prometheus output.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use url::Url;

use mpd_exporter::Error;
use mpd_exporter::domain::{BillingKey, Endpoint};
use mpd_exporter::metrics::{MetricsCollector, PeriodFamily, PrometheusExporter};
use mpd_exporter::watcher::{
    BillingLedgerStore, EndpointWatcher, FetchedManifest, InMemoryLedger, ManifestSource,
    SegmentAccountant, SegmentProbe, WatcherSupervisor,
};

/// Serves queued responses per manifest URL; the last one repeats.
#[derive(Default)]
struct FakeOrigin {
    manifests: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
    segments: Mutex<HashMap<String, u64>>,
    probes: Mutex<Vec<String>>,
}

impl FakeOrigin {
    fn queue_manifest(&self, url: &str, status: u16, body: impl Into<String>) {
        self.manifests
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back((status, body.into()));
    }

    fn add_segment(&self, url: &str, size: u64) {
        self.segments.lock().unwrap().insert(url.to_string(), size);
    }

    fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }
}

#[async_trait]
impl ManifestSource for FakeOrigin {
    async fn fetch(&self, url: &Url) -> mpd_exporter::Result<FetchedManifest> {
        let mut manifests = self.manifests.lock().unwrap();
        let queue = manifests.get_mut(url.as_str()).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                url.to_string(),
            ))
        })?;
        let (status, body) = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        Ok(FetchedManifest {
            status,
            body: Bytes::from(body),
        })
    }
}

#[async_trait]
impl SegmentProbe for FakeOrigin {
    async fn content_length(&self, url: &Url) -> mpd_exporter::Result<u64> {
        self.probes.lock().unwrap().push(url.to_string());
        self.segments
            .lock()
            .unwrap()
            .get(url.as_str())
            .copied()
            .ok_or_else(|| Error::http_status(404, url.as_str()))
    }
}

fn periods_manifest(ids: &[&str]) -> String {
    let periods: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<Period id="{id}" start="PT{id}0S">
  <AdaptationSet mimeType="video/mp4">
    <Representation id="v1" bandwidth="1000000" width="1280" height="720"/>
  </AdaptationSet>
</Period>"#
            )
        })
        .collect();
    format!(r#"<MPD type="dynamic">{periods}</MPD>"#)
}

fn timeline_manifest(entries: &str) -> String {
    format!(
        r#"<MPD type="dynamic">
  <Period id="1">
    <AdaptationSet mimeType="video/mp4">
      <SegmentTemplate media="$RepresentationID$/$Time$.m4s">
        <SegmentTimeline>{entries}</SegmentTimeline>
      </SegmentTemplate>
      <Representation id="v1" bandwidth="1000000"/>
    </AdaptationSet>
  </Period>
</MPD>"#
    )
}

fn endpoint(alias: &str) -> Endpoint {
    Endpoint::new(alias, Url::parse(&format!("http://origin/{alias}/manifest.mpd")).unwrap())
}

struct Harness {
    origin: Arc<FakeOrigin>,
    collector: Arc<MetricsCollector>,
    ledger: Arc<InMemoryLedger>,
}

impl Harness {
    fn new() -> Self {
        Self {
            origin: Arc::new(FakeOrigin::default()),
            collector: Arc::new(MetricsCollector::new()),
            ledger: Arc::new(InMemoryLedger::new()),
        }
    }

    fn watcher(&self, alias: &str, bitrate: bool) -> EndpointWatcher {
        let watcher = EndpointWatcher::new(
            endpoint(alias),
            self.origin.clone(),
            self.collector.clone(),
            Duration::from_millis(10),
            CancellationToken::new(),
        );
        if bitrate {
            watcher.with_accountant(Arc::new(SegmentAccountant::new(
                self.ledger.clone(),
                self.origin.clone(),
                self.collector.clone(),
            )))
        } else {
            watcher
        }
    }
}

mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_freshness() {
        let harness = Harness::new();
        let url = "http://origin/live/manifest.mpd";
        harness.origin.queue_manifest(url, 200, periods_manifest(&["0", "1"]));
        harness.origin.queue_manifest(url, 200, periods_manifest(&["1", "2"]));

        let watcher = harness.watcher("live", false);
        watcher.run_cycle().await.unwrap();
        watcher.run_cycle().await.unwrap();

        let published = harness.collector.published_periods("live").unwrap();
        let periods: Vec<_> = published
            .label_values(PeriodFamily::Start, "period")
            .into_iter()
            .collect();
        assert_eq!(periods, vec!["1".to_string(), "2".to_string()]);

        let output = PrometheusExporter::new(harness.collector.clone()).export();
        assert!(!output.contains(r#"period="0""#));
        assert!(output.contains(r#"mpd_period_start{mpd="live",period="2"} 20"#));
        assert!(output.contains(r#"mpd_last_period{mpd="live"} 2"#));
    }

    #[tokio::test]
    async fn test_stale_on_failure() {
        let harness = Harness::new();
        let url = "http://origin/live/manifest.mpd";
        harness.origin.queue_manifest(url, 200, periods_manifest(&["0", "1"]));
        harness.origin.queue_manifest(url, 500, "");

        let watcher = harness.watcher("live", false);
        watcher.run_cycle().await.unwrap();
        assert!(watcher.run_cycle().await.is_err());

        let published = harness.collector.published_periods("live").unwrap();
        assert_eq!(published.samples(PeriodFamily::Start).len(), 2);
        assert_eq!(harness.collector.fetch_status_count("live", "200"), 1);
        assert_eq!(harness.collector.fetch_status_count("live", "500"), 1);
    }

    #[tokio::test]
    async fn test_missing_identifier_fallback() {
        let harness = Harness::new();
        harness.origin.queue_manifest(
            "http://origin/live/manifest.mpd",
            200,
            r#"<MPD><Period id="a"/><Period id="b"/><Period start="PT5S"/></MPD>"#,
        );

        harness.watcher("live", false).run_cycle().await.unwrap();

        let published = harness.collector.published_periods("live").unwrap();
        assert_eq!(published.value(PeriodFamily::Start, &["live", "2"]), Some(5.0));
    }

    #[tokio::test]
    async fn test_unpublished_endpoint_contributes_nothing() {
        let harness = Harness::new();
        harness.origin.queue_manifest("http://origin/down/manifest.mpd", 404, "");

        let watcher = harness.watcher("down", false);
        assert!(watcher.run_cycle().await.is_err());

        let output = PrometheusExporter::new(harness.collector.clone()).export();
        assert!(output.contains(r#"mpd_fetch_status_code_total{mpd="down",status="404"} 1"#));
        assert!(!output.contains("mpd_period_start"));
    }
}

mod bitrate_tests {
    use super::*;

    #[tokio::test]
    async fn test_idempotent_billing_across_polls() {
        let harness = Harness::new();
        let url = "http://origin/live/manifest.mpd";
        harness
            .origin
            .queue_manifest(url, 200, timeline_manifest(r#"<S t="0" d="10" r="2"/>"#));
        for start in [0, 10, 20, 30] {
            harness
                .origin
                .add_segment(&format!("http://origin/live/v1/{start}.m4s"), 100);
        }

        let watcher = harness.watcher("live", true);
        let first = watcher.run_cycle().await.unwrap();
        let second = watcher.run_cycle().await.unwrap();

        assert_eq!(first.accounting.unwrap().billed, 3);
        assert_eq!(second.accounting.unwrap().billed, 0);

        let key = BillingKey::new("live", "v1", "video/mp4");
        assert_eq!(harness.collector.segment_bytes(&key), 300);
        assert_eq!(harness.ledger.last_billed(&key), Some(20));
        assert_eq!(harness.origin.probe_count(), 3);
    }

    #[tokio::test]
    async fn test_sliding_window_bills_new_segments_only() {
        let harness = Harness::new();
        let url = "http://origin/live/manifest.mpd";
        harness
            .origin
            .queue_manifest(url, 200, timeline_manifest(r#"<S t="0" d="10" r="1"/>"#));
        harness
            .origin
            .queue_manifest(url, 200, timeline_manifest(r#"<S t="10" d="10" r="1"/>"#));
        for (start, size) in [(0, 100), (10, 200), (20, 400)] {
            harness
                .origin
                .add_segment(&format!("http://origin/live/v1/{start}.m4s"), size);
        }

        let watcher = harness.watcher("live", true);
        watcher.run_cycle().await.unwrap();
        let second = watcher.run_cycle().await.unwrap();

        assert_eq!(second.accounting.unwrap().billed, 1);
        let key = BillingKey::new("live", "v1", "video/mp4");
        assert_eq!(harness.collector.segment_bytes(&key), 700);
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let harness = Harness::new();
        harness.origin.queue_manifest(
            "http://origin/live/manifest.mpd",
            200,
            timeline_manifest(r#"<S t="0" d="10" r="2"/>"#),
        );
        harness.origin.add_segment("http://origin/live/v1/0.m4s", 100);
        harness.origin.add_segment("http://origin/live/v1/20.m4s", 300);

        let outcome = harness.watcher("live", true).run_cycle().await.unwrap();
        let report = outcome.accounting.unwrap();
        assert_eq!(report.billed, 2);
        assert_eq!(report.failed, 1);

        let key = BillingKey::new("live", "v1", "video/mp4");
        assert_eq!(harness.collector.segment_bytes(&key), 400);
        assert_eq!(harness.collector.segment_probe_errors(&key), 1);
        // Structural snapshot is published regardless.
        assert!(harness.collector.published_periods("live").is_some());
    }
}

mod supervisor_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_endpoint_isolation() {
        let harness = Harness::new();
        harness.origin.queue_manifest(
            "http://origin/good/manifest.mpd",
            200,
            periods_manifest(&["4"]),
        );
        harness
            .origin
            .queue_manifest("http://origin/bad/manifest.mpd", 503, "");

        let token = CancellationToken::new();
        let supervisor = WatcherSupervisor::new(
            vec![endpoint("bad"), endpoint("good")],
            harness.origin.clone(),
            harness.collector.clone(),
            None,
            Duration::from_millis(10),
            token.clone(),
        );

        let run = tokio::spawn(supervisor.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        run.await.unwrap();

        assert!(harness.collector.published_periods("bad").is_none());
        assert!(harness.collector.fetch_status_count("bad", "503") >= 1);

        let good = harness.collector.published_periods("good").unwrap();
        assert_eq!(good.value(PeriodFamily::Start, &["good", "4"]), Some(40.0));
        assert_eq!(harness.collector.manifest_gauges("good").unwrap().last_period, 4);

        let output = PrometheusExporter::new(harness.collector.clone()).export();
        assert!(output.contains(r#"mpd_info{mpd="bad",url="http://origin/bad/manifest.mpd"} 1"#));
        assert!(output.contains(r#"mpd_info{mpd="good",url="http://origin/good/manifest.mpd"} 1"#));
    }
}
