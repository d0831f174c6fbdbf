//! Supervisor owning one watcher task per configured endpoint.
//!
//! The `WatcherSupervisor` is responsible for:
//! - Publishing the `info` observation of every endpoint at startup
//! - Spawning exactly one watcher per endpoint into a `JoinSet`
//! - Waiting for all watchers on shutdown
//!
//! Panics are contained per cycle by [`EndpointWatcher::guarded_cycle`], so a
//! watcher task only ends once its token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::Endpoint;
use crate::metrics::MetricsSink;

use super::bitrate::SegmentAccountant;
use super::source::ManifestSource;
use super::worker::EndpointWatcher;

/// Report from a supervisor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub watchers: usize,
    /// Watcher tasks that ended before shutdown was requested.
    pub lost: usize,
}

pub struct WatcherSupervisor {
    watchers: Vec<Arc<EndpointWatcher>>,
    tasks: JoinSet<usize>,
    cancellation_token: CancellationToken,
    lost: usize,
}

impl WatcherSupervisor {
    /// Build one watcher per endpoint and mark every endpoint as configured.
    pub fn new(
        endpoints: Vec<Endpoint>,
        source: Arc<dyn ManifestSource>,
        sink: Arc<dyn MetricsSink>,
        accountant: Option<Arc<SegmentAccountant>>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        let watchers = endpoints
            .into_iter()
            .map(|endpoint| {
                sink.set_endpoint_info(&endpoint.alias, endpoint.url.as_str());

                let mut watcher = EndpointWatcher::new(
                    endpoint,
                    source.clone(),
                    sink.clone(),
                    interval,
                    cancellation_token.child_token(),
                );
                if let Some(accountant) = &accountant {
                    watcher = watcher.with_accountant(accountant.clone());
                }
                Arc::new(watcher)
            })
            .collect();

        Self {
            watchers,
            tasks: JoinSet::new(),
            cancellation_token,
            lost: 0,
        }
    }

    pub fn watchers(&self) -> &[Arc<EndpointWatcher>] {
        &self.watchers
    }

    /// Spawn all watchers and supervise them until cancelled.
    pub async fn run(mut self) -> SupervisorReport {
        for index in 0..self.watchers.len() {
            let watcher = self.watchers[index].clone();
            self.tasks.spawn(async move {
                watcher.run().await;
                index
            });
        }
        info!(watchers = self.watchers.len(), "Watcher supervisor started");

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                result = self.tasks.join_next() => {
                    match result {
                        Some(Ok(index)) => {
                            debug!(mpd = %self.watchers[index].alias(), "Watcher task finished");
                        }
                        Some(Err(e)) => {
                            self.lost += 1;
                            error!(error = %e, "Watcher task ended abnormally");
                        }
                        None => break,
                    }
                }
            }
        }

        self.shutdown().await;

        SupervisorReport {
            watchers: self.watchers.len(),
            lost: self.lost,
        }
    }

    async fn shutdown(&mut self) {
        info!("Waiting for watchers to stop");
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Watcher task failed during shutdown");
            }
        }
        info!("All watchers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use url::Url;

    use crate::metrics::MetricsCollector;
    use crate::watcher::source::FetchedManifest;

    struct StaticSource;

    #[async_trait]
    impl ManifestSource for StaticSource {
        async fn fetch(&self, _url: &Url) -> crate::Result<FetchedManifest> {
            Ok(FetchedManifest {
                status: 200,
                body: Bytes::from_static(br#"<MPD><Period id="3"/></MPD>"#),
            })
        }
    }

    /// Panics on every fetch of `broken`, serves a manifest otherwise.
    #[derive(Default)]
    struct PanickingSource {
        broken_fetches: AtomicUsize,
    }

    #[async_trait]
    impl ManifestSource for PanickingSource {
        async fn fetch(&self, url: &Url) -> crate::Result<FetchedManifest> {
            if url.path() == "/broken.mpd" {
                self.broken_fetches.fetch_add(1, Ordering::SeqCst);
                panic!("origin handler blew up");
            }
            StaticSource.fetch(url).await
        }
    }

    fn endpoints(aliases: &[&str]) -> Vec<Endpoint> {
        aliases
            .iter()
            .map(|a| Endpoint::new(*a, Url::parse(&format!("http://origin/{a}.mpd")).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_sets_info_and_spawns_one_watcher_per_endpoint() {
        let collector = Arc::new(MetricsCollector::new());
        let token = CancellationToken::new();
        let supervisor = WatcherSupervisor::new(
            endpoints(&["a", "b"]),
            Arc::new(StaticSource),
            collector.clone(),
            None,
            Duration::from_millis(10),
            token.clone(),
        );

        assert_eq!(supervisor.watchers().len(), 2);
        let info = collector.snapshot().info;
        assert_eq!(info.get("a").map(String::as_str), Some("http://origin/a.mpd"));
        assert_eq!(info.get("b").map(String::as_str), Some("http://origin/b.mpd"));

        let run = tokio::spawn(supervisor.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        let report = run.await.unwrap();

        assert_eq!(report.watchers, 2);
        assert_eq!(report.lost, 0);
        assert_eq!(collector.manifest_gauges("a").unwrap().last_period, 3);
        assert_eq!(collector.manifest_gauges("b").unwrap().last_period, 3);
    }

    #[tokio::test]
    async fn test_panicking_endpoint_keeps_polling() {
        let collector = Arc::new(MetricsCollector::new());
        let source = Arc::new(PanickingSource::default());
        let token = CancellationToken::new();
        let supervisor = WatcherSupervisor::new(
            endpoints(&["broken", "healthy"]),
            source.clone(),
            collector.clone(),
            None,
            Duration::from_millis(10),
            token.clone(),
        );

        let run = tokio::spawn(supervisor.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        let report = run.await.unwrap();

        assert_eq!(report, SupervisorReport { watchers: 2, lost: 0 });
        // The broken watcher survived its first panic and polled again.
        assert!(source.broken_fetches.load(Ordering::SeqCst) >= 2);
        assert!(collector.published_periods("broken").is_none());
        assert_eq!(collector.manifest_gauges("healthy").unwrap().last_period, 3);
    }
}
