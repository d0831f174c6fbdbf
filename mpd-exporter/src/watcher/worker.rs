//! Per-endpoint polling loop.
//!
//! A watcher runs one cycle at a time: fetch, parse, extract, publish and
//! optionally account, then sleeps for the fixed poll interval. A failed or
//! panicking cycle is logged and the loop carries on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::Endpoint;
use crate::metrics::MetricsSink;
use crate::{Error, Result};

use super::bitrate::{AccountReport, SegmentAccountant};
use super::extract::extract;
use super::source::ManifestSource;

/// Status label recorded when a fetch produced no HTTP response.
pub const TRANSPORT_ERROR_STATUS: &str = "error";

/// Current step of a watcher's cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatcherState {
    Idle = 0,
    Fetching,
    Parsing,
    Extracting,
    Publishing,
    Accounting,
    Sleeping,
    Stopped,
}

impl WatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fetching,
            2 => Self::Parsing,
            3 => Self::Extracting,
            4 => Self::Publishing,
            5 => Self::Accounting,
            6 => Self::Sleeping,
            7 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Extracting => "extracting",
            Self::Publishing => "publishing",
            Self::Accounting => "accounting",
            Self::Sleeping => "sleeping",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for WatcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub periods: usize,
    pub accounting: Option<AccountReport>,
}

/// Polls one manifest endpoint for the lifetime of the process.
pub struct EndpointWatcher {
    endpoint: Endpoint,
    source: Arc<dyn ManifestSource>,
    sink: Arc<dyn MetricsSink>,
    accountant: Option<Arc<SegmentAccountant>>,
    interval: Duration,
    state: AtomicU8,
    cancellation_token: CancellationToken,
}

impl EndpointWatcher {
    pub fn new(
        endpoint: Endpoint,
        source: Arc<dyn ManifestSource>,
        sink: Arc<dyn MetricsSink>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            source,
            sink,
            accountant: None,
            interval,
            state: AtomicU8::new(WatcherState::Idle as u8),
            cancellation_token,
        }
    }

    /// Enable bitrate accounting.
    pub fn with_accountant(mut self, accountant: Arc<SegmentAccountant>) -> Self {
        self.accountant = Some(accountant);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn alias(&self) -> &str {
        &self.endpoint.alias
    }

    pub fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: WatcherState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Run cycles until cancelled.
    pub async fn run(&self) {
        info!(mpd = %self.alias(), url = %self.endpoint.url, "Watcher started");

        while !self.cancellation_token.is_cancelled() {
            match self.guarded_cycle().await {
                Ok(outcome) => {
                    debug!(
                        mpd = %self.alias(),
                        periods = outcome.periods,
                        accounting = ?outcome.accounting,
                        "Cycle completed"
                    );
                }
                Err(Error::Cancelled) => break,
                Err(e) => {
                    warn!(mpd = %self.alias(), kind = e.kind(), error = %e, "Cycle failed");
                }
            }

            self.set_state(WatcherState::Sleeping);
            tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.set_state(WatcherState::Stopped);
        info!(mpd = %self.alias(), "Watcher stopped");
    }

    /// One cycle with panics turned into [`Error::UnexpectedFault`].
    pub async fn guarded_cycle(&self) -> Result<CycleOutcome> {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(Error::UnexpectedFault(panic_message(panic.as_ref()))),
        }
    }

    /// Fetch, parse, extract, publish and optionally account, once.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let alias = self.alias();
        let url = &self.endpoint.url;

        self.set_state(WatcherState::Fetching);
        let fetched = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => return Err(Error::Cancelled),
            result = self.source.fetch(url) => result,
        };
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.sink.record_fetch_status(alias, TRANSPORT_ERROR_STATUS);
                return Err(e);
            }
        };

        self.sink
            .record_fetch_status(alias, &fetched.status.to_string());
        if !fetched.is_success() {
            return Err(Error::http_status(fetched.status, url.as_str()));
        }

        self.set_state(WatcherState::Parsing);
        let manifest = mpd::parse(&fetched.body)?;

        self.set_state(WatcherState::Extracting);
        let (gauges, registry) = extract(&manifest, alias);

        self.set_state(WatcherState::Publishing);
        self.sink.set_manifest_gauges(alias, gauges);
        self.sink.publish_periods(alias, registry);

        let mut outcome = CycleOutcome {
            periods: manifest.periods.len(),
            accounting: None,
        };

        if let Some(accountant) = &self.accountant {
            self.set_state(WatcherState::Accounting);
            // The structural snapshot stays published whatever happens here.
            match accountant
                .collect(&manifest, alias, url, &self.cancellation_token)
                .await
            {
                Ok(report) => outcome.accounting = Some(report),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => warn!(mpd = %alias, error = %e, "Bitrate accounting failed"),
            }
        }

        Ok(outcome)
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
