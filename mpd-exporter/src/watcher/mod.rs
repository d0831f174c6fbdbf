//! Manifest watchers.
//!
//! One [`EndpointWatcher`] per configured endpoint polls its manifest on a
//! fixed interval, publishes structural gauges, and optionally bills newly
//! appeared segments through the [`SegmentAccountant`]. The
//! [`WatcherSupervisor`] owns the watcher tasks.

mod bitrate;
mod extract;
mod ledger;
mod source;
mod supervisor;
mod worker;

pub use bitrate::{AccountReport, SegmentAccountant, TimelineSegment, unwind};
pub use extract::extract;
pub use ledger::{BillingLedgerStore, InMemoryLedger};
pub use source::{
    FetchedManifest, HttpClient, ManifestSource, SegmentProbe, build_client,
    install_rustls_provider,
};
pub use supervisor::{SupervisorReport, WatcherSupervisor};
pub use worker::{CycleOutcome, EndpointWatcher, TRANSPORT_ERROR_STATUS, WatcherState};
