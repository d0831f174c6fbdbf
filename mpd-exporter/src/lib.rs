//! Prometheus exporter for MPEG-DASH manifests.
//!
//! Polls configured MPD endpoints, exports their structure (periods,
//! adaptation sets, representations) and optionally the cumulative byte size
//! of the media segments they announce.

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod panic_hook;
pub mod server;
pub mod watcher;

pub use error::{Error, Result};
