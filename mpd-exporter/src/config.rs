//! Command line and environment configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::builder::BoolishValueParser;

use crate::domain::Endpoint;
use crate::server::ServerConfig;
use crate::{Error, Result};

/// Prometheus exporter for MPEG-DASH manifests.
///
/// Every option can also be set through the environment variable named in
/// its help text; `.env` files are read at startup.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ExporterConfig {
    /// Manifests to watch, as a comma separated list of `alias=url`
    #[arg(long, env = "MPD_HOSTS", value_delimiter = ',', required = true)]
    pub mpd_hosts: Vec<Endpoint>,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8888)]
    pub port: u16,

    /// Address to bind the metrics server to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Bill the byte size of new media segments
    #[arg(long, env = "BITRATE_METRICS", value_parser = BoolishValueParser::new())]
    pub bitrate_metrics: bool,

    /// Seconds to wait between two polls of the same manifest
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 2)]
    pub poll_interval_secs: u64,

    /// Timeout for manifest and segment requests, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl ExporterConfig {
    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.mpd_hosts.is_empty() {
            return Err(Error::config(
                "No MPD hosts provided, set --mpd-hosts with at least one alias=url",
            ));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.mpd_hosts {
            if !seen.insert(endpoint.alias.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate MPD alias `{}`",
                    endpoint.alias
                )));
            }
        }

        if self.poll_interval_secs == 0 {
            return Err(Error::config("Poll interval must be at least 1 second"));
        }

        self.server_config().socket_addr()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_address: self.bind_address.clone(),
            port: self.port,
        }
    }
}
