use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mpd_exporter::config::ExporterConfig;
use mpd_exporter::metrics::{MetricsCollector, PrometheusExporter};
use mpd_exporter::server::{self, AppState};
use mpd_exporter::watcher::{HttpClient, InMemoryLedger, SegmentAccountant, WatcherSupervisor};
use mpd_exporter::{logging, panic_hook};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let config = ExporterConfig::parse();
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;
    panic_hook::install();

    config.validate().context("Invalid configuration")?;

    let collector = Arc::new(MetricsCollector::new());
    let http = Arc::new(HttpClient::new(config.request_timeout()));
    let cancel_token = CancellationToken::new();

    let accountant = config.bitrate_metrics.then(|| {
        Arc::new(SegmentAccountant::new(
            Arc::new(InMemoryLedger::new()),
            http.clone(),
            collector.clone(),
        ))
    });

    for endpoint in &config.mpd_hosts {
        info!(mpd = %endpoint.alias, url = %endpoint.url, "Initializing watcher");
    }

    let supervisor = WatcherSupervisor::new(
        config.mpd_hosts.clone(),
        http,
        collector.clone(),
        accountant,
        config.poll_interval(),
        cancel_token.child_token(),
    );
    let supervisor_task = tokio::spawn(supervisor.run());

    tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, shutting down");
                    cancel_token.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        }
    });

    let state = AppState {
        exporter: Arc::new(PrometheusExporter::new(collector)),
    };
    let served = server::serve(&config.server_config(), state, cancel_token.clone()).await;

    // Stop the watchers whether the server ended cleanly or not.
    cancel_token.cancel();
    let report = supervisor_task.await.context("Watcher supervisor panicked")?;
    info!(
        watchers = report.watchers,
        lost = report.lost,
        "Shutdown complete"
    );

    served.context("Metrics server failed")?;
    Ok(())
}
