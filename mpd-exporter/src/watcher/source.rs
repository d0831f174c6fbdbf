//! Network seams of a watcher: manifest retrieval and segment size probing.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_LENGTH;
use tracing::{debug, warn};
use url::Url;

use crate::{Error, Result};

/// A fetched manifest body with the HTTP status it came with.
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub status: u16,
    pub body: Bytes,
}

impl FetchedManifest {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Retrieves manifest documents.
#[async_trait]
pub trait ManifestSource: Send + Sync + 'static {
    /// Fetch the manifest at `url`.
    ///
    /// Any HTTP response, including error statuses, is returned as `Ok`;
    /// `Err` means no response was received at all.
    async fn fetch(&self, url: &Url) -> Result<FetchedManifest>;
}

/// Reads the byte length of a media segment without downloading it.
#[async_trait]
pub trait SegmentProbe: Send + Sync + 'static {
    async fn content_length(&self, url: &Url) -> Result<u64>;
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the shared `reqwest::Client` used for manifests and segment probes.
pub fn build_client(request_timeout: Duration) -> reqwest::Client {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("mpd-exporter/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(4);

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    builder.build().unwrap_or_else(|error| {
        warn!(
            error = %error,
            "Failed to create configured HTTP client; falling back to reqwest defaults"
        );
        reqwest::Client::new()
    })
}

/// `reqwest`-backed implementation of both network seams.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(request_timeout: Duration) -> Self {
        Self::with_client(build_client(request_timeout))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestSource for HttpClient {
    async fn fetch(&self, url: &Url) -> Result<FetchedManifest> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::transport(url.as_str(), e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(url.as_str(), e))?;

        debug!(url = %url, status, bytes = body.len(), "Fetched manifest");
        Ok(FetchedManifest { status, body })
    }
}

#[async_trait]
impl SegmentProbe for HttpClient {
    async fn content_length(&self, url: &Url) -> Result<u64> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| Error::transport(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(status.as_u16(), url.as_str()));
        }

        // `Response::content_length` reports the body size, which is 0 for HEAD.
        parse_content_length(
            response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok()),
        )
        .ok_or_else(|| Error::accounting(url.as_str(), "missing or invalid Content-Length"))
    }
}

fn parse_content_length(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}
