//! Core domain types shared by the watchers and the metrics layer.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::Error;

/// A configured manifest endpoint.
///
/// The alias is the primary correlation label across every exported metric,
/// so it must stay unique and stable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub alias: String,
    pub url: Url,
}

impl Endpoint {
    pub fn new(alias: impl Into<String>, url: Url) -> Self {
        Self {
            alias: alias.into(),
            url,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.alias, self.url)
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Parses `alias=url`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (alias, url) = s
            .split_once('=')
            .ok_or_else(|| Error::config(format!("expected alias=url, got `{s}`")))?;

        let alias = alias.trim();
        if alias.is_empty() {
            return Err(Error::config(format!("empty alias in `{s}`")));
        }

        let url = Url::parse(url.trim())
            .map_err(|e| Error::config(format!("invalid URL for `{alias}`: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported scheme `{}` for `{alias}`",
                url.scheme()
            )));
        }

        Ok(Self::new(alias, url))
    }
}

/// Identifies one bitrate ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BillingKey {
    pub endpoint: String,
    pub representation_id: String,
    pub media_type: String,
}

impl BillingKey {
    pub fn new(
        endpoint: impl Into<String>,
        representation_id: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            representation_id: representation_id.into(),
            media_type: media_type.into(),
        }
    }
}

impl fmt::Display for BillingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.endpoint, self.representation_id, self.media_type
        )
    }
}
