// # HTTP Fetcher
//
// This crate provides the reqwest-backed `Fetcher` for the whitelist
// provider.
//
// ## Behavior
//
// - One plain GET per fetch, no retries, no custom headers (not even a
//   user agent)
// - Any response is returned as-is, including non-success statuses; status
//   interpretation belongs to the provider
// - Connect and read failures map to `Error::Transport`
// - No request timeout unless one is configured with `with_timeout`
//
// The response body is read to completion on every successful request, and
// the response (with its connection) is released when it goes out of scope.

use dynwl_core::config::ProviderConfig;
use dynwl_core::engine::ProviderEvent;
use dynwl_core::traits::{FetchResponse, Fetcher};
use dynwl_core::{Error, Provider, Result};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

/// HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// HTTP client
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the transport's default timeouts
    pub fn new() -> Result<Self> {
        Self::build(reqwest::Client::builder())
    }

    /// Create a fetcher aborting requests after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::build(reqwest::Client::builder().timeout(timeout))
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(builder: reqwest::ClientBuilder) -> Result<Self> {
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &str) -> Result<FetchResponse> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| Error::transport(format!("Request to {} failed: {}", target, e)))?;

        let status = response.status().as_u16();

        let body = response.bytes().await.map_err(|e| {
            Error::transport(format!("Failed to read response from {}: {}", target, e))
        })?;

        tracing::debug!("GET {} -> {} ({} bytes)", target, status, body.len());

        Ok(FetchResponse::new(status, body.to_vec()))
    }
}

/// Create a provider fetching over HTTP
///
/// # Returns
///
/// A tuple of (provider, event_receiver), as [`Provider::new`].
pub fn http_provider(
    name: impl Into<String>,
    config: ProviderConfig,
) -> Result<(Provider, mpsc::Receiver<ProviderEvent>)> {
    let fetcher = HttpFetcher::new()?;
    Provider::new(name, config, Arc::new(fetcher))
}
