//! Source descriptors and their fetch-normalize step
//!
//! A source is a rule name plus what to fetch for it. Resolving a source
//! performs its fetches through a [`Fetcher`] and normalizes the bodies into
//! a [`NormalizedAddressSet`]. Any failure fails the whole source.

use tracing::debug;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::normalize::{self, NormalizedAddressSet};
use crate::traits::Fetcher;

/// What to fetch for a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTarget {
    /// Public address via resolver endpoints
    PublicIp {
        ipv4_resolver: String,
        /// Present when the IPv6 /64 block is whitelisted too
        ipv6_resolver: Option<String>,
    },
    /// Newline-delimited hosted list
    HostedList { url: String },
}

/// A named source polled each cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Rule name in the published document
    pub key: String,
    pub target: SourceTarget,
}

impl From<&SourceConfig> for SourceDescriptor {
    fn from(config: &SourceConfig) -> Self {
        match config {
            SourceConfig::PublicIp {
                name,
                ipv4_resolver,
                ipv6_resolver,
                whitelist_ipv6,
            } => SourceDescriptor {
                key: name.clone(),
                target: SourceTarget::PublicIp {
                    ipv4_resolver: ipv4_resolver.clone(),
                    ipv6_resolver: whitelist_ipv6.then(|| ipv6_resolver.clone()),
                },
            },
            SourceConfig::HostedList { name, url } => SourceDescriptor {
                key: name.clone(),
                target: SourceTarget::HostedList { url: url.clone() },
            },
        }
    }
}

impl SourceDescriptor {
    /// Fetch and normalize this source
    pub async fn resolve(&self, fetcher: &dyn Fetcher) -> Result<NormalizedAddressSet> {
        match &self.target {
            SourceTarget::PublicIp {
                ipv4_resolver,
                ipv6_resolver,
            } => {
                let mut addresses = NormalizedAddressSet::new();

                let body = fetch_text(fetcher, ipv4_resolver).await?;
                addresses.insert(normalize::validate_address(&body)?);

                if let Some(ipv6_resolver) = ipv6_resolver {
                    let body = fetch_text(fetcher, ipv6_resolver).await?;
                    match normalize::ipv6_block(&body)? {
                        Some(block) => {
                            addresses.insert(block);
                        }
                        None => debug!(
                            "IPv6 resolver for {} answered with IPv4, no IPv6 block",
                            self.key
                        ),
                    }
                }

                debug!("Resolved public address for {}: {:?}", self.key, addresses);
                Ok(addresses)
            }
            SourceTarget::HostedList { url } => {
                let body = fetch_text(fetcher, url).await?;
                let addresses = normalize::split_list(&body);
                debug!("Fetched {} entries for {}", addresses.len(), self.key);
                Ok(addresses)
            }
        }
    }
}

/// Fetch `target` and return its body, treating non-success statuses as errors
async fn fetch_text(fetcher: &dyn Fetcher, target: &str) -> Result<String> {
    let response = fetcher.fetch(target).await?;
    if !response.is_success() {
        return Err(Error::status(target, response.status));
    }
    Ok(response.text())
}
