//! Configuration types for the whitelist provider
//!
//! This module defines the provider configuration, its defaults and the
//! validation performed once at initialization.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default IPv4 resolver (echoes the caller's public IPv4 as plain text)
pub const DEFAULT_IPV4_RESOLVER: &str = "https://api.ipify.org?format=text";

/// Default IPv6 resolver (echoes the caller's public IPv6 as plain text)
pub const DEFAULT_IPV6_RESOLVER: &str = "https://api64.ipify.org?format=text";

/// Default base URL for hosted lists, the list identifier is appended
pub const DEFAULT_LIST_BASE_URL: &str = "https://wl.portbrella.com/";

/// Default rule name for the public IP whitelist
pub const DEFAULT_PUBLIC_RULE_NAME: &str = "public_ipwhitelist";

/// Main provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Poll interval as a duration string (e.g. "300s", "1m30s")
    pub poll_interval: String,

    /// Data sources, polled in this order every cycle
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Matching strategy passed through into every HTTP whitelist rule
    #[serde(default)]
    pub ip_strategy: Option<IpStrategy>,

    /// Capacity of the provider event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ProviderConfig {
    /// Configuration whitelisting this host's public address
    ///
    /// Polls every 300s with the default resolvers and IPv6 enabled.
    pub fn public_ip() -> Self {
        Self {
            poll_interval: "300s".to_string(),
            sources: vec![SourceConfig::public_ip(DEFAULT_PUBLIC_RULE_NAME)],
            ip_strategy: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Configuration polling hosted allow-lists
    ///
    /// One source per `(rule name, list identifier)` pair, in the given
    /// order. The list URL is `base_url` followed by the identifier.
    pub fn hosted_lists<I, K, V>(base_url: &str, lists: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let sources = lists
            .into_iter()
            .map(|(name, list_id)| SourceConfig::HostedList {
                name: name.into(),
                url: format!("{}{}", base_url, list_id.as_ref()),
            })
            .collect();

        Self {
            poll_interval: "120s".to_string(),
            sources,
            ip_strategy: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: impl Into<String>) -> Self {
        self.poll_interval = interval.into();
        self
    }

    /// Set the matching strategy
    pub fn with_ip_strategy(mut self, strategy: IpStrategy) -> Self {
        self.ip_strategy = Some(strategy);
        self
    }

    /// Append a source
    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Replace all sources
    pub fn with_sources(mut self, sources: Vec<SourceConfig>) -> Self {
        self.sources = sources;
        self
    }

    /// Parse and validate the poll interval
    pub fn interval(&self) -> Result<Duration> {
        let interval = parse_duration(&self.poll_interval)?;
        if interval.is_zero() {
            return Err(Error::config("poll interval must be greater than 0"));
        }
        Ok(interval)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.interval()?;

        if self.sources.is_empty() {
            return Err(Error::config("at least one source must be configured"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !names.insert(source.name()) {
                return Err(Error::config(format!(
                    "duplicate source name: {}",
                    source.name()
                )));
            }
        }

        if self.event_channel_capacity == 0 {
            return Err(Error::config("event channel capacity must be > 0"));
        }

        Ok(())
    }
}

/// Data source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SourceConfig {
    /// Public address of this host, as reported by resolver services
    PublicIp {
        /// Rule name in the published document
        #[serde(default = "default_public_rule_name")]
        name: String,
        /// URL echoing the public IPv4 address
        #[serde(default = "default_ipv4_resolver")]
        ipv4_resolver: String,
        /// URL echoing the public IPv6 address
        #[serde(default = "default_ipv6_resolver")]
        ipv6_resolver: String,
        /// Whether to also whitelist the IPv6 /64 block
        #[serde(
            rename = "whitelistIPv6",
            alias = "whitelistIpv6",
            default = "default_whitelist_ipv6"
        )]
        whitelist_ipv6: bool,
    },

    /// Newline-delimited allow-list hosted by a third party
    HostedList {
        /// Rule name in the published document
        name: String,
        /// URL of the list
        url: String,
    },
}

impl SourceConfig {
    /// Public IP source with default resolvers
    pub fn public_ip(name: impl Into<String>) -> Self {
        SourceConfig::PublicIp {
            name: name.into(),
            ipv4_resolver: default_ipv4_resolver(),
            ipv6_resolver: default_ipv6_resolver(),
            whitelist_ipv6: default_whitelist_ipv6(),
        }
    }

    /// Hosted list source
    pub fn hosted_list(name: impl Into<String>, url: impl Into<String>) -> Self {
        SourceConfig::HostedList {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Rule name of this source
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::PublicIp { name, .. } | SourceConfig::HostedList { name, .. } => name,
        }
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<()> {
        if self.name().is_empty() {
            return Err(Error::config("source name cannot be empty"));
        }

        match self {
            SourceConfig::PublicIp {
                name,
                ipv4_resolver,
                ipv6_resolver,
                whitelist_ipv6,
            } => {
                if ipv4_resolver.is_empty() {
                    return Err(Error::config(format!(
                        "source {}: IPv4 resolver cannot be empty",
                        name
                    )));
                }
                if *whitelist_ipv6 && ipv6_resolver.is_empty() {
                    return Err(Error::config(format!(
                        "source {}: IPv6 resolver cannot be empty when IPv6 is whitelisted",
                        name
                    )));
                }
                Ok(())
            }
            SourceConfig::HostedList { name, url } => {
                if url.is_empty() {
                    return Err(Error::config(format!("source {}: URL cannot be empty", name)));
                }
                Ok(())
            }
        }
    }
}

/// How the host determines the client address when matching the whitelist
///
/// Passed through unmodified into the published document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpStrategy {
    /// Number of trusted proxy hops
    #[serde(default, skip_serializing_if = "is_zero")]
    pub depth: u32,

    /// Addresses never treated as the client address
    #[serde(rename = "excludedIPs", default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_ips: Vec<String>,
}

impl IpStrategy {
    /// Create a strategy
    pub fn new(depth: u32, excluded_ips: Vec<String>) -> Self {
        Self { depth, excluded_ips }
    }

    /// Whether this strategy carries no information
    pub fn is_empty(&self) -> bool {
        self.depth == 0 && self.excluded_ips.is_empty()
    }
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn default_public_rule_name() -> String {
    DEFAULT_PUBLIC_RULE_NAME.to_string()
}

fn default_ipv4_resolver() -> String {
    DEFAULT_IPV4_RESOLVER.to_string()
}

fn default_ipv6_resolver() -> String {
    DEFAULT_IPV6_RESOLVER.to_string()
}

fn default_whitelist_ipv6() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    64
}

/// Parse a duration string such as "300s", "1m30s", "1.5h" or "250ms"
///
/// Accepted units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is
/// accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::config(format!("invalid duration: {:?}", input));

    let mut rest = input.trim();
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    } else if rest.starts_with('-') {
        return Err(Error::config(format!(
            "poll interval must be greater than 0, got {:?}",
            input
        )));
    }

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_secs = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total_secs += value * scale;
    }

    Duration::try_from_secs_f64(total_secs).map_err(|_| invalid())
}
