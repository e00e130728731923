//! Published configuration document
//!
//! The document is the dynamic configuration handed to the host: a full
//! routing envelope whose only populated entries are IP whitelist
//! middlewares, one per configured source, written for both HTTP and TCP.
//!
//! ```text
//! {
//!   "http": { "routers": {}, "services": {}, "middlewares": { "<rule>": { "ipWhiteList": { "sourceRange": [...], "ipStrategy": {...} } } }, "serversTransports": {} },
//!   "tcp":  { "routers": {}, "services": {}, "middlewares": { "<rule>": { "ipWhiteList": { "sourceRange": [...] } } } },
//!   "tls":  { "stores": {}, "options": {} },
//!   "udp":  { "routers": {}, "services": {} }
//! }
//! ```
//!
//! Sections this crate does not write are opaque JSON values. All maps are
//! ordered, so serializing equal documents yields identical bytes.

pub mod builder;

pub use builder::{BuildOutput, DocumentBuilder, Resolution, SourceOutcome, SourceResolution};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::IpStrategy;
use crate::error::Result;

/// Map of entries the provider never populates
pub type OpaqueSection = BTreeMap<String, serde_json::Value>;

/// A complete dynamic configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    pub http: HttpConfiguration,
    pub tcp: TcpConfiguration,
    pub tls: TlsConfiguration,
    pub udp: UdpConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfiguration {
    pub routers: OpaqueSection,
    pub services: OpaqueSection,
    pub middlewares: BTreeMap<String, Middleware>,
    pub servers_transports: OpaqueSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpConfiguration {
    pub routers: OpaqueSection,
    pub services: OpaqueSection,
    pub middlewares: BTreeMap<String, TcpMiddleware>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsConfiguration {
    pub stores: OpaqueSection,
    pub options: OpaqueSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UdpConfiguration {
    pub routers: OpaqueSection,
    pub services: OpaqueSection,
}

/// HTTP middleware holding a whitelist rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Middleware {
    pub ip_white_list: IpWhiteList,
}

/// HTTP whitelist rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpWhiteList {
    /// Allowed addresses and CIDR blocks
    pub source_range: Vec<String>,
    /// How the client address is determined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_strategy: Option<IpStrategy>,
}

/// TCP middleware holding a whitelist rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpMiddleware {
    pub ip_white_list: TcpIpWhiteList,
}

/// TCP whitelist rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpIpWhiteList {
    pub source_range: Vec<String>,
}

impl ConfigurationDocument {
    /// Create an empty envelope
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the whitelist rule `name` into the HTTP and TCP middlewares
    pub fn insert_whitelist(
        &mut self,
        name: impl Into<String>,
        source_range: Vec<String>,
        ip_strategy: Option<IpStrategy>,
    ) {
        let name = name.into();

        self.tcp.middlewares.insert(
            name.clone(),
            TcpMiddleware {
                ip_white_list: TcpIpWhiteList {
                    source_range: source_range.clone(),
                },
            },
        );

        self.http.middlewares.insert(
            name,
            Middleware {
                ip_white_list: IpWhiteList {
                    source_range,
                    ip_strategy,
                },
            },
        );
    }

    /// HTTP whitelist rule `name`, if present
    pub fn whitelist(&self, name: &str) -> Option<&IpWhiteList> {
        self.http
            .middlewares
            .get(name)
            .map(|middleware| &middleware.ip_white_list)
    }

    /// Serialize to the JSON payload handed to the host
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document previously written with [`Self::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
