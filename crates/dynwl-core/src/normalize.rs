//! Address and list normalization
//!
//! Turns raw fetched bodies into whitelist entries:
//! - resolver bodies are validated as IP literals
//! - IPv6 host addresses are reduced to their /64 block
//! - hosted list bodies are split into one entry per nonempty line

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv6Addr};

use crate::error::{Error, Result};

/// Prefix length used when whitelisting an IPv6 host
///
/// Providers hand out /64 blocks and rotate the low 64 bits, so the block is
/// the stable unit.
pub const IPV6_PREFIX_LEN: u8 = 64;

/// Ordered set of address or CIDR strings for one source
///
/// Insertion order is preserved and duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct NormalizedAddressSet {
    entries: Vec<String>,
    seen: HashSet<String>,
}

impl NormalizedAddressSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless it is already present
    ///
    /// Returns whether the entry was added.
    pub fn insert(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if !self.seen.insert(entry.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Entries in insertion order
    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }
}

impl From<Vec<String>> for NormalizedAddressSet {
    fn from(entries: Vec<String>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<NormalizedAddressSet> for Vec<String> {
    fn from(set: NormalizedAddressSet) -> Self {
        set.entries
    }
}

impl<S: Into<String>> FromIterator<S> for NormalizedAddressSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

/// Validate a resolver body as a single IPv4 or IPv6 literal
///
/// Surrounding whitespace is ignored; the literal itself is returned as
/// received.
pub fn validate_address(body: &str) -> Result<String> {
    let literal = body.trim();
    literal
        .parse::<IpAddr>()
        .map_err(|_| Error::malformed(format!("not an IP address: {:?}", literal)))?;
    Ok(literal.to_string())
}

/// Reduce an IPv6 literal to its /64 network block, e.g. `2001:db8::/64`
pub fn ipv6_to_cidr(body: &str) -> Result<String> {
    let literal = body.trim();
    let addr: Ipv6Addr = literal
        .parse()
        .map_err(|_| Error::malformed(format!("not an IPv6 address: {:?}", literal)))?;

    let mask = u128::MAX << (128 - u32::from(IPV6_PREFIX_LEN));
    let network = Ipv6Addr::from(u128::from(addr) & mask);

    Ok(format!("{}/{}", network, IPV6_PREFIX_LEN))
}

/// Reduce an IPv6 resolver body to its /64 block
///
/// An IPv4 literal means the host has no IPv6 connectivity and yields
/// `None`. Anything that is not an IP address is malformed.
pub fn ipv6_block(body: &str) -> Result<Option<String>> {
    match body.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => Ok(None),
        Ok(IpAddr::V6(_)) => ipv6_to_cidr(body).map(Some),
        Err(_) => Err(Error::malformed(format!(
            "not an IP address: {:?}",
            body.trim()
        ))),
    }
}

/// Split a hosted list body into its nonempty lines
///
/// Entries are trimmed but otherwise taken verbatim; the list service is
/// trusted.
pub fn split_list(body: &str) -> NormalizedAddressSet {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
