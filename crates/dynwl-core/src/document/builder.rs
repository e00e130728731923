//! Document assembly with cache fallback
//!
//! For each source, in cycle order:
//! 1. fresh data from this cycle is used and written to the cache
//! 2. otherwise the cached snapshot is republished
//! 3. otherwise the rule is emitted with an empty address list
//!
//! Addresses are never fabricated.

use tracing::{debug, info};

use super::ConfigurationDocument;
use crate::config::IpStrategy;
use crate::error::Error;
use crate::normalize::NormalizedAddressSet;
use crate::state::SnapshotCache;

/// Result of fetching and normalizing one source in the current cycle
#[derive(Debug)]
pub enum SourceOutcome {
    /// Fetch and normalization succeeded
    Fresh(NormalizedAddressSet),
    /// Fetch or normalization failed
    Failed(Error),
}

/// Which data ended up in the document for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Data fetched in this cycle
    Fresh,
    /// Cached data from an earlier cycle
    Stale,
    /// No data has ever been fetched; the rule is empty
    Empty,
}

/// Per-source summary of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResolution {
    pub source: String,
    pub resolution: Resolution,
}

/// A built document and how each source was resolved
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub document: ConfigurationDocument,
    pub resolutions: Vec<SourceResolution>,
}

/// Builds complete configuration documents
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    ip_strategy: Option<IpStrategy>,
}

impl DocumentBuilder {
    /// Create a builder attaching `ip_strategy` to every HTTP rule
    ///
    /// A strategy with zero depth and no excluded IPs is dropped.
    pub fn new(ip_strategy: Option<IpStrategy>) -> Self {
        Self {
            ip_strategy: ip_strategy.filter(|strategy| !strategy.is_empty()),
        }
    }

    /// Build a document from this cycle's outcomes, updating `cache`
    pub fn build<I>(&self, outcomes: I, cache: &mut SnapshotCache) -> BuildOutput
    where
        I: IntoIterator<Item = (String, SourceOutcome)>,
    {
        let mut document = ConfigurationDocument::new();
        let mut resolutions = Vec::new();

        for (source, outcome) in outcomes {
            let (addresses, resolution) = match outcome {
                SourceOutcome::Fresh(addresses) => {
                    cache.put(source.clone(), addresses.clone());
                    (addresses, Resolution::Fresh)
                }
                SourceOutcome::Failed(error) => match cache.get(&source) {
                    Some(snapshot) => {
                        info!(
                            "Serving cached snapshot for {} (age {}s) after: {}",
                            source,
                            snapshot.age().num_seconds(),
                            error
                        );
                        (snapshot.addresses.clone(), Resolution::Stale)
                    }
                    None => {
                        debug!("No snapshot for {} yet, emitting empty rule", source);
                        (NormalizedAddressSet::new(), Resolution::Empty)
                    }
                },
            };

            document.insert_whitelist(
                source.clone(),
                addresses.into_vec(),
                self.ip_strategy.clone(),
            );
            resolutions.push(SourceResolution { source, resolution });
        }

        BuildOutput {
            document,
            resolutions,
        }
    }
}
