// # dynwl-core
//
// Core library for the dynamic IP whitelist configuration provider.
//
// ## Architecture Overview
//
// A provider periodically derives IP whitelist rules from slowly-changing
// remote data and publishes each snapshot to a host over a channel:
// - **Fetcher**: Trait for reading a remote resource once
// - **normalize**: IP validation, IPv6 /64 reduction, list splitting
// - **SnapshotCache**: Last good data per source, used as fallback
// - **DocumentBuilder**: Assembles complete configuration documents
// - **PollingScheduler**: The single worker running fetch → build → publish cycles
// - **Provider**: Public lifecycle (validate, start, stop)
//
// ## Design Principles
//
// 1. **Graceful Degradation**: A failed fetch republishes cached data, never aborts
// 2. **Single Worker**: One task per provider owns all cycle state, no locks
// 3. **Explicit Cancellation**: Each provider owns its cancellation token
// 4. **Complete Documents**: Every publish is a full, self-contained document

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod source;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{IpStrategy, ProviderConfig, SourceConfig};
pub use document::{ConfigurationDocument, DocumentBuilder};
pub use engine::{Fallback, PollingScheduler, ProviderEvent};
pub use error::{Error, Result};
pub use normalize::NormalizedAddressSet;
pub use provider::{Provider, ProviderState};
pub use source::{SourceDescriptor, SourceTarget};
pub use state::SnapshotCache;
pub use traits::{FetchResponse, Fetcher};
