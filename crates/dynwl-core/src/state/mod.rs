// # Snapshot State
//
// Per-source state kept by the polling worker for the lifetime of a
// provider.

pub mod snapshot;

pub use snapshot::{CachedSnapshot, SnapshotCache};
