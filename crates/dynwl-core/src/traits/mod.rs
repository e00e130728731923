//! Core traits for the whitelist provider
//!
//! This module defines the abstract interfaces that implementations plug into.
//!
//! - [`Fetcher`]: Read a remote resource once

pub mod fetcher;

pub use fetcher::{FetchResponse, Fetcher};
