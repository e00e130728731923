// # Fetcher Trait
//
// Defines the interface for reading a remote resource (a resolver endpoint
// or a hosted list).
//
// ## Implementations
//
// - HTTP (reqwest): `dynwl-http` crate
// - Test doubles: scripted in-memory fetchers
//
// ## Usage
//
// ```rust,ignore
// use dynwl_core::Fetcher;
//
// let response = fetcher.fetch("https://api.ipify.org?format=text").await?;
// if response.is_success() {
//     println!("{}", response.text());
// }
// ```

use async_trait::async_trait;

/// Raw response of a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Status code reported by the endpoint
    pub status: u16,
    /// Response body, unmodified
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a `200 OK` response
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8 (invalid sequences replaced)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for remote fetch implementations
///
/// A fetch is a single GET of `target`. Implementations perform no retries;
/// the scheduler decides how to react to a failure.
///
/// # Contract
///
/// - Returns `Ok` for any response the endpoint produced, including
///   non-success statuses. Status interpretation belongs to the caller.
/// - Returns `Err(Error::Transport)` when connecting or reading fails.
/// - Releases the underlying connection on every exit path.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `target` once
    async fn fetch(&self, target: &str) -> Result<FetchResponse, crate::Error>;
}
