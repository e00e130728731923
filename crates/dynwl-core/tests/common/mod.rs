//! Test doubles and common utilities for provider contract tests
//!
//! This module provides a scripted fetcher that answers from in-memory
//! scripts instead of the network.

#![allow(dead_code)]

use dynwl_core::error::{Error, Result};
use dynwl_core::traits::{FetchResponse, Fetcher};
use dynwl_core::{ConfigurationDocument, Provider, ProviderConfig, ProviderEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with a status and body
    Respond(u16, &'static str),
    /// Fail at the transport level
    Refuse,
    /// Panic inside the fetch
    Panic,
}

/// A fetcher replaying per-target scripts
///
/// Each target has a queue of replies; the last reply repeats forever.
/// Unknown targets are refused.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    scripts: Arc<std::sync::Mutex<HashMap<String, VecDeque<Reply>>>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Script the replies for `target`
    pub fn script(self, target: &str, replies: &[Reply]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(target.to_string(), replies.iter().cloned().collect());
        self
    }

    /// Total number of fetches started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, target: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(target) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Refuse),
            None => Reply::Refuse,
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, target: &str) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.next_reply(target);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Respond(status, body) => Ok(FetchResponse::new(status, body)),
            Reply::Refuse => Err(Error::transport(format!("connection refused: {}", target))),
            Reply::Panic => panic!("scripted panic fetching {}", target),
        }
    }
}

/// Hosted-list config polling every `interval`
pub fn lists_config(interval: &str, lists: &[(&str, &str)]) -> ProviderConfig {
    ProviderConfig::hosted_lists("http://lists.test/", lists.iter().copied())
        .with_poll_interval(interval)
}

/// Create and start a provider, returning its document and event receivers
pub fn start_provider(
    config: ProviderConfig,
    fetcher: &ScriptedFetcher,
    output_capacity: usize,
) -> (
    Provider,
    mpsc::Receiver<ConfigurationDocument>,
    mpsc::Receiver<ProviderEvent>,
) {
    let (mut provider, events) = Provider::new("test", config, Arc::new(fetcher.clone()))
        .expect("provider construction succeeds");
    let (tx, rx) = mpsc::channel(output_capacity);
    provider.start(tx).expect("provider starts");
    (provider, rx, events)
}

/// Receive the next document, failing the test after `within`
pub async fn next_document(
    rx: &mut mpsc::Receiver<ConfigurationDocument>,
    within: Duration,
) -> ConfigurationDocument {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("document published in time")
        .expect("output channel open")
}

/// Source range of rule `name` in `document`
pub fn source_range(document: &ConfigurationDocument, name: &str) -> Vec<String> {
    document
        .whitelist(name)
        .unwrap_or_else(|| panic!("rule {} present", name))
        .source_range
        .clone()
}

/// Drain events until `Stopped`, returning everything received
pub async fn events_until_stopped(events: &mut mpsc::Receiver<ProviderEvent>) -> Vec<ProviderEvent> {
    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        let stopped = matches!(event, ProviderEvent::Stopped { .. });
        received.push(event);
        if stopped {
            break;
        }
    }
    received
}
