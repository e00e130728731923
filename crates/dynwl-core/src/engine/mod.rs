//! Polling scheduler
//!
//! The scheduler is the single worker behind a provider. It owns the timer,
//! the snapshot cache and the output channel, and runs one cycle per tick:
//!
//! ```text
//!   tick ──► fetch + normalize (each source, in order)
//!                      │
//!                      ▼
//!            build (fresh │ cached │ empty)  ◄──► SnapshotCache
//!                      │
//!                      ▼
//!            publish ──► output channel (host)
//! ```
//!
//! ## Timing
//!
//! - The first cycle runs immediately, not after one interval
//! - Cycles never overlap; ticks missed while a cycle runs are skipped
//!
//! ## Cancellation
//!
//! The cancellation token is observed while waiting for the next tick and
//! while handing a document to the host. A cycle's fetches run to
//! completion, and a document built after cancellation is never published.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::document::{ConfigurationDocument, DocumentBuilder, Resolution, SourceOutcome};
use crate::error::{Error, Result};
use crate::source::SourceDescriptor;
use crate::state::SnapshotCache;
use crate::traits::Fetcher;

/// Events emitted by a running provider
///
/// Fetch failures never reach the host through the document stream; they
/// are reported here while stale or empty data keeps being published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Worker started
    Started {
        sources: usize,
    },

    /// A source could not be fetched in this cycle
    SourceFailed {
        source: String,
        error: String,
        fallback: Fallback,
    },

    /// A document was handed to the host
    Published {
        cycle: u64,
    },

    /// Worker stopped
    Stopped {
        reason: String,
    },
}

/// Data published in place of a failed source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// The last good snapshot
    Stale,
    /// Nothing, the source never succeeded
    Empty,
}

/// Cloneable sender for provider events
///
/// Sending never blocks the worker: when the channel is full the event is
/// dropped and a warning is logged.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ProviderEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<ProviderEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: ProviderEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping event {:?}. Consider increasing event_channel_capacity.",
                    event
                );
            }
            // Nobody is listening, which is fine
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// The cycle loop of one provider
pub struct PollingScheduler {
    /// Provider name, for logs
    name: String,

    /// Sources in cycle order
    sources: Vec<SourceDescriptor>,

    /// Remote fetcher
    fetcher: Arc<dyn Fetcher>,

    /// Last good data per source
    cache: SnapshotCache,

    /// Document assembly
    builder: DocumentBuilder,

    /// Time between cycle starts
    poll_interval: Duration,

    /// Host-owned document channel
    output: mpsc::Sender<ConfigurationDocument>,

    /// Side channel for failures and lifecycle events
    events: EventSender,

    /// Stop signal from the owning provider
    cancel: CancellationToken,

    /// Number of cycles completed
    cycle: u64,
}

impl PollingScheduler {
    /// Create a scheduler
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        sources: Vec<SourceDescriptor>,
        fetcher: Arc<dyn Fetcher>,
        builder: DocumentBuilder,
        poll_interval: Duration,
        output: mpsc::Sender<ConfigurationDocument>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            fetcher,
            cache: SnapshotCache::new(),
            builder,
            poll_interval,
            output,
            events,
            cancel,
            cycle: 0,
        }
    }

    /// Run cycles until cancelled
    ///
    /// # Returns
    ///
    /// - `Ok(())`: cancelled
    /// - `Err(Error::OutputClosed)`: the host dropped the output receiver
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Provider {} polling {} source(s) every {:?}",
            self.name,
            self.sources.len(),
            self.poll_interval
        );
        self.events.emit(ProviderEvent::Started {
            sources: self.sources.len(),
        });

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Provider {} cancelled while idle", self.name);
                    return Ok(());
                }

                _ = ticker.tick() => {}
            }

            let document = self.run_cycle().await;

            if !self.publish(document).await? {
                debug!("Provider {} cancelled before publishing", self.name);
                return Ok(());
            }
        }
    }

    /// Fetch, normalize and build one document
    pub async fn run_cycle(&mut self) -> ConfigurationDocument {
        let mut outcomes = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let outcome = match source.resolve(self.fetcher.as_ref()).await {
                Ok(addresses) => SourceOutcome::Fresh(addresses),
                Err(e) => {
                    if e.is_fetch_failure() {
                        warn!("Provider {}: source {} failed: {}", self.name, source.key, e);
                    } else {
                        error!("Provider {}: source {} failed unexpectedly: {}", self.name, source.key, e);
                    }
                    SourceOutcome::Failed(e)
                }
            };
            outcomes.push((source.key.clone(), outcome));
        }

        let failures: Vec<(String, String)> = outcomes
            .iter()
            .filter_map(|(key, outcome)| match outcome {
                SourceOutcome::Failed(e) => Some((key.clone(), e.to_string())),
                SourceOutcome::Fresh(_) => None,
            })
            .collect();

        let output = self.builder.build(outcomes, &mut self.cache);

        for (source, error) in failures {
            let fallback = output
                .resolutions
                .iter()
                .find(|resolution| resolution.source == source)
                .map(|resolution| match resolution.resolution {
                    Resolution::Stale => Fallback::Stale,
                    Resolution::Fresh | Resolution::Empty => Fallback::Empty,
                })
                .unwrap_or(Fallback::Empty);

            self.events.emit(ProviderEvent::SourceFailed {
                source,
                error,
                fallback,
            });
        }

        output.document
    }

    /// Hand `document` to the host
    ///
    /// Returns `Ok(false)` when cancelled before the host accepted it.
    async fn publish(&mut self, document: ConfigurationDocument) -> Result<bool> {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Ok(false),

            sent = self.output.send(document) => {
                sent.map_err(|_| Error::OutputClosed)?;
                self.cycle += 1;
                debug!("Provider {} published cycle {}", self.name, self.cycle);
                self.events.emit(ProviderEvent::Published { cycle: self.cycle });
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::traits::FetchResponse;
    use async_trait::async_trait;

    struct FixedFetcher(&'static str);

    #[async_trait]
    impl Fetcher for FixedFetcher {
        async fn fetch(&self, _target: &str) -> Result<FetchResponse> {
            Ok(FetchResponse::ok(self.0))
        }
    }

    fn scheduler(
        output: mpsc::Sender<ConfigurationDocument>,
        cancel: CancellationToken,
    ) -> (PollingScheduler, mpsc::Receiver<ProviderEvent>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let sources = vec![SourceDescriptor::from(&SourceConfig::hosted_list(
            "list1",
            "http://lists/mec",
        ))];

        let scheduler = PollingScheduler::new(
            "test",
            sources,
            Arc::new(FixedFetcher("10.0.0.3\n10.0.0.4\n")),
            DocumentBuilder::default(),
            Duration::from_secs(1),
            output,
            EventSender::new(event_tx),
            cancel,
        );
        (scheduler, event_rx)
    }

    #[tokio::test]
    async fn test_run_cycle_builds_document() {
        let (output, _rx) = mpsc::channel(1);
        let (mut scheduler, _events) = scheduler(output, CancellationToken::new());

        let document = scheduler.run_cycle().await;
        assert_eq!(
            document.whitelist("list1").unwrap().source_range,
            vec!["10.0.0.3", "10.0.0.4"]
        );
    }

    #[tokio::test]
    async fn test_closed_output_ends_worker() {
        let (output, rx) = mpsc::channel(1);
        drop(rx);
        let (scheduler, _events) = scheduler(output, CancellationToken::new());

        let result = scheduler.run().await;
        assert!(matches!(result, Err(Error::OutputClosed)));
    }

    #[tokio::test]
    async fn test_pre_cancelled_scheduler_never_publishes() {
        let (output, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (scheduler, _events) = scheduler(output, cancel);

        tokio_test::assert_ok!(scheduler.run().await);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_full_event_channel_drops_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let events = EventSender::new(tx);

        events.emit(ProviderEvent::Published { cycle: 1 });
        events.emit(ProviderEvent::Published { cycle: 2 });

        assert_eq!(rx.try_recv().unwrap(), ProviderEvent::Published { cycle: 1 });
        assert!(rx.try_recv().is_err());
    }
}
