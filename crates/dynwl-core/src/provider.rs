//! Provider lifecycle
//!
//! A [`Provider`] validates its configuration once, then moves through
//! three states:
//!
//! ```text
//!   Idle ──start()──► Running ──stop()──► Stopped
//!     └──────────────stop()──────────────────┘
//! ```
//!
//! `start` spawns the polling worker under a supervisor task. The worker
//! returns a `Result`; the supervisor logs failures and panics instead of
//! letting them reach the host, and reports `Stopped` on the event channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{IpStrategy, ProviderConfig};
use crate::document::{ConfigurationDocument, DocumentBuilder};
use crate::engine::{EventSender, PollingScheduler, ProviderEvent};
use crate::error::{Error, Result};
use crate::source::SourceDescriptor;
use crate::traits::Fetcher;

/// Lifecycle state of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Constructed, not started
    Idle,
    /// Worker running
    Running,
    /// Stop requested; no further documents are published
    Stopped,
}

/// A dynamic whitelist configuration provider
///
/// ## Lifecycle
///
/// 1. Create with [`Provider::new()`] (validates the configuration)
/// 2. Start with [`Provider::start()`], handing over the output channel
/// 3. Stop with [`Provider::stop()`], optionally await [`Provider::join()`]
///
/// Dropping a running provider cancels its worker.
pub struct Provider {
    /// Provider name, for logs
    name: String,

    /// Time between cycles
    poll_interval: Duration,

    /// Sources in cycle order
    sources: Vec<SourceDescriptor>,

    /// Matching strategy for every rule
    ip_strategy: Option<IpStrategy>,

    /// Remote fetcher shared with the worker
    fetcher: Arc<dyn Fetcher>,

    /// Event side channel
    events: EventSender,

    /// Current state
    state: ProviderState,

    /// Stop signal for the current worker
    cancel: Option<CancellationToken>,

    /// Supervisor task of the current worker
    supervisor: Option<JoinHandle<()>>,
}

impl Provider {
    /// Create a provider
    ///
    /// # Parameters
    ///
    /// - `name`: Provider name used in logs
    /// - `config`: Provider configuration, validated here
    /// - `fetcher`: Fetcher used for every remote read
    ///
    /// # Returns
    ///
    /// A tuple of (provider, event_receiver) where event_receiver yields
    /// provider events.
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfiguration` when the interval is not a positive
    /// duration or the sources are missing or invalid.
    pub fn new(
        name: impl Into<String>,
        config: ProviderConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<(Self, mpsc::Receiver<ProviderEvent>)> {
        config.validate()?;
        let poll_interval = config.interval()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let provider = Self {
            name: name.into(),
            poll_interval,
            sources: config.sources.iter().map(SourceDescriptor::from).collect(),
            ip_strategy: config.ip_strategy,
            fetcher,
            events: EventSender::new(tx),
            state: ProviderState::Idle,
            cancel: None,
            supervisor: None,
        };

        Ok((provider, rx))
    }

    /// Provider name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validated poll interval
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Start publishing documents on `output`
    ///
    /// Returns immediately. The first document is built right away, later
    /// ones once per poll interval. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `Error::Lifecycle` unless the provider is Idle.
    pub fn start(&mut self, output: mpsc::Sender<ConfigurationDocument>) -> Result<()> {
        if self.state != ProviderState::Idle {
            return Err(Error::lifecycle(format!(
                "provider {} cannot start from state {:?}",
                self.name, self.state
            )));
        }

        let cancel = CancellationToken::new();
        let scheduler = PollingScheduler::new(
            self.name.clone(),
            self.sources.clone(),
            Arc::clone(&self.fetcher),
            DocumentBuilder::new(self.ip_strategy.clone()),
            self.poll_interval,
            output,
            self.events.clone(),
            cancel.clone(),
        );

        self.supervisor = Some(supervise(self.name.clone(), scheduler, self.events.clone()));
        self.cancel = Some(cancel);
        self.state = ProviderState::Running;

        info!("Provider {} started", self.name);
        Ok(())
    }

    /// Stop publishing
    ///
    /// Signals cancellation and returns without waiting for in-flight
    /// fetches. Calling it again, or on a provider never started, is a
    /// no-op.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            ProviderState::Running => {
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
                info!("Provider {} stopping", self.name);
            }
            ProviderState::Idle => {
                info!("Provider {} stopped before start", self.name);
            }
            ProviderState::Stopped => {}
        }

        self.state = ProviderState::Stopped;
        Ok(())
    }

    /// Wait for the worker to exit
    ///
    /// Returns immediately if the provider was never started.
    pub async fn join(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            if let Err(e) = supervisor.await {
                warn!("Supervisor of provider {} ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}

/// Spawn `scheduler` and a supervisor observing how it ends
fn supervise(name: String, scheduler: PollingScheduler, events: EventSender) -> JoinHandle<()> {
    let worker = tokio::spawn(scheduler.run());

    tokio::spawn(async move {
        let reason = match worker.await {
            Ok(Ok(())) => {
                info!("Provider {} stopped", name);
                "Stop requested".to_string()
            }
            Ok(Err(e)) => {
                error!("Provider {} worker failed: {}", name, e);
                format!("Worker failed: {}", e)
            }
            Err(e) if e.is_panic() => {
                error!("Provider {} worker panicked: {}", name, e);
                "Worker panicked".to_string()
            }
            Err(e) => {
                warn!("Provider {} worker aborted: {}", name, e);
                "Worker aborted".to_string()
            }
        };

        events.emit(ProviderEvent::Stopped { reason });
    })
}
