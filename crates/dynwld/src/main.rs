// # dynwld - Dynamic Whitelist Daemon
//
// This is a thin integration layer. All polling, fallback and document
// logic lives in dynwl-core.
//
// The dynwld daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Running one provider with the HTTP fetcher
// 4. Writing every published document as JSON to a file or stdout
//
// ## Configuration
//
// ### Provider
// - `DYNWL_MODE`: `public_ip` (default) or `lists`
// - `DYNWL_POLL_INTERVAL`: Poll interval, e.g. `300s` (default per mode)
// - `DYNWL_IP_STRATEGY_DEPTH`: Trusted proxy depth
// - `DYNWL_IP_STRATEGY_EXCLUDED_IPS`: Comma-separated excluded IPs
//
// ### Public IP mode
// - `DYNWL_RULE_NAME`: Rule name (default `public_ipwhitelist`)
// - `DYNWL_IPV4_RESOLVER`: IPv4 resolver URL
// - `DYNWL_IPV6_RESOLVER`: IPv6 resolver URL
// - `DYNWL_WHITELIST_IPV6`: `true`/`false` (default `true`)
//
// ### Lists mode
// - `DYNWL_LIST_BASE_URL`: Base URL the list identifiers are appended to
// - `DYNWL_LISTS`: Comma-separated `rule=list_id` pairs
//
// ### Output
// - `DYNWL_OUTPUT`: Path of the JSON document, `-` for stdout (default)
// - `DYNWL_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DYNWL_MODE=lists
// export DYNWL_LISTS=office=mec,partners=ptn
// export DYNWL_OUTPUT=/etc/traefik/dynamic/whitelist.json
//
// dynwld
// ```

use anyhow::{Context, Result};
use dynwl_core::config::{DEFAULT_LIST_BASE_URL, DEFAULT_PUBLIC_RULE_NAME};
use dynwl_core::{ConfigurationDocument, IpStrategy, ProviderConfig, ProviderEvent, SourceConfig};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DynwlExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DynwlExitCode> for ExitCode {
    fn from(code: DynwlExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Where published documents go
#[derive(Debug, Clone, PartialEq, Eq)]
enum Output {
    Stdout,
    File(PathBuf),
}

/// Application configuration
#[derive(Debug)]
struct Config {
    provider: ProviderConfig,
    output: Output,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = lookup("DYNWL_MODE").unwrap_or_else(|| "public_ip".to_string());

        let mut provider = match mode.as_str() {
            "public_ip" => {
                let mut source = SourceConfig::public_ip(
                    lookup("DYNWL_RULE_NAME").unwrap_or_else(|| DEFAULT_PUBLIC_RULE_NAME.to_string()),
                );
                if let SourceConfig::PublicIp {
                    ipv4_resolver,
                    ipv6_resolver,
                    whitelist_ipv6,
                    ..
                } = &mut source
                {
                    if let Some(url) = lookup("DYNWL_IPV4_RESOLVER") {
                        *ipv4_resolver = url;
                    }
                    if let Some(url) = lookup("DYNWL_IPV6_RESOLVER") {
                        *ipv6_resolver = url;
                    }
                    if let Some(flag) = lookup("DYNWL_WHITELIST_IPV6") {
                        *whitelist_ipv6 = parse_bool(&flag)
                            .with_context(|| format!("DYNWL_WHITELIST_IPV6 is not a boolean: {}", flag))?;
                    }
                }
                ProviderConfig::public_ip().with_sources(vec![source])
            }
            "lists" => {
                let base_url =
                    lookup("DYNWL_LIST_BASE_URL").unwrap_or_else(|| DEFAULT_LIST_BASE_URL.to_string());
                let lists = parse_lists(&lookup("DYNWL_LISTS").unwrap_or_default())?;
                ProviderConfig::hosted_lists(&base_url, lists)
            }
            other => anyhow::bail!(
                "DYNWL_MODE '{}' is not supported. Supported modes: public_ip, lists",
                other
            ),
        };

        if let Some(interval) = lookup("DYNWL_POLL_INTERVAL") {
            provider = provider.with_poll_interval(interval);
        }

        let depth = match lookup("DYNWL_IP_STRATEGY_DEPTH") {
            Some(depth) => depth
                .parse()
                .with_context(|| format!("DYNWL_IP_STRATEGY_DEPTH must be a non-negative integer. Got: {}", depth))?,
            None => 0,
        };
        let excluded_ips = split_csv(&lookup("DYNWL_IP_STRATEGY_EXCLUDED_IPS").unwrap_or_default());
        let strategy = IpStrategy::new(depth, excluded_ips);
        if !strategy.is_empty() {
            provider = provider.with_ip_strategy(strategy);
        }

        let output = match lookup("DYNWL_OUTPUT").as_deref() {
            None | Some("") | Some("-") => Output::Stdout,
            Some(path) => Output::File(PathBuf::from(path)),
        };

        Ok(Self {
            provider,
            output,
            log_level: lookup("DYNWL_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.provider.validate()?;

        if let Output::File(path) = &self.output {
            let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                if !parent.exists() {
                    anyhow::bail!(
                        "DYNWL_OUTPUT parent directory does not exist: {}. \
                        Create it first: sudo mkdir -p {}",
                        parent.display(),
                        parent.display()
                    );
                }
            }
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DYNWL_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("invalid boolean"),
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `rule=list_id` pairs, keeping their order
fn parse_lists(value: &str) -> Result<Vec<(String, String)>> {
    split_csv(value)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((rule, list_id)) if !rule.trim().is_empty() && !list_id.trim().is_empty() => {
                Ok((rule.trim().to_string(), list_id.trim().to_string()))
            }
            _ => anyhow::bail!("DYNWL_LISTS entry must be rule=list_id. Got: {}", pair),
        })
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DynwlExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DynwlExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout can carry documents
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DynwlExitCode::ConfigError.into();
    }

    info!("Starting dynwld daemon");
    info!(
        "Configuration loaded: {} source(s)",
        config.provider.sources.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DynwlExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DynwlExitCode::RuntimeError
        } else {
            DynwlExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    for source in &config.provider.sources {
        info!("Managing rule: {}", source.name());
    }

    let (mut provider, mut events) = dynwl_http::http_provider("dynwld", config.provider)
        .context("Failed to initialize provider")?;

    let (tx, mut documents) = mpsc::channel::<ConfigurationDocument>(1);
    provider.start(tx)?;

    let output = config.output;
    let mut shutdown = std::pin::pin!(wait_for_shutdown());

    loop {
        tokio::select! {
            Some(document) = documents.recv() => {
                write_document(&output, &document).await?;
            }

            Some(event) = events.recv() => {
                log_event(&event);
                if let ProviderEvent::Stopped { reason } = event {
                    anyhow::bail!("Provider stopped unexpectedly: {}", reason);
                }
            }

            signal = &mut shutdown => {
                let signal = signal?;
                info!("Received shutdown signal: {}", signal);
                break;
            }
        }
    }

    info!("Shutting down daemon");
    provider.stop()?;
    provider.join().await;

    Ok(())
}

fn log_event(event: &ProviderEvent) {
    match event {
        ProviderEvent::SourceFailed {
            source,
            error,
            fallback,
        } => warn!("Source {} failed ({:?} data published): {}", source, fallback, error),
        ProviderEvent::Published { cycle } => debug!("Published cycle {}", cycle),
        other => info!("Provider event: {:?}", other),
    }
}

/// Write `document` to `output`
///
/// Files are replaced atomically so the host never reads a partial document.
async fn write_document(output: &Output, document: &ConfigurationDocument) -> Result<()> {
    let json = document.to_json_pretty()?;

    match output {
        Output::Stdout => {
            println!("{}", json);
        }
        Output::File(path) => {
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            tokio::fs::rename(&tmp, path)
                .await
                .with_context(|| format!("Failed to replace {}", path.display()))?;
            debug!("Wrote {}", path.display());
        }
    }

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
