//! Neural Node
//!
//! Runs the neural agent fleet: compliance, fraud, treasury, growth and
//! support agents on one event bus, supervised by the agent manager.
//!
//! # Usage
//!
//! ```bash
//! # Run the fleet until Ctrl+C / SIGTERM
//! neural-node run
//!
//! # One request against a freshly started fleet
//! neural-node send compliance compliance_check \
//!     --data '{"entity_type":"merchant","entity_id":"m1"}'
//!
//! # Environment overrides
//! NEURAL__ORACLE__PROVIDER=rules NEURAL__AGENTS__FRAUD_THRESHOLD=0.8 neural-node run
//! ```

mod config;
mod fixtures;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use neural_agent_kernel::{CacheBackend, DataStore, EventBus, MemoryCache, NoStore, SharedServices};
use neural_agents::NeuralAgentFactory;
use neural_manager::AgentManager;
use neural_oracle::{HttpOracle, OracleKind, Reasoner};

use crate::config::NodeConfig;
use crate::fixtures::Fixtures;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Neural Node - multi-agent decision fleet
#[derive(Parser, Debug)]
#[command(name = "neural-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "NEURAL_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "NEURAL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "NEURAL_LOG_FORMAT")]
    log_format: Option<String>,

    /// Knowledge oracle provider (none, rules, http)
    #[arg(long)]
    oracle: Option<String>,

    /// Fleet-wide agent seed
    #[arg(long)]
    seed: Option<String>,

    /// JSON fixture file for the in-memory store
    #[arg(long)]
    fixtures: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the fleet and run until shutdown (default)
    Run,

    /// Send one request to an agent and print the response
    Send {
        /// Agent name (compliance, fraud, treasury, growth, support)
        agent: String,
        message_type: String,
        /// Request payload as JSON
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Send one request to several agents and print every response
    Broadcast {
        message_type: String,
        #[arg(long, default_value = "{}")]
        data: String,
        /// Comma-separated agent names; all agents when omitted
        #[arg(long, value_delimiter = ',')]
        targets: Vec<String>,
    },

    /// Start the fleet, print its status and stop
    Status,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut node_config = NodeConfig::load(args.config.as_deref())?;

    if let Some(level) = args.log_level {
        node_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        node_config.logging.format = format;
    }
    if let Some(oracle) = args.oracle {
        node_config.oracle.provider = oracle;
    }
    if let Some(seed) = args.seed {
        node_config.agents.base_seed = Some(seed);
    }
    if let Some(fixtures) = args.fixtures {
        node_config.store.fixtures = Some(fixtures);
    }

    init_logging(&node_config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Neural Node");

    if node_config.metrics.enabled {
        start_metrics_exporter(&node_config.metrics)?;
    }

    let (services, purge_task) = init_services(&node_config)?;
    let reasoner = Arc::new(init_reasoner(&node_config.oracle));
    tracing::info!(
        oracle = reasoner.oracle_name(),
        kind = %reasoner.kind(),
        available = reasoner.is_available().await,
        "Reasoner ready"
    );

    let factory = NeuralAgentFactory::new(node_config.agents.fleet(), reasoner);
    let manager = AgentManager::new(services, Arc::new(factory), node_config.agents.manager());

    let start_report = manager.start().await?;
    for (agent, error) in &start_report.failed {
        tracing::warn!(agent = %agent, error = %error, "Agent unavailable");
    }

    let outcome = match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!(agents = ?start_report.started, "Neural Node running");
            shutdown_signal().await;
            Ok(())
        }
        Command::Send {
            agent,
            message_type,
            data,
        } => match parse_payload(&data) {
            Ok(payload) => print_json(&manager.send_to_agent(&agent, &message_type, payload).await),
            Err(e) => Err(e),
        },
        Command::Broadcast {
            message_type,
            data,
            targets,
        } => match parse_payload(&data) {
            Ok(payload) => {
                let targets = (!targets.is_empty()).then_some(targets.as_slice());
                print_json(&manager.broadcast_to_agents(&message_type, payload, targets).await)
            }
            Err(e) => Err(e),
        },
        Command::Status => print_json(&manager.all_status().await),
    };

    let stop_report = manager.stop().await?;
    if !stop_report.aborted.is_empty() {
        tracing::warn!(agents = ?stop_report.aborted, "Agents cancelled after grace period");
    }
    if let Some(task) = purge_task {
        task.abort();
    }

    tracing::info!("Neural Node shutdown complete");
    outcome
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber.with(fmt::layer().json().with_target(true)).try_init()?;
        }
        _ => {
            subscriber.with(fmt::layer().pretty().with_target(true)).try_init()?;
        }
    }

    Ok(())
}

/// Install the Prometheus exporter and its scrape listener
fn start_metrics_exporter(config: &config::MetricsConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("installing Prometheus exporter")?;
    tracing::info!(port = config.port, "Metrics exporter listening");
    Ok(())
}

/// Bus, cache, store and query timeout shared by every agent
fn init_services(
    config: &NodeConfig,
) -> anyhow::Result<(SharedServices, Option<tokio::task::JoinHandle<()>>)> {
    let bus = EventBus::new(config.bus.namespace.clone());

    let cache = Arc::new(MemoryCache::new());
    let purge_task = (config.cache.purge_interval_secs > 0).then(|| {
        let cache = cache.clone();
        let every = Duration::from_secs(config.cache.purge_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Expired cache entries removed");
                }
            }
        })
    });

    let store: Arc<dyn DataStore> = match &config.store.fixtures {
        Some(path) => {
            let fixtures = Fixtures::from_file(path)?;
            tracing::info!(path = %path.display(), rows = fixtures.len(), "Store fixtures loaded");
            Arc::new(fixtures.into_store())
        }
        None => Arc::new(NoStore),
    };

    let cache: Arc<dyn CacheBackend> = cache;
    let services = SharedServices::new(bus, cache, store)
        .with_query_timeout(config.agents.query_timeout());
    Ok((services, purge_task))
}

fn init_reasoner(config: &config::OracleSettings) -> Reasoner {
    match config.kind() {
        OracleKind::Http => Reasoner::new(Arc::new(HttpOracle::new(config.http()))),
        kind => Reasoner::from_kind(kind),
    }
}

fn parse_payload(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).context("--data must be valid JSON")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping agents");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping agents");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
