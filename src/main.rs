// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! appmon main entry point - configuration inspection and a local simulation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use appmon::config::{self, Overrides};
use appmon::instrumentation::InstrumentationHooks;
use appmon::metrics::MetricSpec;
use appmon::transaction::propagator;
use appmon::{Agent, HarvestError, HarvestPayload, Harvester, MetricSink, RenameRules};

/// appmon version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// appmon - in-process APM telemetry core.
#[derive(Parser)]
#[command(name = "appmon")]
#[command(author, version, about = "In-process APM telemetry core", long_about = None)]
struct Cli {
    /// Application name to report
    #[arg(long)]
    app_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds between harvests
    #[arg(long)]
    harvest_interval: Option<u64>,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Subcommands for appmon.
#[derive(Subcommand)]
enum Commands {
    /// Show the resolved configuration
    Config,

    /// Load a rename rule file and optionally look up one metric
    Rules {
        /// Rule file (JSON or YAML)
        file: PathBuf,

        /// Metric name to look up
        #[arg(long)]
        name: Option<String>,

        /// Scope of the metric to look up
        #[arg(long, requires = "name")]
        scope: Option<String>,
    },

    /// Run instrumented requests against in-process stubs and print the harvest
    Simulate {
        /// Inbound request path
        #[arg(long, default_value = "/path")]
        path: String,

        /// Number of inbound requests
        #[arg(short, long, default_value_t = 1)]
        requests: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        app_name: cli.app_name,
        log_level: cli.log_level,
        harvest_interval_secs: cli.harvest_interval,
    }
    .or(Overrides::from_env());

    let workspace_root = std::env::current_dir()?;
    let config = config::load_config(&workspace_root, overrides)?;

    let mut logging = config.logging_config()?;
    if cli.debug {
        logging = logging.with_level(tracing::Level::DEBUG);
    }
    let _guard = appmon::telemetry::init_logging(&logging)?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Rules { file, name, scope } => {
            let rules = RenameRules::from_rules(&config::load_rename_rules(&file)?);
            println!(
                "{} {} rules from {}",
                "✓".green(),
                rules.len(),
                file.display().to_string().bright_white()
            );
            if let Some(name) = name {
                match rules.lookup(&name, scope.as_deref()) {
                    Some(id) => println!("{} -> {}", name, id.to_string().bright_cyan()),
                    None => println!("{} {}", name, "(no rule, reported by name)".dimmed()),
                }
            }
        }
        Commands::Simulate { path, requests, format } => {
            let agent = Agent::with_config(&config);
            for _ in 0..requests {
                simulate_request(&agent, &path).await;
            }

            let sink = Arc::new(PrintSink { format });
            let harvester = Harvester::from_config(agent.clone(), sink, &config);
            let sent = harvester.harvest_once().await?;

            if let OutputFormat::Text = format {
                println!(
                    "\n{} {} metrics harvested, {} dropped samples",
                    "→".cyan(),
                    sent,
                    agent.dropped_samples()
                );
            }
        }
        Commands::Version => {
            println!("appmon {}", VERSION);
        }
    }
    Ok(())
}

/// One inbound request whose handler calls an instrumented downstream
/// service and a data store.
async fn simulate_request(agent: &Agent, path: &str) {
    let txn = agent.on_inbound_start(path);

    propagator::scope(Some(Arc::clone(&txn)), async {
        let call = agent.on_outbound_start("localhost", "/status");
        let downstream = agent.on_inbound_start("/status");
        propagator::scope(Some(Arc::clone(&downstream)), async {
            tokio::time::sleep(Duration::from_millis(2)).await;
        })
        .await;
        agent.on_inbound_end(&downstream);
        agent.on_outbound_end(call);

        let command = agent.on_datastore_start("Redis", "GET");
        tokio::time::sleep(Duration::from_millis(1)).await;
        agent.on_outbound_end(command);
    })
    .await;

    agent.on_inbound_end(&txn);
}

/// Writes each harvest to stdout.
struct PrintSink {
    format: OutputFormat,
}

#[async_trait]
impl MetricSink for PrintSink {
    async fn send(&self, payload: HarvestPayload) -> Result<(), HarvestError> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&payload)
                    .map_err(|e| HarvestError::Rejected(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Text => {
                println!("{}", format!("Harvest for {}", payload.app_name).bright_blue().bold());
                for (key, value) in &payload.environment {
                    println!("  {}: {}", key.dimmed(), value);
                }
                for metric in &payload.metrics {
                    let label = match &metric.spec {
                        MetricSpec::Id(id) => format!("#{}", id),
                        MetricSpec::Literal(key) => key.to_string(),
                    };
                    println!(
                        "  {:<60} calls={} total={:.4}s",
                        label.bright_white(),
                        metric.stats.call_count,
                        metric.stats.total
                    );
                }
            }
        }
        Ok(())
    }
}
