use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use parkbench::report::{LiveSink, LiveTick};
use parkbench::{KeySource, RunError};
use parkbench_core::{RunConfig, TransportKind};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_KEY_FILE: &str = "ids.csv";
const DEFAULT_LOG_FILTER: &str = "parkbench=info";

/// Fire lookups from a CSV of ids at a Parker endpoint and report latency.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON run configuration.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Use the gRPC endpoint.
    #[arg(long, conflicts_with = "http")]
    grpc: bool,

    /// Use the HTTP endpoint.
    #[arg(long)]
    http: bool,

    /// CSV file with one id per row in the first column (overrides `csv`).
    #[arg(long)]
    csv: Option<PathBuf>,

    #[arg(short = 'n', long)]
    concurrency: Option<usize>,

    #[arg(short, long)]
    repeat: Option<usize>,

    /// Per-request timeout, e.g. `500ms` or `5s`.
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Cap on requests per second across all workers.
    #[arg(long)]
    max_rps: Option<NonZeroU32>,

    /// Print the final summary as JSON.
    #[arg(long)]
    json: bool,

    /// Serve Prometheus metrics on this address while running.
    #[arg(long)]
    prometheus: Option<SocketAddr>,
}

impl Cli {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(csv) = &self.csv {
            config.csv_path = Some(csv.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(repeat) = self.repeat {
            config.repeat = repeat;
        }
        if self.timeout.is_some() {
            config.timeout = self.timeout;
        }
        if self.max_rps.is_some() {
            config.max_rps = self.max_rps;
        }
    }

    /// Explicit flag first, otherwise gRPC whenever the config names a gRPC address.
    fn transport(&self, config: &RunConfig) -> TransportKind {
        if self.grpc {
            TransportKind::Rpc
        } else if self.http {
            TransportKind::Http
        } else if config
            .grpc_address
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty())
        {
            TransportKind::Rpc
        } else {
            TransportKind::Http
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(addr) = cli.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Unable to start the Prometheus exporter")?;
        info!("Serving metrics on {addr}");
    }

    let mut config = RunConfig::load(&cli.config)
        .with_context(|| format!("Unable to load {}", cli.config.display()))?;
    cli.apply(&mut config);

    let key_file = config
        .csv_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_FILE));
    let keys = KeySource::from_csv(&key_file)?;
    info!("Loaded {} keys from {}", keys.len(), key_file.display());

    let kind = cli.transport(&config);
    // Keep stdout parseable when printing JSON.
    let sink: LiveSink = if cli.json {
        Box::new(|tick: &LiveTick| eprintln!("{tick}"))
    } else {
        Box::new(|tick: &LiveTick| println!("{tick}"))
    };

    match parkbench::run_with_sink(&config, kind, keys.into_keys(), sink).await {
        Ok(summary) if cli.json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Ok(summary) => println!("{summary}"),
        Err(err) => {
            if let RunError::Aborted { partial, .. } = &err {
                eprintln!("Completed before the abort:\n{partial}");
            }
            return Err(err.into());
        }
    }

    Ok(())
}
