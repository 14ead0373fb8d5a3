//! Run orchestration: plan, dispatch, report.
use crate::aggregator::StatsAggregator;
use crate::error::RunError;
use crate::planner::plan;
use crate::pool::{DispatchError, WorkerPool};
use crate::report::{final_summary, LiveReporter, LiveSink, LiveTick};
use crate::transaction::RequestHook;
use crate::transport::{Connector, HttpConnector, RpcConnector};
use parkbench_core::{
    ConfigError, RunConfig, Summary, TransportKind, CANCEL_GRACE_PERIOD, DEFAULT_CONCURRENCY,
    DEFAULT_REPEAT, LIVE_REPORT_INTERVAL,
};
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// A single load test over one connector.
///
/// # Example
/// ```ignore
/// let summary = Benchmark::new(connector, keys)
///     .concurrency(NonZeroUsize::new(20).unwrap())
///     .repeat(NonZeroUsize::new(3).unwrap())
///     .on_live(|tick| eprintln!("{tick}"))
///     .run()
///     .await?;
/// println!("{summary}");
/// ```
pub struct Benchmark<C> {
    connector: C,
    keys: Vec<String>,
    concurrency: NonZeroUsize,
    repeat: NonZeroUsize,
    max_rps: Option<NonZeroU32>,
    live_interval: Duration,
    sink: LiveSink,
    grace: Duration,
}

impl<C: Connector> Benchmark<C> {
    pub fn new(connector: C, keys: Vec<String>) -> Self {
        Self {
            connector,
            keys,
            concurrency: NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            repeat: NonZeroUsize::new(DEFAULT_REPEAT).unwrap_or(NonZeroUsize::MIN),
            max_rps: None,
            live_interval: LIVE_REPORT_INTERVAL,
            sink: stdout_sink(),
            grace: CANCEL_GRACE_PERIOD,
        }
    }

    /// Take concurrency, repeat and rate cap from `config`.
    pub fn configure(self, config: &RunConfig) -> Result<Self, ConfigError> {
        Ok(self
            .concurrency(config.concurrency()?)
            .repeat(config.repeat()?)
            .max_rps(config.max_rps))
    }

    pub fn concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn repeat(mut self, repeat: NonZeroUsize) -> Self {
        self.repeat = repeat;
        self
    }

    /// Cap the request rate across all workers.
    pub fn max_rps(mut self, max_rps: Option<NonZeroU32>) -> Self {
        self.max_rps = max_rps;
        self
    }

    pub fn live_interval(mut self, interval: Duration) -> Self {
        self.live_interval = interval;
        self
    }

    /// Replace the default stdout progress line.
    pub fn on_live<F>(mut self, sink: F) -> Self
    where
        F: FnMut(&LiveTick) + Send + 'static,
    {
        self.sink = Box::new(sink);
        self
    }

    /// How long workers get to wind down after a fatal error before they are aborted.
    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[instrument(
        name = "benchmark",
        skip_all,
        fields(keys = self.keys.len(), concurrency = self.concurrency.get(), repeat = self.repeat.get())
    )]
    pub async fn run(self) -> Result<Summary, RunError> {
        if self.keys.is_empty() {
            return Err(ConfigError::NoKeys.into());
        }

        let batches = plan(&self.keys, self.repeat, self.concurrency);
        info!(
            "Issuing {} requests over {} workers",
            self.keys.len() * self.repeat.get(),
            batches.len()
        );

        let stats = Arc::new(StatsAggregator::new());
        let hook = RequestHook::new(stats.clone(), self.max_rps);
        let reporter = LiveReporter::spawn(stats.clone(), self.live_interval, self.sink);

        let result = WorkerPool::new(Arc::new(self.connector), hook)
            .grace(self.grace)
            .dispatch(batches)
            .await;

        reporter.stop().await;

        match result {
            Ok(reports) => {
                let cancelled = reports.iter().filter(|r| r.cancelled).count();
                debug!("{} workers finished, {cancelled} cancelled", reports.len());
                Ok(final_summary(&stats))
            }
            Err(DispatchError::Fatal { failure, partial }) => {
                warn!(
                    "Run aborted after {} requests in {}",
                    partial.total_requests,
                    humantime::format_duration(partial.elapsed)
                );
                Err(RunError::Aborted { failure, partial })
            }
            Err(DispatchError::Panicked(err)) => {
                error!("Worker task panicked: {err}");
                Err(RunError::Panicked(err))
            }
        }
    }
}

/// Run `keys` against the endpoint `config` names for `kind`, printing progress to stdout.
pub async fn run(
    config: &RunConfig,
    kind: TransportKind,
    keys: Vec<String>,
) -> Result<Summary, RunError> {
    run_with_sink(config, kind, keys, stdout_sink()).await
}

/// As [`run`], with live progress sent to `sink`.
pub async fn run_with_sink(
    config: &RunConfig,
    kind: TransportKind,
    keys: Vec<String>,
    sink: LiveSink,
) -> Result<Summary, RunError> {
    let target = config.target(kind)?;
    info!("Benchmarking {kind} endpoint {}", target.address);

    match kind {
        TransportKind::Http => {
            Benchmark::new(HttpConnector::new(target)?, keys)
                .configure(config)?
                .on_live(sink)
                .run()
                .await
        }
        TransportKind::Rpc => {
            Benchmark::new(RpcConnector::new(target)?, keys)
                .configure(config)?
                .on_live(sink)
                .run()
                .await
        }
    }
}

fn stdout_sink() -> LiveSink {
    Box::new(|tick: &LiveTick| println!("{tick}"))
}
