use std::time::Duration;

/// Period of the live throughput/latency line.
pub const LIVE_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Number of most recent samples the live line averages over.
pub const LIVE_LATENCY_WINDOW: usize = 1000;

/// The default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// The default number of passes over the key set.
pub const DEFAULT_REPEAT: usize = 1;

/// Idle HTTP connections kept per worker.
pub const HTTP_MAX_IDLE_PER_HOST: usize = 4;

/// How long the run waits for workers to notice a cancellation before aborting them.
pub const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// A failed-lookup warning is logged for the first failure and then once per this many.
pub const FAILURE_WARN_EVERY: u64 = 1000;
