use crate::aggregator::StatsAggregator;
use parkbench_core::{duration_ms, mean_latency_ms, LIVE_LATENCY_WINDOW};
use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, trace};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// One periodic progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTick {
    /// Requests completed since the previous tick divided by the time since that tick.
    pub requests_per_second: f64,
    /// Mean over the most recent samples.
    pub avg_latency_ms: f64,
    /// Approximate run-wide p99.
    pub p99_estimate_ms: f64,
    pub total_requests: u64,
    pub elapsed: Duration,
}

impl fmt::Display for LiveTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Requests per second: {:.0}, Average latency: {:.2}ms (p99≈{:.2}ms, {} total)",
            self.requests_per_second, self.avg_latency_ms, self.p99_estimate_ms, self.total_requests
        )
    }
}

pub type LiveSink = Box<dyn FnMut(&LiveTick) + Send>;

/// Background task emitting a [`LiveTick`] every interval until stopped.
pub struct LiveReporter {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LiveReporter {
    pub fn spawn(stats: Arc<StatsAggregator>, interval: Duration, mut sink: LiveSink) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut cadence = Cadence::new(interval);
            let mut window = LiveWindow::new();
            debug!("Live reporting every {}", humantime::format_duration(interval));

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    elapsed = cadence.wait() => {
                        if let Some(tick) = window.observe(&stats, elapsed) {
                            sink(&tick);
                        }
                    }
                }
            }

            trace!("Live reporter stopped");
        });

        Self { stop, handle }
    }

    /// Signal the task and wait for it to exit. No tick is emitted after this returns.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.handle.await {
            error!("Live reporter task failed: {err}");
        }
    }
}

/// Fires once per reporting period and measures the real gap since the previous report.
///
/// Late ticks are pushed back rather than bunched, so a stalled runtime yields one
/// long interval instead of a burst of short ones.
struct Cadence {
    interval: Interval,
    last: Instant,
}

impl Cadence {
    fn new(period: Duration) -> Self {
        // interval_at panics on a zero period.
        let period = period.max(Duration::from_millis(1));
        let last = Instant::now();
        let mut interval = interval_at(last + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, last }
    }

    async fn wait(&mut self) -> Duration {
        self.interval.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed
    }
}

/// Per-tick bookkeeping: what the previous tick already saw.
pub(crate) struct LiveWindow {
    last_total: u64,
    seen: usize,
    digest: TDigest<K1>,
}

impl LiveWindow {
    pub fn new() -> Self {
        Self {
            last_total: 0,
            seen: 0,
            digest: default_tdigest(),
        }
    }

    /// Produce a tick for the `elapsed` since the previous call, or `None` when nothing completed.
    pub fn observe(&mut self, stats: &StatsAggregator, elapsed: Duration) -> Option<LiveTick> {
        let fresh = stats.samples_since(self.seen);
        self.seen += fresh.len();
        for sample in &fresh {
            self.digest.insert(sample.latency.as_secs_f64());
        }

        let total_requests = stats.total_requests();
        let completed = total_requests.saturating_sub(self.last_total);
        self.last_total = total_requests;

        if completed == 0 {
            debug!("No requests completed in the last {}", humantime::format_duration(elapsed));
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let requests_per_second = if secs > 0. { completed as f64 / secs } else { 0. };

        let recent = stats.snapshot_recent(LIVE_LATENCY_WINDOW);

        Some(LiveTick {
            requests_per_second,
            avg_latency_ms: mean_latency_ms(&recent),
            p99_estimate_ms: self.p99_estimate_ms(),
            total_requests,
            elapsed: stats.elapsed(),
        })
    }

    fn p99_estimate_ms(&self) -> f64 {
        let secs = self.digest.quantile(0.99);

        // TDigest can return NaN on small or degenerate inputs.
        if secs.is_finite() {
            duration_ms(Duration::from_secs_f64(secs.max(0.)))
        } else {
            0.
        }
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkbench_core::LatencySample;
    use std::sync::Mutex;

    fn fill(stats: &StatsAggregator, range: std::ops::RangeInclusive<u64>) {
        for ms in range {
            stats.append(LatencySample::success(Duration::from_millis(ms)));
        }
    }

    #[test]
    fn rate_counts_only_the_latest_interval() {
        let stats = StatsAggregator::new();
        let mut window = LiveWindow::new();

        fill(&stats, 1..=100);
        let tick = window.observe(&stats, Duration::from_secs(1)).unwrap();
        assert_eq!(tick.requests_per_second, 100.);
        assert_eq!(tick.total_requests, 100);
        assert_eq!(tick.avg_latency_ms, 50.5);

        fill(&stats, 1..=50);
        let tick = window.observe(&stats, Duration::from_secs(2)).unwrap();
        assert_eq!(tick.requests_per_second, 25.);
        assert_eq!(tick.total_requests, 150);
    }

    #[test]
    fn idle_interval_emits_nothing() {
        let stats = StatsAggregator::new();
        let mut window = LiveWindow::new();
        assert!(window.observe(&stats, Duration::from_secs(1)).is_none());

        fill(&stats, 1..=3);
        assert!(window.observe(&stats, Duration::from_secs(1)).is_some());
        assert!(window.observe(&stats, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn average_uses_recent_window() {
        let stats = StatsAggregator::new();
        let mut window = LiveWindow::new();

        for _ in 0..LIVE_LATENCY_WINDOW {
            stats.append(LatencySample::success(Duration::from_millis(1_000)));
        }
        for _ in 0..LIVE_LATENCY_WINDOW {
            stats.append(LatencySample::success(Duration::from_millis(10)));
        }

        let tick = window.observe(&stats, Duration::from_secs(1)).unwrap();
        assert_eq!(tick.avg_latency_ms, 10.);
        assert!(tick.p99_estimate_ms > 10.);
    }

    #[test]
    fn renders_progress_line() {
        let tick = LiveTick {
            requests_per_second: 1234.4,
            avg_latency_ms: 3.14159,
            p99_estimate_ms: 9.5,
            total_requests: 5_000,
            elapsed: Duration::from_secs(4),
        };
        assert_eq!(
            tick.to_string(),
            "Requests per second: 1234, Average latency: 3.14ms (p99≈9.50ms, 5000 total)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_measures_real_gaps() {
        let mut cadence = Cadence::new(Duration::from_secs(1));
        assert_eq!(cadence.wait().await, Duration::from_secs(1));

        // A slow consumer sees the whole gap, not the nominal period.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(cadence.wait().await, Duration::from_millis(2_500));
        assert_eq!(cadence.wait().await, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stop_ends_ticks() {
        let stats = Arc::new(StatsAggregator::new());
        let ticks = Arc::new(Mutex::new(Vec::new()));

        let reporter = {
            let ticks = ticks.clone();
            LiveReporter::spawn(
                stats.clone(),
                Duration::from_millis(20),
                Box::new(move |tick| ticks.lock().unwrap().push(tick.clone())),
            )
        };

        for i in 1..=5 {
            fill(&stats, 1..=10);
            tokio::time::sleep(Duration::from_millis(30 * i)).await;
        }
        reporter.stop().await;

        let count = ticks.lock().unwrap().len();
        assert!(count >= 1);
        assert!(ticks
            .lock()
            .unwrap()
            .iter()
            .all(|tick| tick.total_requests <= 50));

        fill(&stats, 1..=10);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ticks.lock().unwrap().len(), count);
    }
}
