use parkbench_core::{LatencySample, Summary};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Concurrently writable record of every completed request.
///
/// Appends go through a short mutex-guarded push; the request counter is bumped while the
/// lock is held so a snapshot never holds more samples than the counter it reports.
#[derive(Debug)]
pub struct StatsAggregator {
    start: Instant,
    samples: Mutex<Vec<LatencySample>>,
    total: AtomicU64,
    success: AtomicU64,
    error: AtomicU64,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            samples: Mutex::new(Vec::new()),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            error: AtomicU64::new(0),
        }
    }

    pub fn append(&self, sample: LatencySample) {
        let mut samples = self.lock();
        samples.push(sample);
        self.total.fetch_add(1, Ordering::Release);
        drop(samples);

        if sample.success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error.load(Ordering::Relaxed)
    }

    /// Time since the aggregator (and therefore the run) was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn snapshot_all(&self) -> StatsSnapshot {
        let samples = self.lock();
        let total_requests = self.total_requests();
        let samples = samples.clone();

        StatsSnapshot {
            samples,
            total_requests,
            elapsed: self.elapsed(),
        }
    }

    /// The `window` most recent samples, oldest first.
    pub fn snapshot_recent(&self, window: usize) -> Vec<LatencySample> {
        let samples = self.lock();
        let from = samples.len().saturating_sub(window);
        samples[from..].to_vec()
    }

    /// Every sample appended after the first `offset`.
    pub fn samples_since(&self, offset: usize) -> Vec<LatencySample> {
        let samples = self.lock();
        samples.get(offset..).map(<[_]>::to_vec).unwrap_or_default()
    }

    // A writer can't leave the Vec half-pushed, so a poisoned lock still holds valid data.
    fn lock(&self) -> MutexGuard<'_, Vec<LatencySample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of the whole run.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    samples: Vec<LatencySample>,
    total_requests: u64,
    elapsed: Duration,
}

impl StatsSnapshot {
    pub fn samples(&self) -> &[LatencySample] {
        &self.samples
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn summary(&self) -> Summary {
        Summary::from_samples(&self.samples, self.total_requests, self.elapsed)
    }
}
