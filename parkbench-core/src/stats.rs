use crate::data::{duration_ms, LatencySample};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Full-run statistics.
///
/// Latencies are nearest-rank percentiles in milliseconds; throughput is measured against the
/// wall time since the run started, ramp-up included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub requests_per_second: f64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl Summary {
    pub fn from_samples(samples: &[LatencySample], total_requests: u64, elapsed: Duration) -> Self {
        let mut sorted: Vec<Duration> = samples.iter().map(|s| s.latency).collect();
        sorted.sort_unstable();

        let avg_latency_ms = mean_latency_ms(samples);
        let success_count = samples.iter().filter(|s| s.success).count() as u64;
        let secs = elapsed.as_secs_f64();
        let requests_per_second = if secs > 0. {
            total_requests as f64 / secs
        } else {
            0.
        };

        Self {
            total_requests,
            success_count,
            error_count: samples.len() as u64 - success_count,
            avg_latency_ms,
            p50_latency_ms: duration_ms(nearest_rank(&sorted, 50)),
            p95_latency_ms: duration_ms(nearest_rank(&sorted, 95)),
            p99_latency_ms: duration_ms(nearest_rank(&sorted, 99)),
            requests_per_second,
            elapsed,
        }
    }

    pub fn error_rate(&self) -> f64 {
        let recorded = self.success_count + self.error_count;
        if recorded == 0 {
            0.
        } else {
            self.error_count as f64 / recorded as f64
        }
    }
}

/// Arithmetic mean latency in milliseconds. Zero for an empty slice.
pub fn mean_latency_ms(samples: &[LatencySample]) -> f64 {
    if samples.is_empty() {
        return 0.;
    }

    let millis: Vec<f64> = samples.iter().map(LatencySample::latency_ms).collect();
    statistical::mean(&millis)
}

/// Value at rank ⌈percent/100 × N⌉ of an ascending slice. Zero for an empty slice.
pub fn nearest_rank(sorted: &[Duration], percent: u32) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }

    let n = sorted.len();
    let rank = (percent.min(100) as usize * n).div_ceil(100).max(1);
    sorted[rank - 1]
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Benchmark Results:")?;
        writeln!(f, "Total Requests: {}", self.total_requests)?;
        if self.error_count > 0 {
            writeln!(
                f,
                "Failed Requests: {} ({:.2}%)",
                self.error_count,
                self.error_rate() * 100.
            )?;
        }
        writeln!(f, "Average Latency: {:.2}ms", self.avg_latency_ms)?;
        writeln!(f, "P50 Latency: {:.2}ms", self.p50_latency_ms)?;
        writeln!(f, "P95 Latency: {:.2}ms", self.p95_latency_ms)?;
        writeln!(f, "P99 Latency: {:.2}ms", self.p99_latency_ms)?;
        write!(f, "Requests per Second: {:.2}", self.requests_per_second)
    }
}
