use std::time::Duration;
use thiserror::Error;

/// Result of a request which made it to the service and back.
///
/// Connection-level problems are not an `Outcome`; transports report those as fatal errors
/// which abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(RequestFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Application level failure of a single request. Recorded, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestFailure {
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("RPC failed with code {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("unable to read response: {0}")]
    Response(String),
}

/// A single observation of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub latency: Duration,
    pub success: bool,
}

impl LatencySample {
    pub fn new(latency: Duration, outcome: &Outcome) -> Self {
        Self {
            latency,
            success: outcome.is_success(),
        }
    }

    pub fn success(latency: Duration) -> Self {
        Self {
            latency,
            success: true,
        }
    }

    pub fn failure(latency: Duration) -> Self {
        Self {
            latency,
            success: false,
        }
    }

    pub fn latency_ms(&self) -> f64 {
        duration_ms(self.latency)
    }
}

/// Milliseconds as a float, computed from whole nanoseconds so that round millisecond values
/// stay exact.
pub fn duration_ms(dur: Duration) -> f64 {
    dur.as_nanos() as f64 / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_from_outcome() {
        let ok = LatencySample::new(Duration::from_millis(3), &Outcome::Success);
        assert!(ok.success);

        let failed = LatencySample::new(
            Duration::from_millis(3),
            &Outcome::Failure(RequestFailure::Status(404)),
        );
        assert!(!failed.success);
        assert_eq!(failed.latency_ms(), 3.);
    }

    #[test]
    fn millisecond_conversion_is_exact() {
        assert_eq!(duration_ms(Duration::from_millis(950)), 950.);
        assert_eq!(duration_ms(Duration::from_micros(1_500)), 1.5);
    }
}
