use crate::aggregator::StatsAggregator;
use crate::transport::{Transport, TransportError};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parkbench_core::{LatencySample, Outcome, FAILURE_WARN_EVERY};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
#[allow(unused)]
use tracing::{debug, trace, warn};

#[cfg(feature = "metrics")]
const LATENCY_LABEL: &str = "parkbench_latency";
#[cfg(feature = "metrics")]
const SUCCESS_LABEL: &str = "parkbench_success";
#[cfg(feature = "metrics")]
const ERROR_LABEL: &str = "parkbench_error";

/// State every worker shares: the aggregator and the optional run-wide rate limit.
#[derive(Clone)]
pub(crate) struct RequestHook {
    pub stats: Arc<StatsAggregator>,
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RequestHook {
    pub fn new(stats: Arc<StatsAggregator>, max_rps: Option<NonZeroU32>) -> Self {
        #[cfg(feature = "metrics")]
        {
            metrics::describe_histogram!(LATENCY_LABEL, metrics::Unit::Nanoseconds, "");
            metrics::describe_counter!(SUCCESS_LABEL, "Successful lookups");
            metrics::describe_counter!(ERROR_LABEL, "Failed lookups");
        }

        Self {
            stats,
            limiter: max_rps.map(|rps| Arc::new(rate_limiter(rps))),
        }
    }

    /// Issue one timed lookup and record it. Fatal errors are returned without a sample.
    pub async fn query<T: Transport>(
        &self,
        transport: &mut T,
        key: &str,
    ) -> Result<Outcome, TransportError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let start = Instant::now();
        let outcome = transport.query(key).await?;
        let elapsed = start.elapsed();

        self.stats.append(LatencySample::new(elapsed, &outcome));

        #[cfg(feature = "metrics")]
        {
            metrics::histogram!(LATENCY_LABEL).record(elapsed.as_nanos() as f64);
            if outcome.is_success() {
                metrics::counter!(SUCCESS_LABEL).increment(1);
            } else {
                metrics::counter!(ERROR_LABEL).increment(1);
            }
        }

        if let Outcome::Failure(failure) = &outcome {
            debug!("Lookup of {key:?} failed: {failure}");
            let failed = self.stats.error_count();
            if failed == 1 || failed % FAILURE_WARN_EVERY == 0 {
                warn!("{failed} lookups failed so far, latest {key:?}: {failure}");
            }
        }

        Ok(outcome)
    }
}

fn rate_limiter(max_rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(max_rps).allow_burst(NonZeroU32::MIN))
}
