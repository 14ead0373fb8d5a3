mod live;

pub use live::{LiveReporter, LiveSink, LiveTick};

use crate::aggregator::StatsAggregator;
use parkbench_core::Summary;
use tracing::info;

/// Summarize everything the aggregator holds at this instant.
pub fn final_summary(stats: &StatsAggregator) -> Summary {
    let summary = stats.snapshot_all().summary();
    info!(
        total = summary.total_requests,
        errors = summary.error_count,
        rps = summary.requests_per_second,
        "Run finished in {}",
        humantime::format_duration(summary.elapsed)
    );
    summary
}
