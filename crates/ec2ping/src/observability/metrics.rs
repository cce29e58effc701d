//! Round Metrics
//!
//! Recorded through the `metrics` facade; the embedding process decides whether a
//! recorder is installed.
//!
//! Metrics tracked:
//! - `ec2ping_rounds_total` - counter of discovery rounds by outcome
//! - `ec2ping_round_duration_seconds` - histogram of round latency
//! - `ec2ping_candidate_endpoints` - gauge of endpoints produced by the last round
//! - `ec2ping_matched_hosts` - gauge of hosts matched by the last round

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Register descriptions for all metrics
pub fn register_metric_descriptions() {
    describe_counter!("ec2ping_rounds_total", "Total number of discovery rounds");
    describe_histogram!(
        "ec2ping_round_duration_seconds",
        "Duration of discovery rounds in seconds"
    );
    describe_gauge!(
        "ec2ping_candidate_endpoints",
        "Candidate endpoints produced by the last round"
    );
    describe_gauge!("ec2ping_matched_hosts", "Hosts matched by the last round");
}

/// Record a successful round
pub fn record_round_success(hosts: usize, endpoints: usize, duration: Duration) {
    counter!("ec2ping_rounds_total", "outcome" => "success").increment(1);
    histogram!("ec2ping_round_duration_seconds").record(duration.as_secs_f64());
    gauge!("ec2ping_matched_hosts").set(hosts as f64);
    gauge!("ec2ping_candidate_endpoints").set(endpoints as f64);
}

/// Record a failed round
pub fn record_round_failure(duration: Duration) {
    counter!("ec2ping_rounds_total", "outcome" => "failure").increment(1);
    histogram!("ec2ping_round_duration_seconds").record(duration.as_secs_f64());
    gauge!("ec2ping_candidate_endpoints").set(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_recording() {
        register_metric_descriptions();
        record_round_success(3, 153, Duration::from_millis(120));
        record_round_failure(Duration::from_millis(30));
    }
}
