//! Prometheus metrics for the dispatch engine.
//!
//! Counters:
//!
//! - `dispatch_jobs_total{outcome}`: fan-out jobs that completed or were dropped
//! - `dispatch_transitions_total{to}`: committed order transitions by target status
//! - `dispatch_assignment_conflicts_total`: self-accepts that lost the race
//!
//! The recorder is process-global. [`install_recorder`] tolerates being called
//! more than once (tests build several apps in one process) and then returns
//! `None`.

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use metrics::counter;

/// Installs the Prometheus recorder and describes every counter.
///
/// Returns `None` if a recorder is already installed.
#[must_use]
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_metrics();
            tracing::info!("Prometheus recorder installed");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder already initialized, skipping");
            None
        }
    }
}

fn register_metrics() {
    describe_counter!(
        "dispatch_jobs_total",
        "Fan-out jobs by outcome (completed, dropped)"
    );
    describe_counter!(
        "dispatch_transitions_total",
        "Committed order transitions by target status"
    );
    describe_counter!(
        "dispatch_assignment_conflicts_total",
        "Rider accepts that lost the assignment race"
    );
}

/// Records a committed transition into `to`.
pub fn record_transition(to: &'static str) {
    counter!("dispatch_transitions_total", "to" => to).increment(1);
}

/// Records a lost assignment race.
pub fn record_assignment_conflict() {
    counter!("dispatch_assignment_conflicts_total").increment(1);
}
