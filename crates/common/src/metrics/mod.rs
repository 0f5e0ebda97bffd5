//! Metrics and observability utilities
//!
//! Provides Prometheus-style metrics for workflow runs, individual steps,
//! the data engines and external collaborators.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ESR Orchestrator metrics
pub const METRICS_PREFIX: &str = "esr";

/// Buckets for whole-run latency (in seconds)
pub const RUN_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s - classifier-backed runs
];

/// Register all metric descriptions
pub fn register_metrics() {
    // HTTP metrics
    describe_counter!(
        format!("{}_http_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    // Run metrics
    describe_counter!(
        format!("{}_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total workflow runs by discipline and status"
    );

    describe_histogram!(
        format!("{}_run_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Workflow run latency in seconds"
    );

    // Step metrics
    describe_histogram!(
        format!("{}_step_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Step latency in seconds"
    );

    describe_counter!(
        format!("{}_step_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Steps that produced an error marker"
    );

    // Data engine metrics
    describe_counter!(
        format!("{}_graph_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Relationship graph queries"
    );

    describe_counter!(
        format!("{}_similarity_searches_total", METRICS_PREFIX),
        Unit::Count,
        "Similarity index searches"
    );

    // External collaborators
    describe_counter!(
        format!("{}_external_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Calls to external collaborators by service and status"
    );

    describe_counter!(
        format!("{}_audit_write_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Audit entries that could not be written"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record run metrics
pub struct RunMetrics {
    start: Instant,
    discipline: String,
}

impl RunMetrics {
    /// Start tracking a run
    pub fn start(discipline: &str) -> Self {
        Self {
            start: Instant::now(),
            discipline: discipline.to_string(),
        }
    }

    /// Elapsed time since the run started, in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Record run completion
    pub fn finish(self, status: &str) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_runs_total", METRICS_PREFIX),
            "discipline" => self.discipline.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_run_duration_seconds", METRICS_PREFIX),
            "discipline" => self.discipline
        )
        .record(duration);
    }
}

/// Helper to record step metrics
pub fn record_step(step: &str, duration_secs: f64, failed: bool) {
    histogram!(
        format!("{}_step_duration_seconds", METRICS_PREFIX),
        "step" => step.to_string()
    )
    .record(duration_secs);

    if failed {
        counter!(
            format!("{}_step_failures_total", METRICS_PREFIX),
            "step" => step.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a relationship graph query
pub fn record_graph_query(relation: &str) {
    counter!(
        format!("{}_graph_queries_total", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .increment(1);
}

/// Helper to record a similarity search
pub fn record_similarity_search(result_count: usize) {
    counter!(format!("{}_similarity_searches_total", METRICS_PREFIX)).increment(1);

    tracing::trace!(result_count, "Similarity search recorded");
}

/// Helper to record an external collaborator call
pub fn record_external_call(service: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_external_calls_total", METRICS_PREFIX),
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record an audit write failure
pub fn record_audit_failure() {
    counter!(format!("{}_audit_write_failures_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record an HTTP request
pub fn record_http_request(endpoint: &str, status: u16) {
    counter!(
        format!("{}_http_requests_total", METRICS_PREFIX),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
