// Metric names and registration
// Process-wide observability state; never read back for coordination.

pub const DISPATCH_TOTAL: &str = "describer_dispatch_total";
pub const ADMISSION_BLOCKED: &str = "describer_admission_blocked";
pub const IN_FLIGHT_JOBS: &str = "describer_in_flight_jobs";
pub const JOBS_TIMED_OUT_TOTAL: &str = "describer_jobs_timed_out_total";
pub const JOBS_FAILED_STALE_TOTAL: &str = "describer_jobs_failed_stale_total";
pub const JOBS_RETRIED_TOTAL: &str = "describer_jobs_retried_total";
pub const JOBS_CREATED_TOTAL: &str = "describer_jobs_created_total";
pub const RESULTS_APPLIED_TOTAL: &str = "describer_results_applied_total";
pub const SEQUENCER_TRANSITIONS_TOTAL: &str = "describer_sequencer_transitions_total";

/// `ceiling` label values of the admission gauge
pub const CEILING_QUEUE: &str = "queue";
pub const CEILING_THROUGHPUT: &str = "throughput";

/// Register descriptions with whichever recorder the binary installed
pub fn describe_metrics() {
    metrics::describe_counter!(
        DISPATCH_TOTAL,
        "Dispatch attempts by connector, outcome and failure reason"
    );
    metrics::describe_gauge!(
        ADMISSION_BLOCKED,
        "1 while the named admission ceiling blocks dispatch, else 0"
    );
    metrics::describe_gauge!(
        IN_FLIGHT_JOBS,
        "Jobs handed to a backend and not yet terminal, per resource type"
    );
    metrics::describe_counter!(JOBS_TIMED_OUT_TOTAL, "Running jobs swept to TIMEOUT");
    metrics::describe_counter!(
        JOBS_FAILED_STALE_TOTAL,
        "CREATED/QUEUED jobs failed for exceeding their discovery interval"
    );
    metrics::describe_counter!(JOBS_RETRIED_TOTAL, "FAILED/TIMEOUT jobs moved back to CREATED");
    metrics::describe_counter!(JOBS_CREATED_TOTAL, "Describe jobs created by trigger type");
    metrics::describe_counter!(RESULTS_APPLIED_TOTAL, "Worker reports applied by status");
    metrics::describe_counter!(
        SEQUENCER_TRANSITIONS_TOTAL,
        "Job sequencer records leaving WaitingForDependencies"
    );
}
