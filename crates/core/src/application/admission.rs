// Admission control: global backpressure checked before every dispatch cycle

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::port::{DescribeJobStore, TimeProvider};
use crate::telemetry::{ADMISSION_BLOCKED, CEILING_QUEUE, CEILING_THROUGHPUT};
use std::sync::Arc;
use tracing::{info, warn};

/// Counts behind one admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// QUEUED jobs created inside the queue window
    pub queued_recently: u64,
    /// Non-CREATED jobs touched inside the throughput window
    pub touched_recently: u64,
    pub queue_blocked: bool,
    pub throughput_blocked: bool,
}

impl AdmissionDecision {
    pub fn admits(&self) -> bool {
        !self.queue_blocked && !self.throughput_blocked
    }
}

pub struct AdmissionController {
    store: Arc<dyn DescribeJobStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: Arc<SchedulerConfig>,
}

impl AdmissionController {
    pub fn new(
        store: Arc<dyn DescribeJobStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            store,
            time_provider,
            config,
        }
    }

    /// Evaluate both ceilings and publish one gauge per ceiling.
    ///
    /// A failed count query is returned as an error: callers must treat it
    /// as a denial.
    pub async fn evaluate(&self) -> Result<AdmissionDecision> {
        let now = self.time_provider.now_millis();

        let queued_recently = self
            .store
            .count_queued_created_since(now - self.config.queue_window_millis())
            .await?;
        let touched_recently = self
            .store
            .count_dispatched_updated_since(now - self.config.throughput_window_millis())
            .await?;

        let decision = AdmissionDecision {
            queued_recently,
            touched_recently,
            queue_blocked: queued_recently > self.config.queue_ceiling,
            throughput_blocked: touched_recently > self.config.throughput_ceiling,
        };

        metrics::gauge!(ADMISSION_BLOCKED, "ceiling" => CEILING_QUEUE)
            .set(if decision.queue_blocked { 1.0 } else { 0.0 });
        metrics::gauge!(ADMISSION_BLOCKED, "ceiling" => CEILING_THROUGHPUT)
            .set(if decision.throughput_blocked { 1.0 } else { 0.0 });

        if decision.queue_blocked {
            warn!(
                queued = queued_recently,
                ceiling = self.config.queue_ceiling,
                "Admission blocked: too many queued jobs"
            );
        }
        if decision.throughput_blocked {
            warn!(
                touched = touched_recently,
                ceiling = self.config.throughput_ceiling,
                "Admission blocked: too many jobs in flight recently"
            );
        }
        if decision.admits() {
            info!(
                queued = queued_recently,
                touched = touched_recently,
                "Admission granted"
            );
        }

        Ok(decision)
    }
}
