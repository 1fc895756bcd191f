// Dispatcher: hands one job to the configured delivery backend

use crate::domain::{Connection, DescribeJob, DescribeWorkerPayload, WorkerEndpoints};
use crate::port::{DescribeDelivery, DescribeJobStore, TimeProvider};
use crate::telemetry::DISPATCH_TOTAL;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a single dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { sequence: Option<u64> },
    /// Backend rejected the job; it was marked FAILED with `error_code`
    Failed { error_code: String },
    /// Job left CREATED/QUEUED before delivery (another replica or a worker won)
    Skipped,
}

pub struct Dispatcher {
    store: Arc<dyn DescribeJobStore>,
    delivery: Arc<dyn DescribeDelivery>,
    time_provider: Arc<dyn TimeProvider>,
    endpoints: WorkerEndpoints,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn DescribeJobStore>,
        delivery: Arc<dyn DescribeDelivery>,
        time_provider: Arc<dyn TimeProvider>,
        endpoints: WorkerEndpoints,
    ) -> Self {
        Self {
            store,
            delivery,
            time_provider,
            endpoints,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.delivery.name()
    }

    /// Mark QUEUED, deliver, then record the outcome on the job.
    ///
    /// A failure to mark QUEUED is logged and the delivery still goes ahead;
    /// the timeout sweep is the backstop for that job.
    pub async fn dispatch(&self, job: &DescribeJob, connection: &Connection) -> DispatchOutcome {
        let now = self.time_provider.now_millis();
        match self.store.mark_queued(job.id, now).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = job.id, "Job no longer pending, skipping dispatch");
                return DispatchOutcome::Skipped;
            }
            Err(e) => {
                warn!(job_id = job.id, error = %e, "Failed to mark job QUEUED, dispatching anyway");
            }
        }

        let payload = DescribeWorkerPayload::build(job, connection, &self.endpoints);
        let connector = job.connector.as_str();

        match self.delivery.deliver(job, &payload).await {
            Ok(receipt) => {
                if let Some(sequence) = receipt.sequence {
                    if let Err(e) = self.store.set_sequence_number(job.id, sequence).await {
                        warn!(job_id = job.id, sequence, error = %e, "Failed to persist sequence number");
                    }
                }
                metrics::counter!(DISPATCH_TOTAL,
                    "connector" => connector,
                    "outcome" => "success",
                    "reason" => "none"
                )
                .increment(1);
                info!(
                    job_id = job.id,
                    connection_id = %job.connection_id,
                    resource_type = %job.resource_type,
                    backend = self.delivery.name(),
                    "Job dispatched"
                );
                DispatchOutcome::Delivered {
                    sequence: receipt.sequence,
                }
            }
            Err(delivery_error) => {
                let error_code = delivery_error.error_code();
                let now = self.time_provider.now_millis();
                if let Err(e) = self
                    .store
                    .mark_dispatch_failed(job.id, error_code, &delivery_error.to_string(), now)
                    .await
                {
                    warn!(job_id = job.id, error = %e, "Failed to mark job FAILED after delivery error");
                }
                metrics::counter!(DISPATCH_TOTAL,
                    "connector" => connector,
                    "outcome" => "failure",
                    "reason" => delivery_error.reason()
                )
                .increment(1);
                warn!(
                    job_id = job.id,
                    connection_id = %job.connection_id,
                    resource_type = %job.resource_type,
                    error_code,
                    error = %delivery_error,
                    "Dispatch failed"
                );
                DispatchOutcome::Failed {
                    error_code: error_code.to_string(),
                }
            }
        }
    }
}
