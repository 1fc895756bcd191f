//! RPC Method Handlers

use crate::error::to_rpc_error;
use crate::types::{JobRequest, ResultResponse, TriggerRequest, TriggerResponse};
use describer_core::application::{ReconcileOutcome, ResultReconciler, SchedulingPolicy};
use describer_core::domain::{DescribeJob, DescribeJobResult};
use describer_core::error::AppError;
use describer_core::port::DescribeJobStore;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    reconciler: Arc<ResultReconciler>,
    store: Arc<dyn DescribeJobStore>,
    scheduling: Arc<SchedulingPolicy>,
}

impl RpcHandler {
    pub fn new(
        reconciler: Arc<ResultReconciler>,
        store: Arc<dyn DescribeJobStore>,
        scheduling: Arc<SchedulingPolicy>,
    ) -> Self {
        Self {
            reconciler,
            store,
            scheduling,
        }
    }

    /// describe.result.v1
    pub async fn result(&self, params: DescribeJobResult) -> Result<ResultResponse, ErrorObjectOwned> {
        let outcome = self.reconciler.apply(&params).await.map_err(to_rpc_error)?;

        Ok(ResultResponse {
            job_id: params.job_id,
            applied: outcome == ReconcileOutcome::Applied,
        })
    }

    /// describe.job.v1
    pub async fn job(&self, params: JobRequest) -> Result<DescribeJob, ErrorObjectOwned> {
        self.store
            .get_job(params.job_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("job {}", params.job_id))))
    }

    /// describe.trigger.v1
    pub async fn trigger(&self, params: TriggerRequest) -> Result<TriggerResponse, ErrorObjectOwned> {
        let report = self
            .scheduling
            .trigger_manual(
                &params.connection_id,
                &params.resource_types,
                params.cost_full_discovery,
                params.next_job,
            )
            .await
            .map_err(to_rpc_error)?;

        info!(
            connection_id = %params.connection_id,
            created = report.job_ids.len(),
            "Manual trigger via RPC"
        );
        Ok(report.into())
    }
}
