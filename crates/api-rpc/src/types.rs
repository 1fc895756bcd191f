//! RPC Request/Response Types
//!
//! `describe.result.v1` takes the worker report (`DescribeJobResult`) as-is.

use describer_core::application::ManualTriggerReport;
use describer_core::domain::{JobId, NextJob};
use serde::{Deserialize, Serialize};

/// describe.result.v1 - Worker status report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub job_id: JobId,
    /// False when the report did not match the job's current status
    pub applied: bool,
}

/// describe.job.v1 - Get a job
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_id: JobId,
}

/// describe.trigger.v1 - Manual discovery
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub connection_id: String,
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub cost_full_discovery: bool,
    /// Downstream job to run once every created job resolved
    #[serde(default)]
    pub next_job: Option<NextJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedType {
    pub resource_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub job_ids: Vec<JobId>,
    pub in_progress: Vec<String>,
    pub skipped: Vec<SkippedType>,
    pub sequencer_id: Option<i64>,
}

impl From<ManualTriggerReport> for TriggerResponse {
    fn from(report: ManualTriggerReport) -> Self {
        Self {
            job_ids: report.job_ids,
            in_progress: report.in_progress,
            skipped: report
                .skipped
                .into_iter()
                .map(|(resource_type, reason)| SkippedType {
                    resource_type,
                    reason: reason.to_string(),
                })
                .collect(),
            sequencer_id: report.sequencer_id,
        }
    }
}
