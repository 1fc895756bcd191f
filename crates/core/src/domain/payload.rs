// Worker wire contracts
// Field names are consumed by external describer workers; keep them stable
// across every delivery backend.

use crate::domain::connection::Connection;
use crate::domain::job::{Connector, DescribeJob, DescribeJobStatus, JobId, TriggerType};
use serde::{Deserialize, Serialize};

/// Where workers report progress and deliver described resources
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerEndpoints {
    pub job_endpoint: String,
    pub deliver_endpoint: String,
    #[serde(default)]
    pub endpoint_auth: bool,
}

/// Invocation payload handed to a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeWorkerPayload {
    pub job_id: JobId,
    pub connection_id: String,
    pub account_id: String,
    pub resource_type: String,
    /// Epoch ms of the job's creation
    pub described_at: i64,
    pub source_type: Connector,
    pub credential_cipher_text: String,
    pub trigger_type: TriggerType,
    pub retry_counter: i32,
    pub job_endpoint: String,
    pub deliver_endpoint: String,
    pub endpoint_auth: bool,
}

impl DescribeWorkerPayload {
    pub fn build(job: &DescribeJob, connection: &Connection, endpoints: &WorkerEndpoints) -> Self {
        Self {
            job_id: job.id,
            connection_id: job.connection_id.clone(),
            account_id: job.account_id.clone(),
            resource_type: job.resource_type.clone(),
            described_at: job.created_at,
            source_type: job.connector,
            credential_cipher_text: connection.credential_cipher_text.clone(),
            trigger_type: job.trigger_type,
            retry_counter: job.retry_count,
            job_endpoint: endpoints.job_endpoint.clone(),
            deliver_endpoint: endpoints.deliver_endpoint.clone(),
            endpoint_auth: endpoints.endpoint_auth,
        }
    }
}

/// Status report sent back by a worker (RPC callback or queue message)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeJobResult {
    pub job_id: JobId,
    #[serde(default)]
    pub parent_job_id: Option<JobId>,
    pub status: DescribeJobStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub described_resource_ids: Vec<String>,
}

impl DescribeJobResult {
    pub fn described_resource_count(&self) -> i64 {
        self.described_resource_ids.len() as i64
    }

    /// Empty strings from workers are treated as absent
    pub fn error_message(&self) -> Option<String> {
        self.error.clone().filter(|e| !e.is_empty())
    }

    pub fn error_code(&self) -> Option<String> {
        self.error_code.clone().filter(|e| !e.is_empty())
    }
}
