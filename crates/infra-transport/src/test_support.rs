// Shared fixtures for transport tests

use describer_core::domain::{
    Connector, DescribeJob, DescribeJobStatus, DescribeWorkerPayload, DiscoveryType, TriggerType,
};

pub(crate) fn job() -> DescribeJob {
    DescribeJob {
        id: 7,
        parent_id: None,
        nats_sequence_number: None,
        connection_id: "c1".to_string(),
        account_id: "sub-1".to_string(),
        connector: Connector::Azure,
        resource_type: "Microsoft.Compute/virtualMachines".to_string(),
        discovery_type: DiscoveryType::Fast,
        trigger_type: TriggerType::Scheduled,
        status: DescribeJobStatus::Queued,
        retry_count: 0,
        error_code: None,
        failure_message: None,
        described_resource_count: 0,
        created_at: 1_700_000_000_000,
        queued_at: None,
        in_progressed_at: None,
        updated_at: 1_700_000_000_000,
        deleted_at: None,
    }
}

pub(crate) fn payload(job: &DescribeJob) -> DescribeWorkerPayload {
    DescribeWorkerPayload {
        job_id: job.id,
        connection_id: job.connection_id.clone(),
        account_id: job.account_id.clone(),
        resource_type: job.resource_type.clone(),
        described_at: job.created_at,
        source_type: job.connector,
        credential_cipher_text: "cipher".to_string(),
        trigger_type: job.trigger_type,
        retry_counter: job.retry_count,
        job_endpoint: String::new(),
        deliver_endpoint: String::new(),
        endpoint_auth: false,
    }
}
