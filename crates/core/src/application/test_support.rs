// Shared fixtures for application tests

use crate::domain::{Connector, DescribeJob, DescribeJobStatus, DiscoveryType, TriggerType};

/// Fixed "now" for every ManualClock in these tests
pub const NOW: i64 = 1_700_000_000_000;

/// Fast AWS job for connection c1, created and touched a minute ago
pub fn job_in(status: DescribeJobStatus, resource_type: &str) -> DescribeJob {
    DescribeJob {
        id: 0,
        parent_id: None,
        nats_sequence_number: None,
        connection_id: "c1".to_string(),
        account_id: "acct-c1".to_string(),
        connector: Connector::Aws,
        resource_type: resource_type.to_string(),
        discovery_type: DiscoveryType::Fast,
        trigger_type: TriggerType::Scheduled,
        status,
        retry_count: 0,
        error_code: None,
        failure_message: None,
        described_resource_count: 0,
        created_at: NOW - 60_000,
        queued_at: None,
        in_progressed_at: None,
        updated_at: NOW - 60_000,
        deleted_at: None,
    }
}

/// CREATED job for a given connection
pub fn job_for(connection_id: &str, resource_type: &str) -> DescribeJob {
    DescribeJob {
        connection_id: connection_id.to_string(),
        account_id: format!("acct-{connection_id}"),
        ..job_in(DescribeJobStatus::Created, resource_type)
    }
}
