// Describe Job Domain Model

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Describe job ID (auto-increment in the job store)
pub type JobId = i64;

/// Describe job lifecycle status
///
/// CREATED -> QUEUED -> IN_PROGRESS -> {SUCCEEDED, FAILED, TIMEOUT, CANCELED}.
/// OLD_RESOURCE_DELETION and REMOVING_RESOURCES are side states of a running
/// job whose dispatch is paired with stale-resource cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DescribeJobStatus {
    Created,
    Queued,
    InProgress,
    OldResourceDeletion,
    RemovingResources,
    Succeeded,
    Failed,
    Timeout,
    Canceled,
}

/// Named status sets shared by the scheduler, the reconcilers and the store.
///
/// Every `status IN (...)` filter in the job store is rendered from one of
/// these, so "what counts as non-terminal" cannot drift between components.
pub mod status_set {
    use super::DescribeJobStatus::{self, *};

    /// Final statuses; only the retry reconciler moves a job out of FAILED/TIMEOUT
    pub const TERMINAL: &[DescribeJobStatus] = &[Succeeded, Failed, Timeout, Canceled];

    /// A job in any of these blocks scheduling another job for the same pair
    pub const NON_TERMINAL: &[DescribeJobStatus] = &[
        Created,
        Queued,
        InProgress,
        OldResourceDeletion,
        RemovingResources,
    ];

    /// Handed to a backend and counted against the per-type ceiling
    pub const IN_FLIGHT: &[DescribeJobStatus] =
        &[Queued, InProgress, OldResourceDeletion, RemovingResources];

    /// Claimed by a worker; swept to TIMEOUT when silent
    pub const RUNNING: &[DescribeJobStatus] = &[InProgress, OldResourceDeletion, RemovingResources];

    /// Not yet picked up by a worker
    pub const PENDING: &[DescribeJobStatus] = &[Created, Queued];

    /// Eligible for the retry reconciler
    pub const RETRYABLE: &[DescribeJobStatus] = &[Failed, Timeout];
}

impl DescribeJobStatus {
    pub const ALL: [DescribeJobStatus; 9] = [
        DescribeJobStatus::Created,
        DescribeJobStatus::Queued,
        DescribeJobStatus::InProgress,
        DescribeJobStatus::OldResourceDeletion,
        DescribeJobStatus::RemovingResources,
        DescribeJobStatus::Succeeded,
        DescribeJobStatus::Failed,
        DescribeJobStatus::Timeout,
        DescribeJobStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DescribeJobStatus::Created => "CREATED",
            DescribeJobStatus::Queued => "QUEUED",
            DescribeJobStatus::InProgress => "IN_PROGRESS",
            DescribeJobStatus::OldResourceDeletion => "OLD_RESOURCE_DELETION",
            DescribeJobStatus::RemovingResources => "REMOVING_RESOURCES",
            DescribeJobStatus::Succeeded => "SUCCEEDED",
            DescribeJobStatus::Failed => "FAILED",
            DescribeJobStatus::Timeout => "TIMEOUT",
            DescribeJobStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        status_set::TERMINAL.contains(self)
    }

    /// Whether `self -> next` is a valid lifecycle transition.
    ///
    /// Terminal-to-same-terminal is allowed so that a replayed worker report
    /// overwrites the same fields; terminal-to-anything-else only via retry.
    pub fn can_transition_to(self, next: DescribeJobStatus) -> bool {
        use DescribeJobStatus::*;
        match (self, next) {
            (Created | Queued, Queued | InProgress) => true,
            (InProgress, OldResourceDeletion | RemovingResources) => true,
            (OldResourceDeletion, RemovingResources) => true,
            (Failed | Timeout, Created) => true,
            (from, to) if !from.is_terminal() && to.is_terminal() => true,
            (from, to) => from.is_terminal() && from == to,
        }
    }

    /// Statuses a job may currently hold for `next` to be applied
    pub fn sources_for(next: DescribeJobStatus) -> Vec<DescribeJobStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }
}

impl std::fmt::Display for DescribeJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescribeJobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownValue {
                kind: "describe job status",
                value: s.to_string(),
            })
    }
}

/// Cloud provider of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    Aws,
    Azure,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::Aws => "aws",
            Connector::Azure => "azure",
        }
    }
}

impl std::fmt::Display for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Connector {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Connector::Aws),
            "azure" => Ok(Connector::Azure),
            _ => Err(DomainError::UnknownValue {
                kind: "connector",
                value: s.to_string(),
            }),
        }
    }
}

/// How often a resource type is re-discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryType {
    Fast,
    Full,
    Cost,
}

impl DiscoveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryType::Fast => "Fast",
            DiscoveryType::Full => "Full",
            DiscoveryType::Cost => "Cost",
        }
    }
}

impl std::fmt::Display for DiscoveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Fast" => Ok(DiscoveryType::Fast),
            "Full" => Ok(DiscoveryType::Full),
            "Cost" => Ok(DiscoveryType::Cost),
            _ => Err(DomainError::UnknownValue {
                kind: "discovery type",
                value: s.to_string(),
            }),
        }
    }
}

/// Why a job was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    Scheduled,
    Manual,
    InitialDiscovery,
    CostFullDiscovery,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Scheduled => "Scheduled",
            TriggerType::Manual => "Manual",
            TriggerType::InitialDiscovery => "InitialDiscovery",
            TriggerType::CostFullDiscovery => "CostFullDiscovery",
        }
    }

    /// Manual-class triggers go to the manual topic of the durable queue
    pub fn is_manual(&self) -> bool {
        matches!(self, TriggerType::Manual | TriggerType::CostFullDiscovery)
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(TriggerType::Scheduled),
            "Manual" => Ok(TriggerType::Manual),
            "InitialDiscovery" => Ok(TriggerType::InitialDiscovery),
            "CostFullDiscovery" => Ok(TriggerType::CostFullDiscovery),
            _ => Err(DomainError::UnknownValue {
                kind: "trigger type",
                value: s.to_string(),
            }),
        }
    }
}

/// Describe job entity: one "enumerate resource type X for connection Y" unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeJob {
    // Identity
    pub id: JobId,
    pub parent_id: Option<JobId>,
    pub nats_sequence_number: Option<u64>,

    // Target
    pub connection_id: String,
    pub account_id: String,
    pub connector: Connector,
    pub resource_type: String,

    // Classification
    pub discovery_type: DiscoveryType,
    pub trigger_type: TriggerType,

    // Lifecycle
    pub status: DescribeJobStatus,
    pub retry_count: i32,
    pub error_code: Option<String>,
    pub failure_message: Option<String>,
    pub described_resource_count: i64,

    // Timestamps (epoch ms)
    pub created_at: i64,
    pub queued_at: Option<i64>,
    pub in_progressed_at: Option<i64>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl DescribeJob {
    /// Milliseconds since the job was created
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.created_at
    }
}

/// Insert model for a describe job (status is always CREATED)
#[derive(Debug, Clone, PartialEq)]
pub struct NewDescribeJob {
    pub parent_id: Option<JobId>,
    pub connection_id: String,
    pub account_id: String,
    pub connector: Connector,
    pub resource_type: String,
    pub discovery_type: DiscoveryType,
    pub trigger_type: TriggerType,
}

impl NewDescribeJob {
    pub fn new(
        connection: &crate::domain::Connection,
        resource_type: impl Into<String>,
        discovery_type: DiscoveryType,
        trigger_type: TriggerType,
    ) -> Self {
        Self {
            parent_id: None,
            connection_id: connection.id.clone(),
            account_id: connection.account_id.clone(),
            connector: connection.connector,
            resource_type: resource_type.into(),
            discovery_type,
            trigger_type,
        }
    }
}

/// Terminal report applied to a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub status: DescribeJobStatus,
    pub error_code: Option<String>,
    pub failure_message: Option<String>,
    pub described_resource_count: i64,
}
