// Domain Layer - Pure business logic and entities

pub mod connection;
pub mod downstream;
pub mod error;
pub mod job;
pub mod payload;
pub mod resource_type;
pub mod sequencer;

// Re-exports
pub use connection::{Connection, HealthState, LifecycleState, OrganizationMembership};
pub use downstream::{BenchmarkJobStatus, RunnerStatus};
pub use error::DomainError;
pub use job::{
    status_set, Connector, DescribeJob, DescribeJobStatus, DiscoveryType, JobCompletion, JobId,
    NewDescribeJob, TriggerType,
};
pub use payload::{DescribeJobResult, DescribeWorkerPayload, WorkerEndpoints};
pub use resource_type::{ResourceTypeCatalog, ResourceTypeSpec};
pub use sequencer::{
    DependencySource, JobSequencer, NewJobSequencer, NextJob, SequencerId, SequencerStatus,
};
