//! Shared harness: SQLite in memory, a manual clock and scripted adapters

#![allow(dead_code)]

use describer_core::application::{
    AdmissionController, DispatchCycle, Dispatcher, ResultReconciler, SchedulingPolicy,
};
use describer_core::domain::{
    Connection, Connector, DescribeJobResult, DescribeJobStatus, HealthState, LifecycleState,
    ResourceTypeCatalog, WorkerEndpoints,
};
use describer_core::port::connection_provider::mocks::StaticConnectionProvider;
use describer_core::port::delivery::mocks::RecordingDelivery;
use describer_core::port::time_provider::mocks::ManualClock;
use describer_core::SchedulerConfig;
use describer_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use sqlx::SqlitePool;
use std::sync::Arc;

/// 2024-01-01T00:00:00Z
pub const NOW: i64 = 1_704_067_200_000;
pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 60 * MINUTE;

pub struct Harness {
    pub pool: SqlitePool,
    pub store: Arc<SqliteJobStore>,
    pub clock: Arc<ManualClock>,
    pub connections: Arc<StaticConnectionProvider>,
    pub delivery: Arc<RecordingDelivery>,
    pub config: Arc<SchedulerConfig>,
}

impl Harness {
    pub async fn new(config: SchedulerConfig, connections: Vec<Connection>) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        Self {
            store: Arc::new(SqliteJobStore::new(pool.clone())),
            pool,
            clock: Arc::new(ManualClock::new(NOW)),
            connections: Arc::new(StaticConnectionProvider::new(connections)),
            delivery: Arc::new(RecordingDelivery::new()),
            config: Arc::new(config),
        }
    }

    pub fn admission(&self) -> AdmissionController {
        AdmissionController::new(self.store.clone(), self.clock.clone(), self.config.clone())
    }

    pub fn dispatch_cycle(&self) -> DispatchCycle {
        let dispatcher = Arc::new(Dispatcher::new(
            self.store.clone(),
            self.delivery.clone(),
            self.clock.clone(),
            WorkerEndpoints::default(),
        ));
        DispatchCycle::new(
            self.admission(),
            self.store.clone(),
            self.connections.clone(),
            dispatcher,
            self.config.clone(),
        )
    }

    pub fn scheduling(&self) -> Arc<SchedulingPolicy> {
        Arc::new(SchedulingPolicy::new(
            self.store.clone(),
            self.store.clone(),
            self.connections.clone(),
            Arc::new(ResourceTypeCatalog::builtin()),
            self.clock.clone(),
            self.config.clone(),
        ))
    }

    pub fn reconciler(&self) -> Arc<ResultReconciler> {
        Arc::new(ResultReconciler::new(self.store.clone(), self.clock.clone()))
    }
}

pub fn aws_connection(id: &str) -> Connection {
    Connection {
        id: id.to_string(),
        account_id: format!("acct-{id}"),
        connector: Connector::Aws,
        lifecycle_state: LifecycleState::Onboard,
        health_state: HealthState::Healthy,
        credential_cipher_text: "cipher".to_string(),
        tenant_id: None,
        organization: None,
        supported_resource_types: None,
    }
}

pub fn report(job_id: i64, status: DescribeJobStatus) -> DescribeJobResult {
    DescribeJobResult {
        job_id,
        parent_job_id: None,
        status,
        error: None,
        error_code: None,
        described_resource_ids: Vec::new(),
    }
}
