// Dispatch cycle: admission-gated, per-type-limited fan-out of CREATED jobs

use crate::application::admission::AdmissionController;
use crate::application::dispatcher::{DispatchOutcome, Dispatcher};
use crate::application::runtime::PeriodicTask;
use crate::config::SchedulerConfig;
use crate::domain::{Connection, DescribeJob, DiscoveryType};
use crate::error::Result;
use crate::port::{ConnectionProvider, DescribeJobStore};
use crate::telemetry::IN_FLIGHT_JOBS;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What one cycle did; in-memory only, discarded after logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub admission_denied: bool,
    pub candidates: usize,
    pub over_ceiling: usize,
    pub connection_skipped: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Shuffle candidates, then greedily admit each one whose resource type stays
/// within its ceiling counting both current in-flight jobs and jobs already
/// admitted this cycle. Returns the admitted jobs and the rejected count.
pub fn admit_within_ceilings(
    mut candidates: Vec<DescribeJob>,
    in_flight: &HashMap<String, u64>,
    config: &SchedulerConfig,
) -> (Vec<DescribeJob>, usize) {
    candidates.shuffle(&mut rand::thread_rng());

    let mut admitted_per_type: HashMap<String, u64> = HashMap::new();
    let mut admitted = Vec::with_capacity(candidates.len());
    let mut rejected = 0;

    for job in candidates {
        let current = in_flight.get(&job.resource_type).copied().unwrap_or(0);
        let this_cycle = admitted_per_type.entry(job.resource_type.clone()).or_insert(0);
        let ceiling = u64::from(config.ceiling_for(&job.resource_type));

        if current + *this_cycle + 1 > ceiling {
            rejected += 1;
            continue;
        }
        *this_cycle += 1;
        admitted.push(job);
    }

    (admitted, rejected)
}

/// Organization-wide cost jobs run from the manager account even when the
/// connection itself is not enabled.
fn dispatchable(job: &DescribeJob, connection: &Connection) -> bool {
    connection.is_enabled()
        || (job.discovery_type == DiscoveryType::Cost && connection.is_organization_manager())
}

pub struct DispatchCycle {
    admission: AdmissionController,
    store: Arc<dyn DescribeJobStore>,
    connections: Arc<dyn ConnectionProvider>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<SchedulerConfig>,
}

impl DispatchCycle {
    pub fn new(
        admission: AdmissionController,
        store: Arc<dyn DescribeJobStore>,
        connections: Arc<dyn ConnectionProvider>,
        dispatcher: Arc<Dispatcher>,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            admission,
            store,
            connections,
            dispatcher,
            config,
        }
    }

    /// Run a single cycle to completion, including every spawned dispatch.
    pub async fn run_once(&self) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        let decision = self.admission.evaluate().await?;
        if !decision.admits() {
            report.admission_denied = true;
            return Ok(report);
        }

        let candidates = self
            .store
            .random_created_jobs(self.config.max_concurrent_calls)
            .await?;
        report.candidates = candidates.len();
        if candidates.is_empty() {
            debug!("No CREATED jobs to dispatch");
            return Ok(report);
        }

        let in_flight = self.store.in_flight_counts().await?;
        for (resource_type, count) in &in_flight {
            metrics::gauge!(IN_FLIGHT_JOBS, "resource_type" => resource_type.clone())
                .set(*count as f64);
        }

        let (admitted, rejected) = admit_within_ceilings(candidates, &in_flight, &self.config);
        report.over_ceiling = rejected;

        let ready = self.resolve_connections(admitted, &mut report).await;

        let mut tasks = JoinSet::new();
        for (job, connection) in ready {
            let dispatcher = Arc::clone(&self.dispatcher);
            tasks.spawn(async move { dispatcher.dispatch(&job, &connection).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(DispatchOutcome::Delivered { .. }) => report.delivered += 1,
                Ok(DispatchOutcome::Failed { .. }) => report.failed += 1,
                Ok(DispatchOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "Dispatch task panicked");
                }
            }
        }

        info!(
            candidates = report.candidates,
            over_ceiling = report.over_ceiling,
            connection_skipped = report.connection_skipped,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            backend = self.dispatcher.backend(),
            "Dispatch cycle finished"
        );
        Ok(report)
    }

    /// Look up each admitted job's connection once per cycle and drop jobs
    /// whose connection is missing, unreachable or disabled.
    async fn resolve_connections(
        &self,
        jobs: Vec<DescribeJob>,
        report: &mut DispatchReport,
    ) -> Vec<(DescribeJob, Connection)> {
        let mut cache: HashMap<String, Option<Connection>> = HashMap::new();
        let mut ready = Vec::with_capacity(jobs.len());

        for job in jobs {
            if !cache.contains_key(&job.connection_id) {
                match self.connections.get_connection(&job.connection_id).await {
                    Ok(found) => {
                        cache.insert(job.connection_id.clone(), found);
                    }
                    Err(e) => {
                        warn!(
                            job_id = job.id,
                            connection_id = %job.connection_id,
                            error = %e,
                            "Connection lookup failed, skipping job"
                        );
                        report.connection_skipped += 1;
                        continue;
                    }
                }
            }

            match cache.get(&job.connection_id).cloned().flatten() {
                Some(connection) if dispatchable(&job, &connection) => {
                    ready.push((job, connection));
                }
                Some(_) => {
                    debug!(
                        job_id = job.id,
                        connection_id = %job.connection_id,
                        "Connection disabled, skipping job"
                    );
                    report.connection_skipped += 1;
                }
                None => {
                    warn!(
                        job_id = job.id,
                        connection_id = %job.connection_id,
                        "Connection not found, skipping job"
                    );
                    report.connection_skipped += 1;
                }
            }
        }

        ready
    }
}

#[async_trait]
impl PeriodicTask for DispatchCycle {
    fn name(&self) -> &'static str {
        "dispatch-cycle"
    }

    fn interval(&self) -> Duration {
        self.config.dispatch_interval()
    }

    async fn tick(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}
