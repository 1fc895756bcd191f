// Scheduling policy: decides per (connection, resource type) whether a new
// describe job is due and creates it.

use crate::application::runtime::PeriodicTask;
use crate::config::SchedulerConfig;
use crate::domain::{
    Connection, Connector, DescribeJob, DiscoveryType, DomainError, JobId, LifecycleState,
    NewDescribeJob, NewJobSequencer, NextJob, ResourceTypeCatalog, ResourceTypeSpec,
    DependencySource, TriggerType,
};
use crate::error::{AppError, Result};
use crate::port::{ConnectionProvider, DescribeJobStore, JobSequencerStore, TimeProvider};
use crate::telemetry::JOBS_CREATED_TOTAL;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Connection does not support the resource type
    Unsupported,
    /// Directory-wide type handled by another connection of the tenant
    NotCanonicalConnection,
    /// Organization-wide type handled by the organization manager account
    OrganizationMember,
    /// Connection unhealthy or not onboarded
    NotReady,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unsupported => "unsupported",
            SkipReason::NotCanonicalConnection => "not_canonical_connection",
            SkipReason::OrganizationMember => "organization_member",
            SkipReason::NotReady => "not_ready",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    Created(DescribeJob),
    /// Latest job is terminal but younger than the discovery interval
    NotDue,
    Skipped(SkipReason),
}

/// Tally of one scheduling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulingReport {
    pub created: usize,
    pub not_due: usize,
    pub in_progress: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Result of a manual trigger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualTriggerReport {
    pub job_ids: Vec<JobId>,
    /// Resource types declined because a job is still active
    pub in_progress: Vec<String>,
    /// Resource types skipped by policy, with the reason
    pub skipped: Vec<(String, &'static str)>,
    pub sequencer_id: Option<i64>,
}

/// How a single scheduling attempt was requested
#[derive(Debug, Clone, Copy)]
struct Request {
    trigger: TriggerType,
    /// Bypass the not-due check (never the in-progress check)
    force: bool,
}

pub struct SchedulingPolicy {
    store: Arc<dyn DescribeJobStore>,
    sequencers: Arc<dyn JobSequencerStore>,
    connections: Arc<dyn ConnectionProvider>,
    catalog: Arc<ResourceTypeCatalog>,
    time_provider: Arc<dyn TimeProvider>,
    config: Arc<SchedulerConfig>,
}

impl SchedulingPolicy {
    pub fn new(
        store: Arc<dyn DescribeJobStore>,
        sequencers: Arc<dyn JobSequencerStore>,
        connections: Arc<dyn ConnectionProvider>,
        catalog: Arc<ResourceTypeCatalog>,
        time_provider: Arc<dyn TimeProvider>,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            store,
            sequencers,
            connections,
            catalog,
            time_provider,
            config,
        }
    }

    /// Lowest healthy, enabled connection ID per Azure tenant
    fn canonical_tenant_connections(connections: &[Connection]) -> HashMap<String, String> {
        let mut canonical: HashMap<String, String> = HashMap::new();
        for conn in connections
            .iter()
            .filter(|c| c.connector == Connector::Azure && c.is_healthy() && c.is_enabled())
        {
            if let Some(tenant) = &conn.tenant_id {
                canonical
                    .entry(tenant.clone())
                    .and_modify(|id| {
                        if conn.id < *id {
                            *id = conn.id.clone();
                        }
                    })
                    .or_insert_with(|| conn.id.clone());
            }
        }
        canonical
    }

    /// Scheduled pass over every connection and applicable resource type.
    ///
    /// Per-pair failures are logged and counted; only a failed connection
    /// listing aborts the pass.
    pub async fn run_once(&self) -> Result<SchedulingReport> {
        let connections = self.connections.list_connections().await?;
        let canonical = Self::canonical_tenant_connections(&connections);
        let mut report = SchedulingReport::default();

        for connection in &connections {
            for spec in self.catalog.for_connector(connection.connector) {
                let request = Request {
                    trigger: TriggerType::Scheduled,
                    force: false,
                };
                match self.schedule(connection, spec, &canonical, request).await {
                    Ok(ScheduleOutcome::Created(_)) => report.created += 1,
                    Ok(ScheduleOutcome::NotDue) => report.not_due += 1,
                    Ok(ScheduleOutcome::Skipped(_)) => report.skipped += 1,
                    Err(e) if e.is_job_in_progress() => report.in_progress += 1,
                    Err(e) => {
                        report.errors += 1;
                        warn!(
                            connection_id = %connection.id,
                            resource_type = %spec.name,
                            error = %e,
                            "Failed to schedule describe job"
                        );
                    }
                }
            }
        }

        info!(
            connections = connections.len(),
            created = report.created,
            not_due = report.not_due,
            in_progress = report.in_progress,
            skipped = report.skipped,
            errors = report.errors,
            "Scheduling pass finished"
        );
        Ok(report)
    }

    /// Create Manual (or CostFullDiscovery) jobs for one connection.
    ///
    /// An empty `resource_types` means every catalog type of the connector.
    /// With `next_job`, a sequencer is created over the new job IDs.
    pub async fn trigger_manual(
        &self,
        connection_id: &str,
        resource_types: &[String],
        cost_full: bool,
        next_job: Option<NextJob>,
    ) -> Result<ManualTriggerReport> {
        let connection = self
            .connections
            .get_connection(connection_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("connection {connection_id}")))?;

        let specs: Vec<&ResourceTypeSpec> = if resource_types.is_empty() {
            self.catalog.for_connector(connection.connector).collect()
        } else {
            resource_types
                .iter()
                .map(|name| {
                    self.catalog
                        .get(name)
                        .filter(|s| s.connector == connection.connector)
                        .ok_or_else(|| {
                            AppError::Validation(format!(
                                "unknown resource type {name} for {}",
                                connection.connector
                            ))
                        })
                })
                .collect::<Result<_>>()?
        };

        let (trigger, specs): (TriggerType, Vec<&ResourceTypeSpec>) = if cost_full {
            (
                TriggerType::CostFullDiscovery,
                specs
                    .into_iter()
                    .filter(|s| s.discovery_type() == DiscoveryType::Cost)
                    .collect(),
            )
        } else {
            (TriggerType::Manual, specs)
        };

        let all_connections = self.connections.list_connections().await?;
        let canonical = Self::canonical_tenant_connections(&all_connections);
        let mut report = ManualTriggerReport::default();

        for spec in specs {
            let request = Request {
                trigger,
                force: true,
            };
            match self.schedule(&connection, spec, &canonical, request).await {
                Ok(ScheduleOutcome::Created(job)) => report.job_ids.push(job.id),
                Ok(ScheduleOutcome::NotDue) => {}
                Ok(ScheduleOutcome::Skipped(reason)) => {
                    report.skipped.push((spec.name.clone(), reason.as_str()))
                }
                Err(e) if e.is_job_in_progress() => report.in_progress.push(spec.name.clone()),
                Err(e) => return Err(e),
            }
        }

        if let Some(next_job) = next_job {
            if !report.job_ids.is_empty() {
                let new = NewJobSequencer {
                    dependency_list: report.job_ids.clone(),
                    dependency_source: DependencySource::Describe,
                    next_job,
                };
                new.validate()?;
                let sequencer = self
                    .sequencers
                    .create_sequencer(&new, self.time_provider.now_millis())
                    .await?;
                report.sequencer_id = Some(sequencer.id);
            }
        }

        info!(
            connection_id,
            created = report.job_ids.len(),
            in_progress = report.in_progress.len(),
            trigger = %trigger,
            "Manual trigger finished"
        );
        Ok(report)
    }

    async fn schedule(
        &self,
        connection: &Connection,
        spec: &ResourceTypeSpec,
        canonical: &HashMap<String, String>,
        request: Request,
    ) -> Result<ScheduleOutcome> {
        if !connection.supports(&spec.name) {
            return Ok(ScheduleOutcome::Skipped(SkipReason::Unsupported));
        }

        if spec.directory_wide && connection.connector == Connector::Azure {
            if let Some(tenant) = &connection.tenant_id {
                if canonical.get(tenant) != Some(&connection.id) {
                    debug!(
                        connection_id = %connection.id,
                        resource_type = %spec.name,
                        "Directory-wide type owned by another connection of the tenant"
                    );
                    return Ok(ScheduleOutcome::Skipped(SkipReason::NotCanonicalConnection));
                }
            }
        }

        if spec.organization_wide && connection.is_organization_member() {
            return Ok(ScheduleOutcome::Skipped(SkipReason::OrganizationMember));
        }

        let discovery_type = spec.discovery_type();
        let now = self.time_provider.now_millis();

        if let Some(latest) = self.store.latest_job(&connection.id, &spec.name).await? {
            if !latest.status.is_terminal() {
                return Err(DomainError::JobInProgress {
                    connection_id: connection.id.clone(),
                    resource_type: spec.name.clone(),
                }
                .into());
            }
            let interval = self.config.discovery_interval_millis(discovery_type);
            if !request.force && latest.age_millis(now) < interval {
                return Ok(ScheduleOutcome::NotDue);
            }
        }

        let cost_on_manager =
            discovery_type == DiscoveryType::Cost && connection.is_organization_manager();
        if !(connection.is_healthy() && connection.is_enabled()) && !cost_on_manager {
            return Ok(ScheduleOutcome::Skipped(SkipReason::NotReady));
        }

        let trigger = match (request.trigger, connection.lifecycle_state) {
            (TriggerType::Scheduled, LifecycleState::InitialDiscovery) => {
                TriggerType::InitialDiscovery
            }
            (trigger, _) => trigger,
        };

        let new = NewDescribeJob::new(connection, spec.name.clone(), discovery_type, trigger);
        match self.store.create_job(&new, now).await? {
            Some(job) => {
                metrics::counter!(JOBS_CREATED_TOTAL, "trigger" => trigger.as_str()).increment(1);
                info!(
                    job_id = job.id,
                    connection_id = %connection.id,
                    resource_type = %spec.name,
                    discovery_type = %discovery_type,
                    trigger = %trigger,
                    "Describe job created"
                );
                Ok(ScheduleOutcome::Created(job))
            }
            // Lost the race against another replica between lookup and insert
            None => Err(DomainError::JobInProgress {
                connection_id: connection.id.clone(),
                resource_type: spec.name.clone(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl PeriodicTask for SchedulingPolicy {
    fn name(&self) -> &'static str {
        "scheduling-policy"
    }

    fn interval(&self) -> Duration {
        self.config.scheduling_interval()
    }

    async fn tick(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::NOW;
    use crate::domain::connection::fixtures::{aws_connection, azure_connection};
    use crate::domain::{
        DescribeJobStatus, HealthState, JobCompletion, OrganizationMembership, ResourceTypeSpec,
    };
    use crate::port::connection_provider::mocks::StaticConnectionProvider;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::time_provider::mocks::ManualClock;

    const EC2: &str = "AWS::EC2::Instance";
    const IDENTITY: &str = "AWS::IdentityStore::User";
    const COST: &str = "AWS::CostExplorer::ByServiceDaily";
    const AD_USERS: &str = "Microsoft.Resources/users";

    struct Harness {
        store: Arc<InMemoryJobStore>,
        clock: Arc<ManualClock>,
        policy: SchedulingPolicy,
    }

    fn harness(connections: Vec<Connection>) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let policy = SchedulingPolicy::new(
            store.clone(),
            store.clone(),
            Arc::new(StaticConnectionProvider::new(connections)),
            Arc::new(ResourceTypeCatalog::builtin()),
            clock.clone(),
            Arc::new(SchedulerConfig::default()),
        );
        Harness {
            store,
            clock,
            policy,
        }
    }

    fn one_type_catalog(spec: ResourceTypeSpec) -> Arc<ResourceTypeCatalog> {
        Arc::new(ResourceTypeCatalog::new([spec]))
    }

    async fn finish(store: &InMemoryJobStore, id: JobId, status: DescribeJobStatus) {
        let completion = JobCompletion {
            status,
            error_code: None,
            failure_message: None,
            described_resource_count: 1,
        };
        store.complete(id, &completion, NOW).await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduled_pass_creates_one_job_per_type() {
        let h = harness(vec![aws_connection("c1")]);
        let report = h.policy.run_once().await.unwrap();

        let aws_types = ResourceTypeCatalog::builtin()
            .for_connector(Connector::Aws)
            .count();
        assert_eq!(report.created, aws_types);
        assert!(h
            .store
            .all_jobs()
            .iter()
            .all(|j| j.status == DescribeJobStatus::Created
                && j.trigger_type == TriggerType::Scheduled));
    }

    #[tokio::test]
    async fn test_never_double_schedules_active_pair() {
        let h = harness(vec![aws_connection("c1")]);
        h.policy.run_once().await.unwrap();
        let before = h.store.all_jobs().len();

        h.clock.advance_millis(100 * 60 * 60 * 1000);
        let report = h.policy.run_once().await.unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.in_progress, before);
        assert_eq!(h.store.all_jobs().len(), before);
    }

    #[tokio::test]
    async fn test_not_due_until_interval_elapses() {
        let h = harness(vec![aws_connection("c1")]);
        let report = h
            .policy
            .trigger_manual("c1", &[EC2.to_string()], false, None)
            .await
            .unwrap();
        finish(&h.store, report.job_ids[0], DescribeJobStatus::Succeeded).await;

        // Fast interval is 8h
        h.clock.advance_millis(7 * 60 * 60 * 1000);
        let spec = ResourceTypeCatalog::builtin().get(EC2).unwrap().clone();
        let outcome = h
            .policy
            .schedule(
                &aws_connection("c1"),
                &spec,
                &HashMap::new(),
                Request {
                    trigger: TriggerType::Scheduled,
                    force: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, ScheduleOutcome::NotDue);

        h.clock.advance_millis(2 * 60 * 60 * 1000);
        let outcome = h
            .policy
            .schedule(
                &aws_connection("c1"),
                &spec,
                &HashMap::new(),
                Request {
                    trigger: TriggerType::Scheduled,
                    force: false,
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ScheduleOutcome::Created(_)));
    }

    #[tokio::test]
    async fn test_manual_bypasses_due_but_not_in_progress() {
        let h = harness(vec![aws_connection("c1")]);
        let first = h
            .policy
            .trigger_manual("c1", &[EC2.to_string()], false, None)
            .await
            .unwrap();
        assert_eq!(first.job_ids.len(), 1);

        let second = h
            .policy
            .trigger_manual("c1", &[EC2.to_string()], false, None)
            .await
            .unwrap();
        assert!(second.job_ids.is_empty());
        assert_eq!(second.in_progress, vec![EC2.to_string()]);

        finish(&h.store, first.job_ids[0], DescribeJobStatus::Succeeded).await;
        let third = h
            .policy
            .trigger_manual("c1", &[EC2.to_string()], false, None)
            .await
            .unwrap();
        assert_eq!(third.job_ids.len(), 1);
        let job = h.store.job(third.job_ids[0]).unwrap();
        assert_eq!(job.trigger_type, TriggerType::Manual);
        assert_eq!(job.discovery_type, DiscoveryType::Fast);
    }

    #[tokio::test]
    async fn test_cost_full_only_schedules_cost_types() {
        let h = harness(vec![aws_connection("c1")]);
        let report = h.policy.trigger_manual("c1", &[], true, None).await.unwrap();

        assert_eq!(report.job_ids.len(), 1);
        let job = h.store.job(report.job_ids[0]).unwrap();
        assert_eq!(job.resource_type, COST);
        assert_eq!(job.trigger_type, TriggerType::CostFullDiscovery);
        assert_eq!(job.discovery_type, DiscoveryType::Cost);
    }

    #[tokio::test]
    async fn test_manual_with_next_job_creates_sequencer() {
        let h = harness(vec![aws_connection("c1")]);
        let report = h
            .policy
            .trigger_manual("c1", &[], false, Some(NextJob::Analytics))
            .await
            .unwrap();

        let sequencer_id = report.sequencer_id.unwrap();
        let sequencer = h.store.get_sequencer(sequencer_id).await.unwrap().unwrap();
        assert_eq!(sequencer.dependency_list, report.job_ids);
        assert_eq!(sequencer.dependency_source, DependencySource::Describe);
    }

    #[tokio::test]
    async fn test_manual_unknown_connection() {
        let h = harness(vec![]);
        let err = h
            .policy
            .trigger_manual("missing", &[], false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_organization_wide_only_on_manager() {
        let mut member = aws_connection("c-member");
        member.organization = Some(OrganizationMembership {
            organization_id: "o-1".to_string(),
            is_manager: false,
        });
        let mut manager = aws_connection("c-manager");
        manager.organization = Some(OrganizationMembership {
            organization_id: "o-1".to_string(),
            is_manager: true,
        });
        let h = harness(vec![member, manager]);
        h.policy.run_once().await.unwrap();

        let identity_jobs: Vec<_> = h
            .store
            .all_jobs()
            .into_iter()
            .filter(|j| j.resource_type == IDENTITY)
            .collect();
        assert_eq!(identity_jobs.len(), 1);
        assert_eq!(identity_jobs[0].connection_id, "c-manager");
    }

    #[tokio::test]
    async fn test_directory_wide_only_on_canonical_connection() {
        let mut unhealthy = azure_connection("a-0", "t1");
        unhealthy.health_state = HealthState::Unhealthy;
        let connections = vec![
            unhealthy,
            azure_connection("a-2", "t1"),
            azure_connection("a-1", "t1"),
            azure_connection("b-9", "t2"),
        ];
        let h = harness(connections);
        h.policy.run_once().await.unwrap();

        let mut owners: Vec<String> = h
            .store
            .all_jobs()
            .into_iter()
            .filter(|j| j.resource_type == AD_USERS)
            .map(|j| j.connection_id)
            .collect();
        owners.sort();
        assert_eq!(owners, vec!["a-1".to_string(), "b-9".to_string()]);
    }

    #[tokio::test]
    async fn test_unhealthy_connection_not_scheduled_except_org_cost() {
        let mut conn = aws_connection("c1");
        conn.health_state = HealthState::Unhealthy;
        conn.organization = Some(OrganizationMembership {
            organization_id: "o-1".to_string(),
            is_manager: true,
        });
        let h = harness(vec![conn]);
        h.policy.run_once().await.unwrap();

        let jobs = h.store.all_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].resource_type, COST);
    }

    #[tokio::test]
    async fn test_initial_discovery_trigger() {
        let mut conn = aws_connection("c1");
        conn.lifecycle_state = LifecycleState::InitialDiscovery;
        let store = Arc::new(InMemoryJobStore::new());
        let policy = SchedulingPolicy::new(
            store.clone(),
            store.clone(),
            Arc::new(StaticConnectionProvider::new(vec![conn])),
            one_type_catalog(ResourceTypeSpec {
                name: EC2.to_string(),
                connector: Connector::Aws,
                fast_discovery: true,
                cost_discovery: false,
                directory_wide: false,
                organization_wide: false,
            }),
            Arc::new(ManualClock::new(NOW)),
            Arc::new(SchedulerConfig::default()),
        );
        policy.run_once().await.unwrap();

        assert_eq!(
            store.all_jobs()[0].trigger_type,
            TriggerType::InitialDiscovery
        );
    }

    #[tokio::test]
    async fn test_unsupported_type_skipped() {
        let mut conn = aws_connection("c1");
        conn.supported_resource_types = Some([EC2.to_string()].into_iter().collect());
        let h = harness(vec![conn]);
        let report = h.policy.run_once().await.unwrap();

        assert_eq!(report.created, 1);
        assert!(report.skipped > 0);
    }
}
