// Scheduler configuration (no magic values: every default is a named constant)

use crate::domain::{Connector, DiscoveryType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Dispatch cycle period (30s)
pub const DEFAULT_DISPATCH_INTERVAL_SECS: u64 = 30;

/// Random extra delay added to every loop tick (10s)
pub const DEFAULT_JITTER_SECS: u64 = 10;

/// Upper bound on CREATED candidates fetched per dispatch cycle
pub const DEFAULT_MAX_CONCURRENT_CALLS: u32 = 500;

/// Per-resource-type in-flight ceiling when no override exists
pub const DEFAULT_RESOURCE_TYPE_CEILING: u32 = 25;

/// QUEUED jobs created in the last 24h above which dispatch stops
pub const DEFAULT_QUEUE_CEILING: u64 = 5000;
pub const DEFAULT_QUEUE_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Non-CREATED jobs touched in the last 10 minutes above which dispatch stops
pub const DEFAULT_THROUGHPUT_CEILING: u64 = 5000;
pub const DEFAULT_THROUGHPUT_WINDOW_SECS: u64 = 10 * 60;

/// Re-discovery intervals per discovery type
pub const DEFAULT_FAST_DISCOVERY_INTERVAL_SECS: u64 = 8 * 60 * 60;
pub const DEFAULT_FULL_DISCOVERY_INTERVAL_SECS: u64 = 48 * 60 * 60;
pub const DEFAULT_COST_DISCOVERY_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// A running job silent for longer than this is swept to TIMEOUT (20 min)
pub const DEFAULT_IN_PROGRESS_TIMEOUT_SECS: u64 = 20 * 60;

pub const DEFAULT_TIMEOUT_SWEEP_INTERVAL_SECS: u64 = 15 * 60;
pub const DEFAULT_SCHEDULING_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_SEQUENCER_INTERVAL_SECS: u64 = 60;

/// Compliance runner retry cap and minimum back-off
pub const DEFAULT_RUNNER_MAX_ATTEMPTS: i32 = 3;
pub const DEFAULT_RUNNER_BACKOFF_SECS: u64 = 5 * 60;

/// Error codes that are never retried: authorization and client errors
pub const DEFAULT_RETRY_DENYLIST: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthorizationError",
    "AuthorizationFailed",
    "InvalidClientTokenId",
    "InvalidAuthenticationToken",
    "400",
    "401",
    "403",
    "404",
];

const AWS_RETRY_DENYLIST: &[&str] = &["OptInRequired", "SubscriptionRequiredException"];
const AZURE_RETRY_DENYLIST: &[&str] = &["SubscriptionNotFound", "InvalidAuthenticationTokenTenant"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub dispatch_interval_secs: u64,
    pub jitter_secs: u64,
    pub max_concurrent_calls: u32,
    pub default_resource_type_ceiling: u32,
    pub resource_type_ceilings: HashMap<String, u32>,
    pub queue_ceiling: u64,
    pub queue_window_secs: u64,
    pub throughput_ceiling: u64,
    pub throughput_window_secs: u64,
    pub fast_discovery_interval_secs: u64,
    pub full_discovery_interval_secs: u64,
    pub cost_discovery_interval_secs: u64,
    pub in_progress_timeout_secs: u64,
    pub timeout_sweep_interval_secs: u64,
    pub scheduling_interval_secs: u64,
    pub sequencer_interval_secs: u64,
    pub retry_denylist: Vec<String>,
    pub retry_denylist_by_connector: HashMap<Connector, Vec<String>>,
    pub runner_max_attempts: i32,
    pub runner_backoff_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let owned = |codes: &[&str]| codes.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            dispatch_interval_secs: DEFAULT_DISPATCH_INTERVAL_SECS,
            jitter_secs: DEFAULT_JITTER_SECS,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            default_resource_type_ceiling: DEFAULT_RESOURCE_TYPE_CEILING,
            resource_type_ceilings: HashMap::new(),
            queue_ceiling: DEFAULT_QUEUE_CEILING,
            queue_window_secs: DEFAULT_QUEUE_WINDOW_SECS,
            throughput_ceiling: DEFAULT_THROUGHPUT_CEILING,
            throughput_window_secs: DEFAULT_THROUGHPUT_WINDOW_SECS,
            fast_discovery_interval_secs: DEFAULT_FAST_DISCOVERY_INTERVAL_SECS,
            full_discovery_interval_secs: DEFAULT_FULL_DISCOVERY_INTERVAL_SECS,
            cost_discovery_interval_secs: DEFAULT_COST_DISCOVERY_INTERVAL_SECS,
            in_progress_timeout_secs: DEFAULT_IN_PROGRESS_TIMEOUT_SECS,
            timeout_sweep_interval_secs: DEFAULT_TIMEOUT_SWEEP_INTERVAL_SECS,
            scheduling_interval_secs: DEFAULT_SCHEDULING_INTERVAL_SECS,
            sequencer_interval_secs: DEFAULT_SEQUENCER_INTERVAL_SECS,
            retry_denylist: owned(DEFAULT_RETRY_DENYLIST),
            retry_denylist_by_connector: HashMap::from([
                (Connector::Aws, owned(AWS_RETRY_DENYLIST)),
                (Connector::Azure, owned(AZURE_RETRY_DENYLIST)),
            ]),
            runner_max_attempts: DEFAULT_RUNNER_MAX_ATTEMPTS,
            runner_backoff_secs: DEFAULT_RUNNER_BACKOFF_SECS,
        }
    }
}

fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

impl SchedulerConfig {
    /// In-flight ceiling for a resource type (override or default).
    /// Layered config sources lowercase map keys, so overrides match
    /// case-insensitively.
    pub fn ceiling_for(&self, resource_type: &str) -> u32 {
        self.resource_type_ceilings
            .get(resource_type)
            .or_else(|| {
                self.resource_type_ceilings
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(resource_type))
                    .map(|(_, ceiling)| ceiling)
            })
            .copied()
            .unwrap_or(self.default_resource_type_ceiling)
    }

    pub fn discovery_interval_millis(&self, discovery_type: DiscoveryType) -> i64 {
        secs_to_millis(match discovery_type {
            DiscoveryType::Fast => self.fast_discovery_interval_secs,
            DiscoveryType::Full => self.full_discovery_interval_secs,
            DiscoveryType::Cost => self.cost_discovery_interval_secs,
        })
    }

    /// Shortest discovery interval; used to prefilter stale-job queries
    pub fn min_discovery_interval_millis(&self) -> i64 {
        [DiscoveryType::Fast, DiscoveryType::Full, DiscoveryType::Cost]
            .into_iter()
            .map(|d| self.discovery_interval_millis(d))
            .min()
            .unwrap_or(0)
    }

    /// Longest discovery interval; bounds the retry-candidate lookback
    pub fn max_discovery_interval_millis(&self) -> i64 {
        [DiscoveryType::Fast, DiscoveryType::Full, DiscoveryType::Cost]
            .into_iter()
            .map(|d| self.discovery_interval_millis(d))
            .max()
            .unwrap_or(0)
    }

    /// Case-insensitive denylist lookup, global list first
    pub fn is_denylisted(&self, connector: Connector, error_code: &str) -> bool {
        let matches = |codes: &[String]| codes.iter().any(|c| c.eq_ignore_ascii_case(error_code));
        matches(&self.retry_denylist)
            || self
                .retry_denylist_by_connector
                .get(&connector)
                .is_some_and(|codes| matches(codes))
    }

    pub fn queue_window_millis(&self) -> i64 {
        secs_to_millis(self.queue_window_secs)
    }

    pub fn throughput_window_millis(&self) -> i64 {
        secs_to_millis(self.throughput_window_secs)
    }

    pub fn in_progress_timeout_millis(&self) -> i64 {
        secs_to_millis(self.in_progress_timeout_secs)
    }

    pub fn runner_backoff_millis(&self) -> i64 {
        secs_to_millis(self.runner_backoff_secs)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }

    pub fn timeout_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.timeout_sweep_interval_secs)
    }

    pub fn scheduling_interval(&self) -> Duration {
        Duration::from_secs(self.scheduling_interval_secs)
    }

    pub fn sequencer_interval(&self) -> Duration {
        Duration::from_secs(self.sequencer_interval_secs)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrent_calls == 0 {
            return Err(crate::AppError::Config(
                "max_concurrent_calls must be greater than 0".to_string(),
            ));
        }
        if self.runner_max_attempts < 1 {
            return Err(crate::AppError::Config(
                "runner_max_attempts must be at least 1".to_string(),
            ));
        }
        let intervals = [
            ("dispatch_interval_secs", self.dispatch_interval_secs),
            ("timeout_sweep_interval_secs", self.timeout_sweep_interval_secs),
            ("scheduling_interval_secs", self.scheduling_interval_secs),
            ("sequencer_interval_secs", self.sequencer_interval_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return Err(crate::AppError::Config(format!("{name} must be greater than 0")));
        }
        Ok(())
    }
}
