//! Daemon settings: optional TOML file layered under `DESCRIBER__*` env vars

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use describer_api_rpc::RpcServerConfig;
use describer_core::domain::{Connector, ResourceTypeSpec, WorkerEndpoints};
use describer_core::SchedulerConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

pub const CONFIG_PATH_ENV: &str = "DESCRIBER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "describer.toml";
const ENV_PREFIX: &str = "DESCRIBER";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_DB_PATH: &str = "~/.describer/describer.db";
const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
const DEFAULT_METRICS_PORT: u16 = 9464;

/// Backend that hands payloads to describer workers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliverySettings {
    Serverless {
        function_urls: HashMap<Connector, String>,
    },
    MessageBus {
        endpoint: String,
        token: String,
        queues: HashMap<Connector, String>,
    },
    Jetstream {
        url: String,
    },
}

impl Default for DeliverySettings {
    fn default() -> Self {
        DeliverySettings::Jetstream {
            url: DEFAULT_NATS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OnboardingSettings {
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for OnboardingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token: None,
        }
    }
}

/// Prometheus scrape endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: SocketAddr,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_METRICS_PORT)),
        }
    }
}

/// JetStream results stream; RPC callbacks are always accepted
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultQueueSettings {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub rpc: RpcServerConfig,
    pub delivery: DeliverySettings,
    pub onboarding: OnboardingSettings,
    pub metrics: MetricsSettings,
    pub workers: WorkerEndpoints,
    pub result_queue: Option<ResultQueueSettings>,
    /// Replaces the built-in resource type catalog when set
    pub catalog: Option<Vec<ResourceTypeSpec>>,
    pub scheduler: SchedulerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_PATH.to_string(),
            rpc: RpcServerConfig::default(),
            delivery: DeliverySettings::default(),
            onboarding: OnboardingSettings::default(),
            metrics: MetricsSettings::default(),
            workers: WorkerEndpoints::default(),
            result_queue: None,
            catalog: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Settings {
    /// Load from `$DESCRIBER_CONFIG` (default `describer.toml`, optional)
    /// and the environment, e.g. `DESCRIBER__SCHEDULER__QUEUE_CEILING=100`.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let path = shellexpand::tilde(&path).into_owned();

        let config = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration ({path})"))?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        let mut settings: Settings = config
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.database_url = shellexpand::tilde(&settings.database_url).into_owned();
        settings
            .scheduler
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid scheduler configuration: {e}"))?;
        Ok(settings)
    }
}
