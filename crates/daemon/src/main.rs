//! Describe Scheduler - Main Entry Point
//! Composition root: settings, logging, metrics, DI wiring, control loops

mod logging;
mod settings;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use describer_api_rpc::{RpcHandler, RpcServer};
use describer_core::application::runtime::constants::SHUTDOWN_GRACE_PERIOD;
use describer_core::application::{
    run_periodic, shutdown_channel, AdmissionController, DispatchCycle, Dispatcher,
    JobSequencerService, PeriodicTask, ResultReconciler, RetryReconciler, SchedulingPolicy,
    TimeoutSweeper,
};
use describer_core::domain::ResourceTypeCatalog;
use describer_core::port::{DescribeDelivery, SystemTimeProvider, TimeProvider};
use describer_core::{telemetry, SchedulerConfig, VERSION};
use describer_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use describer_infra_transport::{
    connect_jetstream, HttpConnectionProvider, JetStreamDelivery, MessageBusDelivery,
    NatsStreamPublisher, RestBrokerClient, ResultConsumer, ServerlessInvoker, StreamPublisher,
};
use settings::{DeliverySettings, MetricsSettings, Settings};

async fn build_delivery(settings: &DeliverySettings) -> Result<Arc<dyn DescribeDelivery>> {
    let delivery: Arc<dyn DescribeDelivery> = match settings {
        DeliverySettings::Serverless { function_urls } => {
            Arc::new(ServerlessInvoker::new(function_urls.clone())?)
        }
        DeliverySettings::MessageBus {
            endpoint,
            token,
            queues,
        } => {
            let broker = RestBrokerClient::new(endpoint.as_str(), token.as_str())?;
            Arc::new(MessageBusDelivery::new(Arc::new(broker), queues.clone()))
        }
        DeliverySettings::Jetstream { url } => {
            let context = connect_jetstream(url).await?;
            let publisher = NatsStreamPublisher::new(context);
            publisher.declare_streams().await?;
            Arc::new(JetStreamDelivery::new(Arc::new(publisher)))
        }
    };
    Ok(delivery)
}

/// Global recorder plus scrape listener; must run before any metric is touched
fn install_metrics_exporter(settings: &MetricsSettings) -> Result<()> {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return Ok(());
    }
    PrometheusBuilder::new()
        .with_http_listener(settings.listen_addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(listen_addr = %settings.listen_addr, "Metrics exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging (guard flushes the non-blocking writer on drop)
    let _log_guard = logging::init();
    info!("Describe scheduler v{} starting...", VERSION);

    // 2. Configuration, metrics exporter, metric descriptions
    let settings = Settings::load()?;
    install_metrics_exporter(&settings.metrics)?;
    telemetry::describe_metrics();
    let config: Arc<SchedulerConfig> = Arc::new(settings.scheduler.clone());

    // 3. Job store
    if let Some(parent) = std::path::Path::new(&settings.database_url).parent() {
        if !settings.database_url.contains(":memory:") && !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    info!(database_url = %settings.database_url, "Initializing job store...");
    let pool = create_pool(&settings.database_url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteJobStore::new(pool));
    let connections = Arc::new(HttpConnectionProvider::new(
        settings.onboarding.base_url.as_str(),
        settings.onboarding.token.clone(),
    )?);
    let catalog = Arc::new(match &settings.catalog {
        Some(specs) => ResourceTypeCatalog::new(specs.clone()),
        None => ResourceTypeCatalog::builtin(),
    });
    let delivery = build_delivery(&settings.delivery).await?;
    info!(backend = delivery.name(), resource_types = catalog.len(), "Delivery backend ready");

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        delivery,
        time_provider.clone(),
        settings.workers.clone(),
    ));
    let admission = AdmissionController::new(store.clone(), time_provider.clone(), config.clone());
    let scheduling = Arc::new(SchedulingPolicy::new(
        store.clone(),
        store.clone(),
        connections.clone(),
        catalog,
        time_provider.clone(),
        config.clone(),
    ));
    let reconciler = Arc::new(ResultReconciler::new(store.clone(), time_provider.clone()));

    let tasks: Vec<Arc<dyn PeriodicTask>> = vec![
        Arc::new(DispatchCycle::new(
            admission,
            store.clone(),
            connections.clone(),
            dispatcher,
            config.clone(),
        )),
        scheduling.clone(),
        Arc::new(TimeoutSweeper::new(
            store.clone(),
            time_provider.clone(),
            config.clone(),
        )),
        Arc::new(RetryReconciler::new(
            store.clone(),
            store.clone(),
            time_provider.clone(),
            config.clone(),
        )),
        Arc::new(JobSequencerService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            time_provider.clone(),
            config.clone(),
        )),
    ];

    // 5. JSON-RPC server (worker callbacks, lookup, manual trigger)
    let handler = Arc::new(RpcHandler::new(reconciler.clone(), store.clone(), scheduling));
    let (rpc_addr, rpc_handle) = RpcServer::new(settings.rpc.clone(), handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;
    info!(addr = %rpc_addr, "JSON-RPC server listening");

    // 6. Control loops
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut loops = JoinSet::new();
    for task in tasks {
        loops.spawn(run_periodic(task, config.jitter(), shutdown_rx.clone()));
    }

    if let Some(queue) = &settings.result_queue {
        let context = connect_jetstream(&queue.url).await?;
        let consumer = ResultConsumer::new(reconciler);
        let token = shutdown_tx.subscribe();
        loops.spawn(async move {
            if let Err(e) = consumer.run(context, token).await {
                error!(error = %e, "Result consumer failed");
            }
        });
    }

    info!(loops = loops.len(), "System ready");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: in-flight ticks finish, loops exit between ticks
    shutdown_tx.shutdown();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    let drained = tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, async {
        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Loop task panicked");
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
            "Loops still running after grace period, aborting"
        );
        loops.abort_all();
    }

    info!("Shutdown complete.");
    Ok(())
}
