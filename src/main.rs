use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use cohort::{
    cli::config_path_from_args,
    config::Config,
    evaluation::{NoopEvaluator, MinimumPopulationReportability},
    logging::init_tracing,
    messaging::{ErrorTopicForwarder, InMemoryPublisher, bridge::BrokerBridge},
    runtime::{CoreDependencies, CoreRuntime, RuntimeOptions},
    store::{AggregationCache, InMemoryCorrelationStore, InMemoryResourceStore, SystemClock},
    telemetry::NoopTelemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let logging_guard = init_tracing(&config.logging)?;
    tracing::info!(run_id = logging_guard.run_id(), "cohort_starting");

    // In-memory adapters stand in for the deployment's store and broker
    // collaborators; every one of them sits behind a port.
    let publisher = Arc::new(InMemoryPublisher::new());
    let deps = CoreDependencies {
        correlation_store: Arc::new(InMemoryCorrelationStore::new()),
        resource_store: Arc::new(InMemoryResourceStore::new()),
        cache: Arc::new(AggregationCache::new(
            Arc::new(SystemClock),
            Duration::from_millis(config.cache.ttl_ms),
            config.cache.capacity,
        )),
        evaluator: Arc::new(NoopEvaluator),
        reportability: Arc::new(MinimumPopulationReportability {
            minimum: config.reportability.minimum_population_count,
        }),
        publisher: publisher.clone(),
        telemetry: Arc::new(NoopTelemetry),
        recovery: Arc::new(ErrorTopicForwarder::new(publisher)),
    };
    let runtime = Arc::new(CoreRuntime::start(
        RuntimeOptions {
            lane_capacity: config.lanes.capacity,
        },
        deps,
    ));

    let shutdown = CancellationToken::new();
    let bridge = BrokerBridge::new(config.bridge.socket_path.clone());
    let bridge_runtime = Arc::clone(&runtime);
    let bridge_shutdown = shutdown.clone();
    let bridge_task =
        tokio::spawn(async move { bridge.run(bridge_runtime, bridge_shutdown).await });

    eprintln!(
        "cohort listening on unix socket (NDJSON): {}",
        config.bridge.socket_path.display()
    );

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;

    let signal_name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };

    eprintln!("received {signal_name}; draining execution lanes");
    shutdown.cancel();
    runtime.shutdown().await;

    match bridge_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => eprintln!("broker bridge exited with error: {err:#}"),
        Err(err) => eprintln!("broker bridge task join failed: {err}"),
    }

    eprintln!("cohort stopped: received {signal_name}");
    Ok(())
}
