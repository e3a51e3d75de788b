use allstop::config::load_config;
use allstop::intersection::load_intersection;
use allstop::nats::NatsClient;
use allstop::pipeline::Pipeline;
use allstop::schedule::{AllStopScheduler, ScheduleLogger};
use allstop::state::{AllStopProcessor, VehicleStore};
use allstop::transport::InboundTransport;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "allstop=info,allstop_scheduling=info".into()),
        )
        .init();

    info!("All-stop scheduling service starting...");

    // Config path: first argument, then ALLSTOP_CONFIG
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ALLSTOP_CONFIG").ok())
        .unwrap_or_else(|| "allstop.toml".to_string());

    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from '{}'", config_path))?;
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;

    info!(
        config = %config_path,
        nats_url = %config.nats.url,
        scheduling_delta_ms = config.scheduler.scheduling_delta_ms,
        flexibility_limit = config.scheduler.flexibility_limit,
        "Configuration loaded"
    );

    // Transports must be up before either loop starts
    let nats = NatsClient::connect(config.nats.clone()).await?;
    let consumer = nats.consumer().await?;
    if !consumer.is_running() {
        bail!("Status intent consumer is not running");
    }
    let producer = nats.producer();

    let model = load_intersection(&config.intersection)
        .await
        .context("Failed to load intersection geometry")?;

    let processor = Arc::new(
        AllStopProcessor::new(
            config.vehicles.stop_distance,
            config.vehicles.stop_speed,
            config.vehicles.expiry_ms,
        )
        .with_max_clock_skew(config.vehicles.max_clock_skew_ms),
    );
    let store = Arc::new(VehicleStore::new(processor));
    let scheduler = AllStopScheduler::new(Arc::new(model), config.scheduler.flexibility_limit);

    // A broken CSV log never stops scheduling
    let schedule_log = if config.schedule_log.enabled {
        match ScheduleLogger::open(config.schedule_log.clone()) {
            Ok(logger) => Some(logger),
            Err(e) => {
                error!(error = %e, "Schedule log initialization failed, continuing without it");
                None
            }
        }
    } else {
        None
    };

    let pipeline = Pipeline::new(
        store,
        scheduler,
        Duration::from_millis(config.scheduler.scheduling_delta_ms),
    )
    .with_schedule_log(schedule_log);

    info!("All-stop scheduling service initialized");

    pipeline
        .run(Box::new(consumer), Arc::new(producer), shutdown_signal())
        .await?;

    info!("All-stop scheduling service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl_c signal");
        std::future::pending::<()>().await;
    }
}
