//! Pipeline orchestrator.
//!
//! Runs two tasks side by side:
//! - ingestion: inbound transport → `VehicleStore`
//! - scheduling: `VehicleStore` snapshot → `AllStopScheduler` → outbound transport
//!
//! The tasks share only the store. If either ends on its own the other is
//! torn down and `run` returns an error; a shutdown signal stops both and
//! `run` returns `Ok`.

mod metrics;

pub use metrics::{MetricsSnapshot, PipelineMetrics};

use crate::cadence::{sleep_duration, Cadence};
use crate::schedule::{AllStopScheduler, ScheduleLogger};
use crate::state::VehicleStore;
use crate::transport::{InboundTransport, OutboundTransport};
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default wait for one inbound message
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// How long ingestion gets to stop its transport before it is aborted
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Scheduling cycles between two metrics log lines
const METRICS_LOG_CYCLES: u64 = 100;

pub struct Pipeline {
    store: Arc<VehicleStore>,
    scheduler: AllStopScheduler,
    interval: Duration,
    poll_timeout: Duration,
    schedule_log: Option<ScheduleLogger>,
    metrics: PipelineMetrics,
}

enum TaskExit {
    Ingestion(Result<Result<()>, JoinError>),
    Scheduling(Result<Result<()>, JoinError>),
    Shutdown,
}

impl Pipeline {
    /// `interval` is the minimum time between published schedules.
    pub fn new(store: Arc<VehicleStore>, scheduler: AllStopScheduler, interval: Duration) -> Self {
        Self {
            store,
            scheduler,
            interval,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            schedule_log: None,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_schedule_log(mut self, logger: Option<ScheduleLogger>) -> Self {
        self.schedule_log = logger;
        self
    }

    /// Shared handle to the pipeline counters
    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.clone()
    }

    /// Run both loops until `shutdown` resolves or one of them dies.
    pub async fn run<F>(
        self,
        inbound: Box<dyn InboundTransport>,
        outbound: Arc<dyn OutboundTransport>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut ingestion = tokio::spawn(run_ingestion(
            Arc::clone(&self.store),
            inbound,
            self.metrics.clone(),
            self.poll_timeout,
            shutdown_rx,
        ));

        let mut scheduling = tokio::spawn(run_scheduling(
            Arc::clone(&self.store),
            self.scheduler,
            Arc::clone(&outbound),
            self.schedule_log,
            self.interval,
            self.metrics.clone(),
        ));

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Pipeline started"
        );

        tokio::pin!(shutdown);
        let exit = tokio::select! {
            res = &mut ingestion => TaskExit::Ingestion(res),
            res = &mut scheduling => TaskExit::Scheduling(res),
            _ = &mut shutdown => TaskExit::Shutdown,
        };

        let outcome = match exit {
            TaskExit::Ingestion(res) => {
                log_unexpected_exit("ingestion", res);
                scheduling.abort();
                Err(anyhow!("Ingestion loop terminated unexpectedly"))
            }
            TaskExit::Scheduling(res) => {
                log_unexpected_exit("scheduling", res);
                stop_ingestion(&mut ingestion, &shutdown_tx).await;
                Err(anyhow!("Scheduling loop terminated unexpectedly"))
            }
            TaskExit::Shutdown => {
                info!("Shutdown signal received");
                scheduling.abort();
                stop_ingestion(&mut ingestion, &shutdown_tx).await;
                Ok(())
            }
        };

        if let Err(e) = outbound.stop().await {
            error!(error = %e, "Outbound transport did not stop cleanly");
        }

        let totals = self.metrics.get_snapshot();
        info!(
            updates_applied = totals.updates_applied,
            schedules_published = totals.schedules_published,
            "Pipeline stopped"
        );

        outcome
    }
}

fn log_unexpected_exit(task: &str, res: Result<Result<()>, JoinError>) {
    match res {
        Ok(Ok(())) => error!(task = task, "Pipeline task ended unexpectedly"),
        Ok(Err(e)) => error!(task = task, error = %e, "Pipeline task failed"),
        Err(e) => error!(task = task, error = %e, "Pipeline task panicked or was cancelled"),
    }
}

async fn stop_ingestion(ingestion: &mut JoinHandle<Result<()>>, shutdown_tx: &watch::Sender<bool>) {
    // Receiver may already be gone if ingestion has exited
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(STOP_GRACE, &mut *ingestion).await {
        Ok(Ok(Ok(()))) => debug!("Ingestion loop joined"),
        Ok(Ok(Err(e))) => error!(error = %e, "Ingestion loop failed during shutdown"),
        Ok(Err(e)) => error!(error = %e, "Ingestion task panicked during shutdown"),
        Err(_) => {
            warn!("Ingestion loop did not stop in time, aborting");
            ingestion.abort();
        }
    }
}

/// Feed inbound payloads into the store until the transport stops running
/// or shutdown is requested. The transport is always stopped on the way out.
async fn run_ingestion(
    store: Arc<VehicleStore>,
    mut inbound: Box<dyn InboundTransport>,
    metrics: PipelineMetrics,
    poll_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!("Ingestion loop started");

    while inbound.is_running() && !*shutdown.borrow() {
        let polled = tokio::select! {
            _ = shutdown.changed() => break,
            polled = inbound.poll(poll_timeout) => polled,
        };

        match polled {
            Ok(Some(payload)) if !payload.is_empty() => {
                let outcome = store.apply_update(&payload);
                metrics.record_update(outcome);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Inbound transport poll failed");
            }
        }
    }

    if let Err(e) = inbound.stop().await {
        error!(error = %e, "Inbound transport did not stop cleanly");
    }

    info!("Ingestion loop stopped");
    Ok(())
}

/// Produce one schedule per cadence interval, forever.
async fn run_scheduling(
    store: Arc<VehicleStore>,
    scheduler: AllStopScheduler,
    outbound: Arc<dyn OutboundTransport>,
    mut schedule_log: Option<ScheduleLogger>,
    interval: Duration,
    metrics: PipelineMetrics,
) -> Result<()> {
    info!(
        flexibility_limit = scheduler.flexibility_limit(),
        "Scheduling loop started"
    );

    let mut cadence = Cadence::new(interval);
    let mut cycles: u64 = 0;

    loop {
        let now_ms = Utc::now().timestamp_millis();
        if !cadence.ready(now_ms) {
            tokio::time::sleep(cadence.time_until_ready(now_ms)).await;
            continue;
        }

        let cycle_start = Instant::now();
        cadence.begin();

        let snapshot = store.snapshot_at(now_ms);
        let schedule = scheduler.schedule(&snapshot);
        debug!(
            vehicles = snapshot.len(),
            entries = schedule.len(),
            timestamp = schedule.timestamp,
            "Schedule computed"
        );

        match schedule.to_json() {
            Ok(json) => match outbound.send(json.into_bytes()).await {
                Ok(()) => metrics.record_published(),
                Err(e) => {
                    metrics.record_publish_failure();
                    error!(error = %e, timestamp = schedule.timestamp, "Failed to publish schedule");
                }
            },
            Err(e) => {
                metrics.record_publish_failure();
                error!(error = %e, "Failed to serialize schedule");
            }
        }

        if let Some(logger) = schedule_log.as_mut() {
            if let Err(e) = logger.log(&schedule) {
                error!(error = %e, "Failed to write schedule log");
            }
        }

        cadence.complete(schedule.timestamp);

        cycles += 1;
        if cycles % METRICS_LOG_CYCLES == 0 {
            let m = metrics.get_snapshot();
            info!(
                cycles = cycles,
                last_schedule = cadence.last_schedule(),
                vehicles = store.len(),
                updates_applied = m.updates_applied,
                updates_stale = m.updates_stale,
                updates_rejected = m.updates_rejected,
                schedules_published = m.schedules_published,
                publish_failures = m.publish_failures,
                cycle_overruns = m.cycle_overruns,
                "Pipeline metrics"
            );
        }

        match sleep_duration(cycle_start, Instant::now(), interval) {
            Some(_) => tokio::time::sleep_until(cadence.next_wake(cycle_start)).await,
            None => {
                metrics.record_overrun();
                warn!(
                    elapsed_ms = cycle_start.elapsed().as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "Scheduling cycle overran its interval"
                );
            }
        }
    }
}
