// End-to-end tests for the ingestion and scheduling loops.
//
// The NATS transports need a live broker, so these tests plug in-memory
// channel transports into the same `Pipeline` the binary runs.

use allstop::intersection::IntersectionModel;
use allstop::pipeline::Pipeline;
use allstop::schedule::{AllStopScheduler, IntersectionSchedule};
use allstop::state::{AllStopProcessor, VehicleStore};
use allstop::transport::{InboundTransport, OutboundTransport};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

// ── In-memory transports ──────────────────────────────────────────────────────

struct ChannelInbound {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    running: bool,
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl InboundTransport for ChannelInbound {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(payload)) => Ok(Some(payload)),
            Ok(None) => {
                self.running = false;
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn stop(&mut self) -> Result<()> {
        self.running = false;
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct ChannelOutbound {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl OutboundTransport for ChannelOutbound {
    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        // Receiver dropped at the end of a test: not an error here
        let _ = self.tx.send(payload);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Outbound transport whose broker is always unreachable
struct FailingOutbound {
    attempts: Arc<AtomicU64>,
}

#[async_trait]
impl OutboundTransport for FailingOutbound {
    async fn send(&self, _payload: Vec<u8>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        bail!("broker unavailable")
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

const GEOMETRY: &str = r#"{
    "id": 9001,
    "name": "Test all-stop",
    "lanes": [
        { "id": 1, "kind": "entry", "crossing_length": 12.0, "speed_limit": 6.0, "conflicts": [2] },
        { "id": 2, "kind": "entry", "crossing_length": 12.0, "speed_limit": 6.0, "conflicts": [1] },
        { "id": 3, "kind": "entry", "crossing_length": 12.0, "speed_limit": 6.0, "conflicts": [] }
    ]
}"#;

const INTERVAL: Duration = Duration::from_millis(50);

fn create_pipeline() -> Pipeline {
    let model = IntersectionModel::from_json(GEOMETRY.as_bytes()).unwrap();
    let processor = Arc::new(AllStopProcessor::new(2.0, 0.1, 2000));
    let store = Arc::new(VehicleStore::new(processor));
    let scheduler = AllStopScheduler::new(Arc::new(model), 5);

    Pipeline::new(store, scheduler, INTERVAL).with_poll_timeout(Duration::from_millis(100))
}

struct Harness {
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound_stopped: Arc<AtomicBool>,
    outbound_stopped: Arc<AtomicBool>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

fn start(pipeline: Pipeline) -> Harness {
    let (inbound_tx, rx) = mpsc::unbounded_channel();
    let (tx, outbound_rx) = mpsc::unbounded_channel();
    let inbound_stopped = Arc::new(AtomicBool::new(false));
    let outbound_stopped = Arc::new(AtomicBool::new(false));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let inbound = ChannelInbound {
        rx,
        running: true,
        stopped: Arc::clone(&inbound_stopped),
    };
    let outbound = ChannelOutbound {
        tx,
        stopped: Arc::clone(&outbound_stopped),
    };

    let handle = tokio::spawn(pipeline.run(Box::new(inbound), Arc::new(outbound), async move {
        let _ = shutdown_rx.await;
    }));

    Harness {
        inbound_tx,
        outbound_rx,
        inbound_stopped,
        outbound_stopped,
        shutdown_tx,
        handle,
    }
}

fn status_message(vehicle_id: &str, lane_id: i32, distance: f64, speed: f64) -> Vec<u8> {
    serde_json::json!({
        "version": 1,
        "vehicle_id": vehicle_id,
        "lane_id": lane_id,
        "distance": distance,
        "speed": speed,
        "intent": "approaching",
        "timestamp": Utc::now().timestamp_millis(),
    })
    .to_string()
    .into_bytes()
}

/// Receive schedules until one satisfies `accept`
async fn wait_for_schedule<F>(
    rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    accept: F,
) -> IntersectionSchedule
where
    F: Fn(&IntersectionSchedule) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let payload = rx.recv().await.expect("outbound channel closed");
            let schedule: IntersectionSchedule = serde_json::from_slice(&payload).unwrap();
            if accept(&schedule) {
                return schedule;
            }
        }
    })
    .await
    .expect("no matching schedule within 5s")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_messages_become_published_schedule() {
    let mut h = start(create_pipeline());

    h.inbound_tx.send(status_message("DOT-1", 1, 0.5, 0.0)).unwrap();
    h.inbound_tx.send(status_message("DOT-2", 2, 1.0, 0.05)).unwrap();

    let schedule = wait_for_schedule(&mut h.outbound_rx, |s| s.len() == 2).await;
    assert_eq!(schedule.version, 1);

    let first = schedule.entry("DOT-1").unwrap();
    let second = schedule.entry("DOT-2").unwrap();
    let mut ranks = vec![first.rank, second.rank];
    ranks.sort();
    assert_eq!(ranks, vec![0, 1]);

    // Lanes 1 and 2 conflict: the later vehicle waits for the earlier to clear
    let (lead, follow) = if first.rank == 0 { (first, second) } else { (second, first) };
    assert!(follow.departure_time >= lead.clearance_time);

    h.shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), h.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert!(h.inbound_stopped.load(Ordering::SeqCst));
    assert!(h.outbound_stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_empty_schedules_published_on_cadence() {
    let mut h = start(create_pipeline());

    let mut timestamps = Vec::new();
    for _ in 0..3 {
        let schedule = wait_for_schedule(&mut h.outbound_rx, |_| true).await;
        assert!(schedule.is_empty());
        timestamps.push(schedule.timestamp);
    }

    for pair in timestamps.windows(2) {
        assert!(pair[1] - pair[0] >= INTERVAL.as_millis() as i64);
    }

    h.shutdown_tx.send(()).unwrap();
    assert!(h.handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_exit_removes_vehicle_from_schedule() {
    let mut h = start(create_pipeline());

    h.inbound_tx.send(status_message("DOT-7", 3, 0.0, 0.0)).unwrap();
    wait_for_schedule(&mut h.outbound_rx, |s| s.entry("DOT-7").is_some()).await;

    let exit = serde_json::json!({
        "version": 1,
        "vehicle_id": "DOT-7",
        "lane_id": 3,
        "distance": 0.0,
        "speed": 5.0,
        "intent": "exited",
        "timestamp": Utc::now().timestamp_millis() + 1,
    });
    h.inbound_tx.send(exit.to_string().into_bytes()).unwrap();
    wait_for_schedule(&mut h.outbound_rx, |s| s.is_empty()).await;

    h.shutdown_tx.send(()).unwrap();
    assert!(h.handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_malformed_payload_is_counted_and_skipped() {
    let pipeline = create_pipeline();
    let metrics = pipeline.metrics();
    let mut h = start(pipeline);

    h.inbound_tx.send(b"{not json".to_vec()).unwrap();
    h.inbound_tx.send(status_message("DOT-3", 1, 0.2, 0.0)).unwrap();

    wait_for_schedule(&mut h.outbound_rx, |s| s.len() == 1).await;

    // The store update lands just before the counter does
    tokio::time::timeout(Duration::from_secs(5), async {
        while metrics.get_snapshot().updates_applied < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let snapshot = metrics.get_snapshot();
    assert_eq!(snapshot.updates_rejected, 1);
    assert_eq!(snapshot.updates_applied, 1);

    h.shutdown_tx.send(()).unwrap();
    assert!(h.handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_closed_inbound_terminates_pipeline_with_error() {
    let h = start(create_pipeline());

    drop(h.inbound_tx);

    let result = tokio::time::timeout(Duration::from_secs(10), h.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_err());
    assert!(h.inbound_stopped.load(Ordering::SeqCst));
    assert!(h.outbound_stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_publish_failures_do_not_stop_scheduling() {
    let pipeline = create_pipeline();
    let metrics = pipeline.metrics();

    let (_inbound_tx, rx) = mpsc::unbounded_channel();
    let inbound = ChannelInbound {
        rx,
        running: true,
        stopped: Arc::new(AtomicBool::new(false)),
    };
    let attempts = Arc::new(AtomicU64::new(0));
    let outbound = FailingOutbound {
        attempts: Arc::clone(&attempts),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(pipeline.run(Box::new(inbound), Arc::new(outbound), async move {
        let _ = shutdown_rx.await;
    }));

    tokio::time::timeout(Duration::from_secs(5), async {
        while attempts.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(()).unwrap();
    assert!(handle.await.unwrap().is_ok());

    let snapshot = metrics.get_snapshot();
    assert!(snapshot.publish_failures >= 3);
    assert_eq!(snapshot.schedules_published, 0);
}
