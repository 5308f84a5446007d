//! Periodic collect-and-stream driver

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::client::SessionClient;
use crate::collector::Aggregator;
use crate::config::StreamingConfig;
use crate::domain::{Snapshot, Subscription};
use crate::error::Result;
use crate::services::HealthState;

/// Inbound kinds that prove the server link is alive
const LIVENESS_EVENTS: [&str; 5] = [
    "fingerprint_update",
    "violation_alert",
    "device_analytics",
    "session_integrity",
    "subscription_confirmed",
];

/// Periodic snapshot streaming service.
///
/// Owns the collect-and-send cycle: registers the configured
/// subscriptions, connects the session, then collects and transmits a
/// full snapshot every interval until stopped. Send failures are
/// absorbed by the client's queue, so a cycle never aborts the loop.
pub struct SnapshotStreamer {
    client: SessionClient,
    aggregator: Arc<Aggregator>,
    health: Arc<HealthState>,
    config: StreamingConfig,
    last_snapshot: RwLock<Option<Snapshot>>,
    cycles: AtomicU64,
    shutdown: Notify,
    stopping: AtomicBool,
}

impl SnapshotStreamer {
    pub fn new(
        client: SessionClient,
        aggregator: Arc<Aggregator>,
        config: StreamingConfig,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            client,
            aggregator,
            health,
            config,
            last_snapshot: RwLock::new(None),
            cycles: AtomicU64::new(0),
            shutdown: Notify::new(),
            stopping: AtomicBool::new(false),
        }
    }

    /// Most recent snapshot, once any pass has completed
    pub async fn last_snapshot(&self) -> Option<Snapshot> {
        self.last_snapshot.read().await.clone()
    }

    /// Completed collect-and-send cycles
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Stop the streaming loop
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Run the streaming loop until stopped
    pub async fn run(&self) -> Result<()> {
        info!(
            interval_ms = self.config.interval_ms,
            subscriptions = self.config.subscriptions.len(),
            "Starting snapshot streamer"
        );

        self.wire_health_events();

        for name in &self.config.subscriptions {
            match name.parse::<Subscription>() {
                Ok(subscription) => self.client.subscribe(subscription.as_str()).await,
                Err(_) => warn!(subscription = %name, "Skipping unknown subscription"),
            }
        }

        if let Err(e) = self.client.connect().await {
            warn!(
                "Initial connection failed, retries continue in background: {}",
                e
            );
        }

        self.client
            .start_device_streaming(self.config.interval_ms)
            .await;
        self.client.start_session_monitoring().await;

        let mut ticker = interval(Duration::from_millis(self.config.interval_ms.max(100)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    self.stream_once().await;
                }
                _ = self.shutdown.notified() => break,
            }
        }

        info!("Snapshot streamer stopped after {} cycles", self.cycles());
        Ok(())
    }

    /// One collect-and-send cycle
    async fn stream_once(&self) {
        let snapshot = self.aggregator.collect_full().await;
        let failed = snapshot.failed_categories().len();

        match self.client.send_snapshot(&snapshot).await {
            Ok(true) => {
                self.health.record_snapshot(true);
                debug!(
                    collection_id = %snapshot.collection_id,
                    failed_categories = failed,
                    "Snapshot transmitted"
                );
            }
            Ok(false) => {
                self.health.record_snapshot(false);
                debug!(
                    collection_id = %snapshot.collection_id,
                    "Snapshot queued for delivery"
                );
            }
            Err(e) => {
                self.health.record_snapshot(false);
                warn!("Snapshot send failed: {}", e);
            }
        }

        *self.last_snapshot.write().await = Some(snapshot);
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    fn wire_health_events(&self) {
        let health = Arc::clone(&self.health);
        self.client
            .on("connected", move |_| health.set_connected(true));

        let health = Arc::clone(&self.health);
        self.client
            .on("disconnected", move |_| health.set_connected(false));

        for kind in LIVENESS_EVENTS {
            let health = Arc::clone(&self.health);
            self.client.on(kind, move |_| health.record_message());
        }
    }
}
