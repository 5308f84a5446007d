//! Health check HTTP server for unattended monitoring
//!
//! Provides liveness and readiness probes for process supervision
//! (systemd/launchd) fed by session client events and collection passes.

use crate::client::{SessionClient, SessionStats};
use crate::domain::ConnectionState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Health status for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

/// Overall system health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    pub connection_state: String,
    pub session_id: String,
    pub snapshots_sent: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_stats: Option<SessionStats>,
}

/// Shared state for health server.
///
/// Timestamps are unix seconds in atomics (0 = never) so the router's
/// synchronous event handlers can record directly.
pub struct HealthState {
    /// When the process started
    pub started_at: DateTime<Utc>,
    /// Is the session connected
    pub session_connected: AtomicBool,
    /// Last inbound server message
    last_message_unix: AtomicI64,
    /// Last completed collection pass
    last_snapshot_unix: AtomicI64,
    /// Snapshots transmitted (not merely queued)
    snapshots_sent: AtomicU64,
    /// Session client reference for live state
    client: Option<SessionClient>,
    /// Inbound message staleness threshold in seconds
    pub message_staleness_threshold: u64,
    /// Snapshot staleness threshold in seconds
    pub snapshot_staleness_threshold: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            session_connected: AtomicBool::new(false),
            last_message_unix: AtomicI64::new(0),
            last_snapshot_unix: AtomicI64::new(0),
            snapshots_sent: AtomicU64::new(0),
            client: None,
            message_staleness_threshold: 90,
            snapshot_staleness_threshold: 60,
        }
    }

    pub fn with_client(mut self, client: SessionClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Update session connection status
    pub fn set_connected(&self, connected: bool) {
        self.session_connected.store(connected, Ordering::SeqCst);
    }

    /// Record an inbound server message
    pub fn record_message(&self) {
        self.last_message_unix
            .store(Utc::now().timestamp(), Ordering::SeqCst);
        self.session_connected.store(true, Ordering::SeqCst);
    }

    /// Record a completed collection pass
    pub fn record_snapshot(&self, transmitted: bool) {
        self.last_snapshot_unix
            .store(Utc::now().timestamp(), Ordering::SeqCst);
        if transmitted {
            self.snapshots_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Check if inbound traffic has gone stale
    pub fn is_message_stale(&self) -> bool {
        stale_since(
            self.last_message_unix.load(Ordering::SeqCst),
            self.message_staleness_threshold,
        )
    }

    /// Check if collection passes have gone stale
    pub fn is_snapshot_stale(&self) -> bool {
        stale_since(
            self.last_snapshot_unix.load(Ordering::SeqCst),
            self.snapshot_staleness_threshold,
        )
    }

    /// Get overall health status
    pub async fn get_health(&self) -> HealthResponse {
        let mut components = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        // Session health
        let connected = self.session_connected.load(Ordering::SeqCst);
        let message_stale = self.is_message_stale();
        let session_status = if connected && !message_stale {
            HealthStatus::Healthy
        } else if connected && message_stale {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };
        if session_status != HealthStatus::Healthy {
            overall_status = session_status;
        }
        components.push(ComponentHealth {
            name: "session".to_string(),
            status: session_status,
            message: if !connected {
                Some("Disconnected".to_string())
            } else if message_stale {
                Some("No recent server messages".to_string())
            } else {
                None
            },
            last_check: unix_to_datetime(self.last_message_unix.load(Ordering::SeqCst)),
        });

        // Collector health; a stalled collector degrades but never fails
        // the process
        let snapshot_stale = self.is_snapshot_stale();
        let collector_status = if snapshot_stale {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        if collector_status == HealthStatus::Degraded && overall_status == HealthStatus::Healthy {
            overall_status = HealthStatus::Degraded;
        }
        components.push(ComponentHealth {
            name: "collector".to_string(),
            status: collector_status,
            message: if snapshot_stale {
                Some("No recent snapshot".to_string())
            } else {
                None
            },
            last_check: unix_to_datetime(self.last_snapshot_unix.load(Ordering::SeqCst)),
        });

        let (connection_state, session_id, session_stats) = if let Some(ref client) = self.client {
            let stats = client.stats().await;
            (
                stats.state.to_string(),
                client.session().session_id.clone(),
                Some(stats),
            )
        } else {
            let state = if connected {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            (state.to_string(), "unknown".to_string(), None)
        };

        let uptime = (Utc::now() - self.started_at).num_seconds() as u64;

        HealthResponse {
            status: overall_status,
            timestamp: Utc::now(),
            uptime_seconds: uptime,
            components,
            connection_state,
            session_id,
            snapshots_sent: self.snapshots_sent.load(Ordering::Relaxed),
            session_stats,
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

fn stale_since(unix: i64, threshold_secs: u64) -> bool {
    if unix == 0 {
        return true;
    }
    let elapsed = Utc::now().timestamp().saturating_sub(unix);
    elapsed as u64 > threshold_secs
}

fn unix_to_datetime(unix: i64) -> Option<DateTime<Utc>> {
    if unix == 0 {
        None
    } else {
        DateTime::from_timestamp(unix, 0)
    }
}

/// Health check server
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Start the health server
    pub async fn run(&self) -> crate::Result<()> {
        let state = Arc::clone(&self.state);

        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting health server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::ArgusError::Internal(format!("Health server error: {}", e)))?;

        Ok(())
    }

    /// Get shared state for updating from other components
    pub fn state(&self) -> Arc<HealthState> {
        Arc::clone(&self.state)
    }
}

/// Full health check endpoint
async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health().await;
    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK, // Still return 200 for degraded
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

/// Liveness probe - is the process alive?
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe - is the session streaming?
async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}
