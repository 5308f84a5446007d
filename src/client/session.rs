//! Session client - owns one logical monitoring session to the backend.
//!
//! The session survives individual connections: explicit `disconnect()` or
//! reconnect exhaustion are the only terminal paths. Everything else the
//! transport does (refused connections, timeouts, abnormal closes) feeds
//! the reconnection schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::protocol;
use crate::client::queue::{OutboundQueue, QueueStats};
use crate::client::router::{EventRouter, HandlerId};
use crate::client::transport::{ConnectionReader, ConnectionWriter, Frame, Transport, WsTransport};
use crate::config::SessionConfig;
use crate::domain::{derive_device_id, ConnectionState, Session, Snapshot, StateChange};
use crate::error::{ArgusError, Result};

/// Compute the backoff delay for one reconnect attempt.
///
/// `delay = min(base * 2^(attempt - 1), cap)`, so attempt 1 waits the base
/// interval and the delay doubles until the cap.
pub fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    let delay_ms = base_ms.saturating_mul(1u64 << exp).min(cap_ms);
    Duration::from_millis(delay_ms)
}

/// How one connection's message loop ended
enum LoopExit {
    /// Client-initiated shutdown
    Shutdown,
    /// Server closed with a normal status code
    CleanClose,
    /// Abnormal close, read error, or failed write
    Lost,
}

#[derive(Clone)]
struct RunControl {
    notify: Arc<Notify>,
    stopping: Arc<AtomicBool>,
}

impl RunControl {
    fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

struct RunHandle {
    ctl: RunControl,
    handle: JoinHandle<()>,
}

/// Point-in-time view of the session client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub reconnections: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub heartbeats_sent: u64,
    pub queue: QueueStats,
    pub subscriptions: usize,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub connection_id: Option<String>,
}

/// Reconnecting protocol client for one monitoring session.
///
/// Cloning is cheap and every clone shares the same underlying session
/// state; the client clones itself into its background run task.
#[derive(Clone)]
pub struct SessionClient {
    session: Session,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    router: Arc<EventRouter>,
    state: Arc<RwLock<ConnectionState>>,
    writer: Arc<Mutex<Option<Box<dyn ConnectionWriter>>>>,
    queue: Arc<Mutex<OutboundQueue>>,
    subscriptions: Arc<RwLock<Vec<String>>>,
    reconnect_attempts: Arc<AtomicU32>,
    reconnections: Arc<AtomicU64>,
    last_heartbeat: Arc<RwLock<Option<DateTime<Utc>>>>,
    connection_id: Arc<RwLock<Option<String>>>,
    messages_sent: Arc<AtomicU64>,
    messages_received: Arc<AtomicU64>,
    heartbeats_sent: Arc<AtomicU64>,
    /// Serializes connect/disconnect so lifecycle steps never interleave
    lifecycle: Arc<Mutex<()>>,
    run: Arc<Mutex<Option<RunHandle>>>,
}

impl SessionClient {
    /// Create a client backed by the production WebSocket transport
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Create a client with a custom transport
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let device_id = derive_device_id();
        let endpoint = protocol::derive_endpoint(&config.base_url, &session_id)?;
        let session = Session::new(session_id, device_id, endpoint);

        info!(
            session_id = %session.session_id,
            endpoint = %session.endpoint,
            "Session client created"
        );

        let queue_capacity = config.queue_capacity;
        Ok(Self {
            session,
            config,
            transport,
            router: Arc::new(EventRouter::new()),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            queue: Arc::new(Mutex::new(OutboundQueue::new(queue_capacity))),
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            reconnect_attempts: Arc::new(AtomicU32::new(0)),
            reconnections: Arc::new(AtomicU64::new(0)),
            last_heartbeat: Arc::new(RwLock::new(None)),
            connection_id: Arc::new(RwLock::new(None)),
            messages_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            heartbeats_sent: Arc::new(AtomicU64::new(0)),
            lifecycle: Arc::new(Mutex::new(())),
            run: Arc::new(Mutex::new(None)),
        })
    }

    /// Session identity (id, device id, derived endpoint)
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Event router for this session
    pub fn router(&self) -> Arc<EventRouter> {
        Arc::clone(&self.router)
    }

    /// Register a handler for a local or pass-through event type
    pub fn on<F>(&self, event_type: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.router.on(event_type, handler)
    }

    /// Remove one previously registered handler
    pub fn off(&self, event_type: &str, id: HandlerId) -> bool {
        self.router.off(event_type, id)
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Active subscription names in registration order
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.read().await.clone()
    }

    /// Messages currently buffered for replay, in transmission order
    pub async fn queued_messages(&self) -> Vec<Value> {
        self.queue.lock().await.iter().cloned().collect()
    }

    /// Outbound queue statistics
    pub async fn queue_stats(&self) -> QueueStats {
        self.queue.lock().await.stats()
    }

    /// Point-in-time statistics
    pub async fn stats(&self) -> SessionStats {
        SessionStats {
            state: *self.state.read().await,
            reconnect_attempts: self.reconnect_attempts.load(Ordering::SeqCst),
            reconnections: self.reconnections.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            queue: self.queue.lock().await.stats(),
            subscriptions: self.subscriptions.read().await.len(),
            last_heartbeat: *self.last_heartbeat.read().await,
            connection_id: self.connection_id.read().await.clone(),
        }
    }

    /// Open the session connection.
    ///
    /// No-op when a connection or retry schedule is already active. The
    /// returned result reflects only the initial attempt: on failure the
    /// reconnection schedule is still armed in the background, so an `Err`
    /// here does not mean the session is dead.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;

        {
            let state = *self.state.read().await;
            if !state.is_idle() {
                debug!(%state, "connect() ignored, session already active");
                return Ok(());
            }
        }

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting, "connect requested")
            .await;

        let ctl = RunControl::new();
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        info!("Connecting to {}", self.session.endpoint);

        let attempt = timeout(connect_timeout, self.transport.connect(&self.session.endpoint)).await;
        match attempt {
            Ok(Ok((writer, reader))) => {
                *self.writer.lock().await = Some(writer);
                if let Err(e) = self.on_open().await {
                    // The transport opened and then died before the replay
                    // finished; the run task picks up from here.
                    warn!("Connection lost during open: {}", e);
                    self.writer.lock().await.take();
                    self.set_state(ConnectionState::Reconnecting, "connection lost during open")
                        .await;
                    self.spawn_run(None, ctl).await;
                    return Ok(());
                }
                self.spawn_run(Some(reader), ctl).await;
                Ok(())
            }
            Ok(Err(e)) => {
                self.arm_retries_after_initial_failure(&e, ctl).await;
                Err(e)
            }
            Err(_) => {
                let e = ArgusError::ConnectTimeout {
                    elapsed_ms: self.config.connect_timeout_ms,
                };
                self.arm_retries_after_initial_failure(&e, ctl).await;
                Err(e)
            }
        }
    }

    async fn arm_retries_after_initial_failure(&self, e: &ArgusError, ctl: RunControl) {
        warn!("Initial connection attempt failed: {}", e);
        self.set_state(ConnectionState::Reconnecting, "initial connect failed")
            .await;
        self.emit(
            "error",
            json!({
                "reason": "connect_failed",
                "message": e.to_string(),
            }),
        );
        self.spawn_run(None, ctl).await;
    }

    /// Close the session.
    ///
    /// Idempotent. Stops the heartbeat, suppresses any pending reconnect
    /// timer, closes the transport with a normal status code, and clears
    /// the subscription set. No callback of this client fires afterwards.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;

        let was_active = !(*self.state.read().await).is_idle();

        if let Some(run) = self.run.lock().await.take() {
            run.ctl.stop();
            if let Err(e) = run.handle.await {
                warn!("Run task ended abnormally: {}", e);
            }
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.close().await;
        }

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.subscriptions.write().await.clear();
        *self.connection_id.write().await = None;

        if was_active {
            self.set_state(ConnectionState::Disconnected, "client disconnect")
                .await;
            self.emit(
                "disconnected",
                json!({"reason": "client_disconnect", "normal": true}),
            );
            info!("Session disconnected by client");
        }
    }

    /// Register interest in a named server-push subscription.
    ///
    /// Idempotent. Sent immediately when connected; always retained for
    /// replay on the next successful open.
    pub async fn subscribe(&self, subscription: &str) {
        {
            let mut subs = self.subscriptions.write().await;
            if subs.iter().any(|s| s == subscription) {
                debug!(subscription, "Already subscribed");
            } else {
                subs.push(subscription.to_string());
                info!(subscription, "Subscription registered");
            }
        }

        if self.state().await.can_transmit() {
            let frame = protocol::build_subscribe(&self.session.session_id, subscription);
            if let Err(e) = self.write_direct(frame.to_string()).await {
                warn!(
                    subscription,
                    "Subscribe send failed, will replay after reconnect: {}", e
                );
            }
        }
    }

    /// Send one protocol message.
    ///
    /// Transmits immediately when connected, otherwise buffers the message
    /// for replay. Returns `true` only when the message went out on the
    /// wire now; a buffered or dropped message returns `false` (drops are
    /// counted in [`Self::queue_stats`]).
    pub async fn send(&self, message: Value) -> bool {
        if self.state().await.can_transmit() {
            match self.write_direct(message.to_string()).await {
                Ok(()) => {
                    self.messages_sent.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(e) => {
                    warn!("Send failed, buffering message: {}", e);
                    self.queue.lock().await.enqueue(message);
                    return false;
                }
            }
        }

        self.queue.lock().await.enqueue(message);
        false
    }

    /// Build and send a fingerprint_data frame for one snapshot
    pub async fn send_snapshot(&self, snapshot: &Snapshot) -> Result<bool> {
        let frame = protocol::build_fingerprint_data(&self.session, snapshot)?;
        Ok(self.send(frame).await)
    }

    /// Ask the backend to expect periodic device snapshots
    pub async fn start_device_streaming(&self, interval_ms: u64) -> bool {
        let frame = protocol::build_start_device_streaming(&self.session, interval_ms);
        self.send(frame).await
    }

    /// Open integrity monitoring for this session
    pub async fn start_session_monitoring(&self) -> bool {
        let frame = protocol::build_start_session_monitoring(&self.session);
        self.send(frame).await
    }

    // ==================== internal machinery ====================

    async fn set_state(&self, to: ConnectionState, reason: &str) {
        let mut state = self.state.write().await;
        let from = *state;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            warn!(%from, %to, reason, "Unexpected connection state transition");
        }
        let change = StateChange::new(from, to, reason);
        info!(
            from = %change.from,
            to = %change.to,
            reason = %change.reason,
            "Connection state changed"
        );
        *state = to;
    }

    fn emit(&self, event_type: &str, payload: Value) {
        debug!(event_type, "Emitting event");
        self.router.dispatch(event_type, &payload);
    }

    async fn write_direct(&self, text: String) -> Result<()> {
        let mut writer = self.writer.lock().await;
        Self::write_through(&mut writer, text).await
    }

    async fn write_through(
        writer: &mut Option<Box<dyn ConnectionWriter>>,
        text: String,
    ) -> Result<()> {
        match writer.as_mut() {
            Some(w) => w.send(text).await,
            None => Err(ArgusError::ConnectionClosed(
                "no transport writer installed".to_string(),
            )),
        }
    }

    async fn spawn_run(&self, reader: Option<Box<dyn ConnectionReader>>, ctl: RunControl) {
        let client = self.clone();
        let task_ctl = ctl.clone();
        let handle = tokio::spawn(async move {
            client.run(reader, task_ctl).await;
        });
        *self.run.lock().await = Some(RunHandle { ctl, handle });
    }

    /// Background task: drives the message loop and the reconnect schedule
    /// until shutdown, clean close, or exhaustion.
    async fn run(self, initial_reader: Option<Box<dyn ConnectionReader>>, ctl: RunControl) {
        let mut reader = initial_reader;

        loop {
            let mut current = match reader.take() {
                Some(r) => r,
                None => match self.reconnect_with_backoff(&ctl).await {
                    Some(r) => r,
                    None => return,
                },
            };

            match self.drive_connection(&mut current, &ctl).await {
                LoopExit::Shutdown => return,
                LoopExit::CleanClose => {
                    self.writer.lock().await.take();
                    self.set_state(ConnectionState::Disconnected, "server closed normally")
                        .await;
                    self.emit(
                        "disconnected",
                        json!({"reason": "server_close", "normal": true}),
                    );
                    info!("Server closed the connection normally, not reconnecting");
                    return;
                }
                LoopExit::Lost => {
                    self.writer.lock().await.take();
                    self.set_state(ConnectionState::Reconnecting, "connection lost")
                        .await;
                    self.emit(
                        "disconnected",
                        json!({"reason": "connection_lost", "normal": false}),
                    );
                }
            }
        }
    }

    /// Pump one live connection until it ends one way or another
    async fn drive_connection(
        &self,
        reader: &mut Box<dyn ConnectionReader>,
        ctl: &RunControl,
    ) -> LoopExit {
        let heartbeat_period = Duration::from_millis(self.config.heartbeat_interval_ms);
        let mut heartbeat = interval_at(Instant::now() + heartbeat_period, heartbeat_period);

        loop {
            if ctl.is_stopping() {
                self.close_writer().await;
                return LoopExit::Shutdown;
            }

            tokio::select! {
                frame = reader.next_frame() => match frame {
                    Frame::Text(text) => self.handle_text(&text).await,
                    Frame::Ping(data) => {
                        let mut writer = self.writer.lock().await;
                        if let Some(w) = writer.as_mut() {
                            if let Err(e) = w.pong(data).await {
                                warn!("Pong failed: {}", e);
                                return LoopExit::Lost;
                            }
                        }
                    }
                    Frame::Closed { normal: true } => return LoopExit::CleanClose,
                    Frame::Closed { normal: false } => return LoopExit::Lost,
                },
                _ = heartbeat.tick() => {
                    let frame = protocol::build_heartbeat(&self.session.session_id);
                    if let Err(e) = self.write_direct(frame.to_string()).await {
                        warn!("Heartbeat send failed: {}", e);
                        return LoopExit::Lost;
                    }
                    self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
                    debug!("Sent heartbeat");
                }
                _ = ctl.notify.notified() => {
                    self.close_writer().await;
                    return LoopExit::Shutdown;
                }
            }
        }
    }

    async fn close_writer(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.close().await;
        }
    }

    /// Retry with exponential backoff until a connection opens, the
    /// attempt budget runs out, or shutdown is requested. Returns the new
    /// reader on success.
    async fn reconnect_with_backoff(&self, ctl: &RunControl) -> Option<Box<dyn ConnectionReader>> {
        let base = self.config.reconnect_base_ms;
        let cap = self.config.reconnect_cap_ms;
        let max_attempts = self.config.max_reconnect_attempts;
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        loop {
            if ctl.is_stopping() {
                return None;
            }

            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > max_attempts {
                let terminal = ArgusError::ReconnectExhausted {
                    attempts: max_attempts,
                };
                error!("Giving up: {}", terminal);
                self.set_state(ConnectionState::Disconnected, "reconnect exhausted")
                    .await;
                self.emit(
                    "error",
                    json!({
                        "reason": "reconnect_exhausted",
                        "attempts": max_attempts,
                        "message": terminal.to_string(),
                    }),
                );
                self.emit(
                    "disconnected",
                    json!({"reason": "reconnect_exhausted", "normal": false}),
                );
                return None;
            }

            let delay = backoff_delay(attempt, base, cap);
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect attempt"
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = ctl.notify.notified() => return None,
            }
            if ctl.is_stopping() {
                return None;
            }

            match timeout(connect_timeout, self.transport.connect(&self.session.endpoint)).await {
                Ok(Ok((writer, new_reader))) => {
                    *self.writer.lock().await = Some(writer);
                    match self.on_open().await {
                        Ok(()) => {
                            self.reconnections.fetch_add(1, Ordering::Relaxed);
                            info!(attempt, "Reconnected");
                            return Some(new_reader);
                        }
                        Err(e) => {
                            warn!("Connection lost during open: {}", e);
                            self.writer.lock().await.take();
                            self.set_state(
                                ConnectionState::Reconnecting,
                                "connection lost during open",
                            )
                            .await;
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(attempt, "Reconnect attempt failed: {}", e);
                    self.emit(
                        "error",
                        json!({
                            "reason": "reconnect_failed",
                            "attempt": attempt,
                            "message": e.to_string(),
                        }),
                    );
                }
                Err(_) => {
                    warn!(attempt, "Reconnect attempt timed out");
                    self.emit(
                        "error",
                        json!({
                            "reason": "reconnect_failed",
                            "attempt": attempt,
                            "message": format!(
                                "connection attempt timed out after {}ms",
                                self.config.connect_timeout_ms
                            ),
                        }),
                    );
                }
            }
        }
    }

    /// Runs on every successful open: state flip, counter reset, and the
    /// replay/flush sequence. Subscriptions are always re-sent before any
    /// queued application message. The writer stays locked for the whole
    /// sequence, so a `send()` racing the flush serializes behind it and
    /// cannot overtake messages submitted earlier.
    async fn on_open(&self) -> Result<()> {
        self.set_state(ConnectionState::Connected, "transport open")
            .await;
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.emit(
            "connected",
            json!({
                "session_id": self.session.session_id,
                "device_id": self.session.device_id,
                "endpoint": self.session.endpoint,
            }),
        );

        let mut writer = self.writer.lock().await;

        let subscriptions = self.subscriptions.read().await.clone();
        for name in &subscriptions {
            let frame = protocol::build_subscribe(&self.session.session_id, name);
            Self::write_through(&mut writer, frame.to_string()).await?;
            debug!(subscription = %name, "Replayed subscription");
        }
        if !subscriptions.is_empty() {
            info!("Replayed {} subscriptions", subscriptions.len());
        }

        loop {
            let next = self.queue.lock().await.dequeue();
            let Some(message) = next else { break };
            if let Err(e) = Self::write_through(&mut writer, message.to_string()).await {
                self.queue.lock().await.requeue_front(message);
                return Err(e);
            }
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Handle one inbound text frame
    async fn handle_text(&self, text: &str) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);

        let mut message: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Dropping malformed inbound message: {}", e);
                return;
            }
        };
        let Some(msg_type) = message.get("type").and_then(Value::as_str) else {
            warn!("Dropping inbound message without a type field");
            return;
        };
        let msg_type = msg_type.to_string();

        match msg_type.as_str() {
            "connection_status" => {
                let connection_id = message
                    .get("connection_id")
                    .and_then(Value::as_str)
                    .map(String::from);
                info!(?connection_id, "Connection status received");
                *self.connection_id.write().await = connection_id;
            }
            "subscription_ack" => {
                let subscription = message.get("subscription").and_then(Value::as_str);
                let status = message.get("status").and_then(Value::as_str);
                info!(?subscription, ?status, "Subscription acknowledged");
                self.emit("subscription_confirmed", message);
            }
            "heartbeat" => {
                *self.last_heartbeat.write().await = Some(Utc::now());
                let frame = protocol::build_heartbeat(&self.session.session_id);
                match self.write_direct(frame.to_string()).await {
                    Ok(()) => {
                        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => warn!("Heartbeat echo failed: {}", e),
                }
            }
            "error" => {
                let detail = message.get("error").and_then(Value::as_str).unwrap_or("");
                warn!(detail, "Server reported an error");
                self.emit("server_error", message);
            }
            "fingerprint_update" | "violation_alert" | "device_analytics"
            | "session_integrity" => {
                if let Some(obj) = message.as_object_mut() {
                    obj.insert(
                        "session_id".to_string(),
                        json!(self.session.session_id),
                    );
                    obj.insert("device_id".to_string(), json!(self.session.device_id));
                }
                self.emit(&msg_type, message);
            }
            other => {
                debug!(msg_type = other, "Ignoring unknown message type");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn test_backoff_delay_sequence() {
        let delays: Vec<u64> = (1..=6)
            .map(|attempt| backoff_delay(attempt, 1000, 30000).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000]);
    }

    #[test]
    fn test_backoff_delay_stays_capped() {
        assert_eq!(backoff_delay(10, 1000, 30000), Duration::from_millis(30000));
        assert_eq!(backoff_delay(63, 1000, 30000), Duration::from_millis(30000));
        assert_eq!(backoff_delay(1, 500, 30000), Duration::from_millis(500));
    }

    struct RefusingTransport;

    #[async_trait]
    impl Transport for RefusingTransport {
        async fn connect(
            &self,
            _url: &str,
        ) -> Result<(Box<dyn ConnectionWriter>, Box<dyn ConnectionReader>)> {
            Err(ArgusError::Internal("connection refused".to_string()))
        }
    }

    fn offline_client() -> SessionClient {
        let config = SessionConfig {
            base_url: "https://api.example.com".to_string(),
            session_id: Some("test-session".to_string()),
            queue_capacity: 3,
            ..SessionConfig::default()
        };
        SessionClient::with_transport(config, Arc::new(RefusingTransport)).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let client = offline_client();

        client.subscribe("violation_alerts").await;
        client.subscribe("violation_alerts").await;
        client.subscribe("device_analytics").await;

        assert_eq!(
            client.subscriptions().await,
            vec!["violation_alerts", "device_analytics"]
        );
    }

    #[tokio::test]
    async fn test_send_while_disconnected_buffers() {
        let client = offline_client();

        assert!(!client.send(json!({"type": "fingerprint_data", "n": 1})).await);
        assert!(!client.send(json!({"type": "fingerprint_data", "n": 2})).await);

        let queued = client.queued_messages().await;
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0]["n"], 1);
    }

    #[tokio::test]
    async fn test_offline_queue_respects_capacity() {
        let client = offline_client();

        for n in 0..5 {
            client.send(json!({"n": n})).await;
        }

        let stats = client.queue_stats().await;
        assert_eq!(stats.current_size, 3);
        assert_eq!(stats.dropped_total, 2);

        let queued = client.queued_messages().await;
        let kept: Vec<u64> = queued.iter().map(|m| m["n"].as_u64().unwrap()).collect();
        assert_eq!(kept, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_session_identity_is_stable() {
        let client = offline_client();
        let session = client.session();

        assert_eq!(session.session_id, "test-session");
        assert_eq!(session.device_id.len(), 64);
        assert_eq!(
            session.endpoint,
            "wss://api.example.com/ws/session/test-session"
        );
    }
}
