use super::transport::{AuthCredential, ConnectParams, Connector, SftpTransport};
use crate::config::{AuthMethod, ConnectSettings};
use crate::error::{AppError, AppResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Message recorded when the health monitor gives up on a channel
pub const CONNECTION_LOST: &str = "Connection lost";

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    /// Legal edges of the lifecycle. `Error` may only be left by a fresh
    /// connect attempt or an explicit disconnect.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connected, Disconnected)
                | (Connected, Error)
                | (Error, Connecting)
                | (Error, Disconnected)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Broadcast on every status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// Session info for listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything needed to (re)open one session
#[derive(Clone)]
pub struct SessionConfig {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_method: AuthMethod,
    pub password: Option<String>,
    pub private_key: Option<Vec<u8>>,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth_method", &self.auth_method)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

struct SessionState {
    status: SessionStatus,
    last_error: Option<String>,
    transport: Option<Arc<dyn SftpTransport>>,
    connected_at: Option<i64>,
}

/// One logical connection to a remote host.
///
/// Lifecycle operations (`connect`, `disconnect`, health checks) are
/// serialized by `lifecycle`; readers only ever take the short `state` lock.
pub struct ConnectionSession {
    id: String,
    config: RwLock<SessionConfig>,
    settings: ConnectSettings,
    connector: Arc<dyn Connector>,
    lifecycle: tokio::sync::Mutex<()>,
    state: RwLock<SessionState>,
    monitor: parking_lot::Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<StatusChange>,
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config.read();
        let (status, last_error) = {
            let state = self.state.read();
            (state.status, state.last_error.clone())
        };
        f.debug_struct("ConnectionSession")
            .field("config", &*config)
            .field("status", &status)
            .field("last_error", &last_error)
            .finish()
    }
}

impl ConnectionSession {
    pub fn new(
        config: SessionConfig,
        settings: ConnectSettings,
        connector: Arc<dyn Connector>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Arc::new(Self {
            id: config.id.clone(),
            config: RwLock::new(config),
            settings,
            connector,
            lifecycle: tokio::sync::Mutex::new(()),
            state: RwLock::new(SessionState {
                status: SessionStatus::Disconnected,
                last_error: None,
                transport: None,
                connected_at: None,
            }),
            monitor: parking_lot::Mutex::new(None),
            events,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> String {
        self.config.read().name.clone()
    }

    pub fn host(&self) -> String {
        self.config.read().host.clone()
    }

    pub fn username(&self) -> String {
        self.config.read().username.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn is_connected(&self) -> bool {
        let state = self.state.read();
        state.status == SessionStatus::Connected && state.transport.is_some()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn info(&self) -> SessionInfo {
        let config = self.config.read();
        let state = self.state.read();
        SessionInfo {
            id: self.id.clone(),
            name: config.name.clone(),
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            status: state.status,
            last_error: state.last_error.clone(),
            connected_at: state.connected_at,
        }
    }

    /// Receive every status transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.events.subscribe()
    }

    /// The live channel. Fails with `StaleConnection` after a health failure
    /// and `NotConnected` otherwise.
    pub fn transport(&self) -> AppResult<Arc<dyn SftpTransport>> {
        let (transport, status) = {
            let state = self.state.read();
            (state.transport.clone(), state.status)
        };
        match (transport, status) {
            (Some(transport), SessionStatus::Connected) => Ok(transport),
            (_, SessionStatus::Error) => Err(AppError::StaleConnection(self.host())),
            _ => Err(AppError::NotConnected(self.host())),
        }
    }

    /// Swap in fresh credentials. Ignored while connected.
    pub async fn update_config(&self, config: SessionConfig) {
        let _guard = self.lifecycle.lock().await;
        if self.is_connected() {
            return;
        }
        *self.config.write() = config;
    }

    /// Open the channel. A no-op when already connected.
    pub async fn connect(self: &Arc<Self>) -> AppResult<()> {
        let _guard = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        self.state.write().last_error = None;
        self.transition(SessionStatus::Connecting);

        let (host, port, username) = {
            let config = self.config.read();
            (config.host.clone(), config.port, config.username.clone())
        };
        tracing::info!("Connecting to {}@{}:{} (session {})", username, host, port, self.id);

        match self.open_with_retry().await {
            Ok(transport) => {
                {
                    let mut state = self.state.write();
                    state.transport = Some(transport);
                    state.connected_at = Some(chrono::Utc::now().timestamp());
                }
                self.transition(SessionStatus::Connected);
                self.start_monitor();
                tracing::info!("SFTP connected (session {})", self.id);
                Ok(())
            }
            Err(e) => {
                let err = with_host(&host, e);
                self.state.write().last_error = Some(crate::logging::sanitize(&err.to_string()));
                self.transition(SessionStatus::Error);
                tracing::error!("Connection failed (session {}): {}", self.id, err);
                Err(err)
            }
        }
    }

    async fn open_with_retry(&self) -> AppResult<Arc<dyn SftpTransport>> {
        let params = {
            let config = self.config.read();
            ConnectParams {
                host: config.host.clone(),
                port: config.port,
                username: config.username.clone(),
                auth: AuthCredential::resolve(
                    config.auth_method,
                    config.password.clone(),
                    config.private_key.clone(),
                    config.passphrase.clone(),
                )?,
                timeout: self.settings.timeout,
            }
        };

        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(params.timeout, self.connector.open(&params)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Network(format!(
                    "timed out after {}s",
                    params.timeout.as_secs()
                ))),
            };

            match result {
                Ok(transport) => return Ok(transport),
                Err(e) if e.is_retryable() && attempt < self.settings.retries => {
                    attempt += 1;
                    let delay = self.settings.backoff_for(attempt);
                    tracing::warn!(
                        "Connect attempt {} failed (session {}): {}; retrying in {:?}",
                        attempt,
                        self.id,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the channel. Safe to call in any state.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        self.stop_monitor();

        let transport = {
            let mut state = self.state.write();
            state.connected_at = None;
            state.last_error = None;
            state.transport.take()
        };
        if let Some(transport) = transport {
            if let Err(e) = transport.close().await {
                tracing::debug!("Error while closing session {}: {}", self.id, e);
            }
        }

        if self.status() != SessionStatus::Disconnected {
            self.transition(SessionStatus::Disconnected);
            tracing::info!("Disconnected (session {})", self.id);
        }
    }

    /// Disconnect, then connect again with the current config.
    pub async fn reconnect(self: &Arc<Self>) -> AppResult<()> {
        self.disconnect().await;
        self.connect().await
    }

    /// Cheap liveness probe; never fails.
    pub async fn is_healthy(&self) -> bool {
        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(_) => return false,
        };
        transport.realpath(".").await.is_ok()
    }

    /// Connect, probe, and report. Never leaves the session connected.
    pub async fn test_connection(self: &Arc<Self>) -> ConnectionTestResult {
        let result = match self.connect().await {
            Ok(()) if self.is_healthy().await => ConnectionTestResult {
                success: true,
                error: None,
            },
            Ok(()) => ConnectionTestResult {
                success: false,
                error: Some("Connection opened but the server did not respond".to_string()),
            },
            Err(e) => ConnectionTestResult {
                success: false,
                error: Some(crate::logging::sanitize(&e.to_string())),
            },
        };
        self.disconnect().await;
        result
    }

    fn transition(&self, next: SessionStatus) {
        let prev = {
            let mut state = self.state.write();
            let prev = state.status;
            if prev == next {
                return;
            }
            if !prev.can_transition_to(next) {
                tracing::warn!("Unexpected transition {} -> {} (session {})", prev, next, self.id);
            }
            state.status = next;
            prev
        };
        tracing::debug!("Session {} {} -> {}", self.id, prev, next);
        let _ = self.events.send(StatusChange { from: prev, to: next });
    }

    fn start_monitor(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let interval = self.settings.health_interval;
        let handle = tokio::spawn(run_monitor(weak, interval));
        if let Some(previous) = self.monitor.lock().replace(handle) {
            previous.abort();
        }
    }

    fn stop_monitor(&self) {
        if let Some(handle) = self.monitor.lock().take() {
            handle.abort();
        }
    }

    /// One monitor tick. Returns whether monitoring should continue.
    async fn check_health(&self) -> bool {
        let _guard = self.lifecycle.lock().await;
        if self.status() != SessionStatus::Connected {
            return false;
        }
        if self.is_healthy().await {
            return true;
        }

        let transport = {
            let mut state = self.state.write();
            state.last_error = Some(CONNECTION_LOST.to_string());
            state.connected_at = None;
            state.transport.take()
        };
        self.transition(SessionStatus::Error);
        tracing::warn!("Health check failed (session {})", self.id);

        if let Some(transport) = transport {
            let id = self.id.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.close().await {
                    tracing::debug!("Error closing stale channel (session {}): {}", id, e);
                }
            });
        }
        false
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_monitor(session: Weak<ConnectionSession>, interval: std::time::Duration) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        if !session.check_health().await {
            break;
        }
    }
}

/// Attach the host to a connect failure, keeping its category.
fn with_host(host: &str, err: AppError) -> AppError {
    let wrap = |cause: String| format!("Failed to connect to {}: {}", host, cause);
    match err {
        AppError::Auth(m) => AppError::Auth(wrap(m)),
        AppError::Network(m) => AppError::Network(wrap(m)),
        AppError::Config(m) => AppError::Config(wrap(m)),
        AppError::Sftp(m) => AppError::Sftp(wrap(m)),
        AppError::Io(e) => AppError::Network(wrap(e.to_string())),
        other => AppError::Network(wrap(other.to_string())),
    }
}
