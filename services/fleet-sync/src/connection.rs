//! Connection lifecycle manager
//!
//! Drives one [`Transport`] through connect → subscribe → active, re-arming
//! the subscription after any failure, and feeds every inbound message
//! through the ingester in arrival order.
//!
//! ```text
//!  Idle ──activate──► Connecting ──► Subscribing ──► Active
//!                         ▲              │             │
//!                         │              ▼             ▼
//!                         └────────── Reconnecting ◄───┘
//!
//!  any state ──deactivate──► Deactivated (terminal)
//! ```
//!
//! The live session is owned by the session task. On shutdown the task hands
//! it back through its `JoinHandle` and `deactivate` releases it, so a session
//! can only ever reach `Transport::disconnect` once. The manager owns the
//! shutdown sender: dropping it without `deactivate` stops the task, which
//! then releases its own session.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use fleet_types::errors::{ConnectionError, LifecycleError, TeardownError};
use fleet_types::ids::SessionId;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::events::InboundEvent;
use crate::ingestion::StreamIngester;
use crate::metrics::SyncMetrics;
use crate::store::TrajectoryStore;
use crate::subscriber::StateSubscriber;
use crate::transport::Transport;

/// Observable state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Subscribing,
    Active,
    Reconnecting,
    Deactivated,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Active => "active",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Deactivated => "deactivated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Deactivated)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Lifecycle<S> {
    Idle,
    Running(JoinHandle<Option<S>>),
    Deactivated,
}

/// How one session attempt ended.
enum SessionEnd<S> {
    /// Shutdown requested; carries the session if one was open.
    Shutdown(Option<S>),
    Failed {
        error: ConnectionError,
        session: Option<S>,
        reached_active: bool,
    },
}

/// State shared between the manager handle and its session task.
struct Shared<T: Transport> {
    transport: T,
    config: SyncConfig,
    store: Arc<TrajectoryStore>,
    metrics: Arc<SyncMetrics>,
    state: watch::Sender<ConnectionState>,
    session_id: Mutex<Option<SessionId>>,
}

impl<T: Transport> Shared<T> {
    fn transition(&self, next: ConnectionState, session_id: SessionId) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(
                session_id = %session_id,
                from = %previous,
                to = %next,
                "Connection state changed"
            );
        }
    }

    async fn release(&self, session: T::Session, session_id: SessionId) -> Result<(), TeardownError> {
        let result = self.transport.disconnect(session).await;
        self.metrics.record_session_released();
        match &result {
            Ok(()) => debug!(session_id = %session_id, "Session released"),
            Err(e) => error!(session_id = %session_id, error = %e, "Session release failed"),
        }
        result
    }

    /// One connect → subscribe → active cycle.
    async fn run_session(
        &self,
        session_id: SessionId,
        ingester: &mut StreamIngester,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd<T::Session> {
        self.transition(ConnectionState::Connecting, session_id);
        self.metrics.record_connect_attempt();

        let connected = tokio::select! {
            biased;
            _ = stopped(shutdown) => None,
            result = self.transport.connect(&self.config.endpoint) => Some(result),
        };
        let session = match connected {
            None => return SessionEnd::Shutdown(None),
            Some(Ok(session)) => session,
            Some(Err(error)) => {
                return SessionEnd::Failed {
                    error,
                    session: None,
                    reached_active: false,
                }
            }
        };

        self.transition(ConnectionState::Subscribing, session_id);
        let (sink, mut inbound) = mpsc::channel(self.config.queue_capacity.max(1));

        let subscribed = tokio::select! {
            biased;
            _ = stopped(shutdown) => None,
            result = self.transport.subscribe(&session, &self.config.topic, sink) => Some(result),
        };
        match subscribed {
            None => return SessionEnd::Shutdown(Some(session)),
            Some(Ok(subscription)) => {
                debug!(
                    session_id = %session_id,
                    subscription = %subscription,
                    topic = %self.config.topic,
                    "Subscription armed"
                );
            }
            Some(Err(error)) => {
                return SessionEnd::Failed {
                    error,
                    session: Some(session),
                    reached_active: false,
                }
            }
        }

        self.transition(ConnectionState::Active, session_id);

        loop {
            let event = tokio::select! {
                biased;
                _ = stopped(shutdown) => None,
                event = inbound.recv() => Some(event),
            };
            match event {
                None => return SessionEnd::Shutdown(Some(session)),
                Some(Some(InboundEvent::Message(payload))) => {
                    // Rejected payloads are logged and counted by the ingester.
                    let _ = ingester.ingest(&payload);
                }
                Some(Some(InboundEvent::ConnectionLost(reason))) => {
                    return SessionEnd::Failed {
                        error: ConnectionError::ConnectionLost(reason),
                        session: Some(session),
                        reached_active: true,
                    }
                }
                Some(None) => {
                    return SessionEnd::Failed {
                        error: ConnectionError::ConnectionLost("inbound channel closed".to_string()),
                        session: Some(session),
                        reached_active: true,
                    }
                }
            }
        }
    }
}

/// Session task.
///
/// Returns the session still open when `deactivate` stops it. When the
/// manager is dropped instead, the session is released here.
async fn run<T: Transport>(
    shared: Arc<Shared<T>>,
    mut shutdown: watch::Receiver<bool>,
) -> Option<T::Session> {
    let session = run_sessions(&shared, &mut shutdown).await;
    if *shutdown.borrow() {
        return session;
    }

    let session_id = *shared
        .session_id
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let session_id = session_id.unwrap_or_default();
    warn!(session_id = %session_id, "Connection manager dropped without deactivate");
    if let Some(session) = session {
        // Already logged by release; nobody is left to report it to.
        let _ = shared.release(session, session_id).await;
    }
    shared.state.send_replace(ConnectionState::Deactivated);
    None
}

/// Runs sessions until shutdown, backing off between them.
///
/// Returns the session still open at shutdown, if any.
async fn run_sessions<T: Transport>(
    shared: &Shared<T>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<T::Session> {
    let mut ingester = StreamIngester::new(Arc::clone(&shared.store), Arc::clone(&shared.metrics));
    let mut attempt: u32 = 0;

    loop {
        let session_id = SessionId::new();
        *shared
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session_id);

        let (error, session, reached_active) = match shared
            .run_session(session_id, &mut ingester, shutdown)
            .await
        {
            SessionEnd::Shutdown(session) => return session,
            SessionEnd::Failed {
                error,
                session,
                reached_active,
            } => (error, session, reached_active),
        };

        if reached_active {
            attempt = 0;
            warn!(session_id = %session_id, error = %error, "Connection lost");
        } else {
            shared.metrics.record_connect_failure();
            warn!(session_id = %session_id, error = %error, attempt, "Connection attempt failed");
        }

        shared.transition(ConnectionState::Reconnecting, session_id);
        if let Some(session) = session {
            // Already logged by release; the next attempt opens a fresh session.
            let _ = shared.release(session, session_id).await;
        }

        attempt = attempt.saturating_add(1);
        let delay = shared.transport.reconnect_delay(attempt);
        info!(
            session_id = %session_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting after backoff"
        );

        let resumed = tokio::select! {
            biased;
            _ = stopped(shutdown) => false,
            _ = tokio::time::sleep(delay) => true,
        };
        if !resumed {
            return None;
        }
        shared.metrics.record_reconnect();
    }
}

/// Resolves once shutdown is requested or the manager holding the sender is dropped.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Owns the subscription lifecycle and the single processing loop.
pub struct ConnectionManager<T: Transport> {
    shared: Arc<Shared<T>>,
    lifecycle: Mutex<Lifecycle<T::Session>>,
    /// Only sender; dropping the manager closes it and stops the session task.
    shutdown: watch::Sender<bool>,
    /// Serializes `deactivate` so concurrent callers return after teardown.
    teardown: tokio::sync::Mutex<()>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Manager with a fresh, empty store.
    pub fn new(transport: T, config: SyncConfig) -> Self {
        Self::with_store(
            transport,
            config,
            Arc::new(TrajectoryStore::new()),
            Arc::new(SyncMetrics::new()),
        )
    }

    pub fn with_store(
        transport: T,
        config: SyncConfig,
        store: Arc<TrajectoryStore>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                store,
                metrics,
                state,
                session_id: Mutex::new(None),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle),
            shutdown,
            teardown: tokio::sync::Mutex::new(()),
        }
    }

    /// Start the session task. Must be called within a Tokio runtime.
    pub fn activate(&self) -> Result<(), LifecycleError> {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Err(LifecycleError::AlreadyActivated),
            Lifecycle::Deactivated => return Err(LifecycleError::Deactivated),
        }

        info!(
            endpoint = %self.shared.config.endpoint,
            topic = %self.shared.config.topic,
            "Activating connection manager"
        );
        let task = tokio::spawn(run(Arc::clone(&self.shared), self.shutdown.subscribe()));
        *lifecycle = Lifecycle::Running(task);
        Ok(())
    }

    /// Stop the session task and release its session.
    ///
    /// Idempotent. Once this returns no further merges happen and the state
    /// is `Deactivated`, even when the release itself failed.
    pub async fn deactivate(&self) -> Result<(), TeardownError> {
        let _teardown = self.teardown.lock().await;

        let previous = mem::replace(
            &mut *self
                .lifecycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            Lifecycle::Deactivated,
        );

        let result = match previous {
            Lifecycle::Deactivated => return Ok(()),
            Lifecycle::Idle => Ok(()),
            Lifecycle::Running(task) => {
                self.shutdown.send_replace(true);
                let session = match task.await {
                    Ok(session) => session,
                    Err(e) => {
                        error!(error = %e, "Session task did not finish cleanly");
                        None
                    }
                };
                match session {
                    Some(session) => {
                        let session_id = self.session_id().unwrap_or_default();
                        self.shared.release(session, session_id).await
                    }
                    None => Ok(()),
                }
            }
        };

        self.shared.state.send_replace(ConnectionState::Deactivated);
        info!(
            session_id = ?self.session_id().map(|id| id.to_string()),
            released_cleanly = result.is_ok(),
            "Connection manager deactivated"
        );
        result
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver observing every state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Id of the current (or last) session.
    pub fn session_id(&self) -> Option<SessionId> {
        *self
            .shared
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscriber(&self) -> StateSubscriber {
        StateSubscriber::new(Arc::clone(&self.shared.store))
    }

    pub fn store(&self) -> &Arc<TrajectoryStore> {
        &self.shared.store
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.shared.metrics
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }
}
