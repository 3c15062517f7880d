//! Publish/subscribe transport abstraction
//!
//! The connection manager only talks to the broker through [`Transport`]. A
//! transport owns the wire protocol and its own reconnect backoff; the
//! manager owns the session lifecycle and the processing queue.
//!
//! - [`StompTransport`]: STOMP 1.2 over WebSocket, as spoken by the fleet
//!   broker
//! - [`frame`]: STOMP frame codec

pub mod frame;
pub mod stomp;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use fleet_types::errors::{ConnectionError, TeardownError};
use tokio::sync::mpsc;

use crate::config::BackoffConfig;
use crate::events::InboundEvent;

pub use stomp::{StompSession, StompTransport};

/// Identifier of one topic subscription within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A publish/subscribe client.
///
/// `connect` and `disconnect` are called at most once per session; the
/// session value is moved into `disconnect` so it cannot be released twice.
/// After `subscribe` succeeds every message on the topic is pushed into
/// `sink` in arrival order, followed by at most one
/// [`InboundEvent::ConnectionLost`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opaque handle for one connected session.
    type Session: Send + Sync + 'static;

    async fn connect(&self, endpoint: &str) -> Result<Self::Session, ConnectionError>;

    async fn subscribe(
        &self,
        session: &Self::Session,
        topic: &str,
        sink: mpsc::Sender<InboundEvent>,
    ) -> Result<SubscriptionId, ConnectionError>;

    async fn disconnect(&self, session: Self::Session) -> Result<(), TeardownError>;

    /// Delay before reconnect attempt `attempt` (1-based).
    fn reconnect_delay(&self, attempt: u32) -> Duration {
        BackoffConfig::default().delay_for(attempt)
    }
}
