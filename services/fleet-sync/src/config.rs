//! Configuration for the Fleet Sync service
//!
//! The core only ever receives these structs; reading them from the process
//! environment is done by the host binary through [`HostConfig::from_env`].

use std::net::SocketAddr;
use std::time::Duration;

/// Default broker endpoint of a local deployment.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Default topic fleet updates are published on.
pub const DEFAULT_TOPIC: &str = "/topic/updates";

/// Configuration for one connection lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Broker endpoint passed to `Transport::connect`.
    pub endpoint: String,
    /// The single topic subscribed to.
    pub topic: String,
    /// Capacity of the inbound message queue.
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            queue_capacity: 1024,
        }
    }
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl BackoffConfig {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_nanos() as f64);
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_nanos(capped.round() as u64)
        } else {
            self.max_delay
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Configuration for the STOMP-over-WebSocket transport.
#[derive(Debug, Clone, PartialEq)]
pub struct StompConfig {
    /// Value of the `host` header in the CONNECT frame.
    pub host: String,
    /// How long to wait for CONNECTED after sending CONNECT.
    pub handshake_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl Default for StompConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            handshake_timeout: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Settings of the host binary, read from the environment.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub sync: SyncConfig,
    pub stomp: StompConfig,
    /// Bind address of the HTTP read surface.
    pub http_addr: SocketAddr,
}

/// Errors while reading the host configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl HostConfig {
    /// Read `FLEET_SYNC_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sync = SyncConfig::default();
        if let Some(endpoint) = lookup("FLEET_SYNC_ENDPOINT") {
            sync.endpoint = endpoint;
        }
        if let Some(topic) = lookup("FLEET_SYNC_TOPIC") {
            sync.topic = topic;
        }
        if let Some(raw) = lookup("FLEET_SYNC_QUEUE_CAPACITY") {
            sync.queue_capacity = match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "FLEET_SYNC_QUEUE_CAPACITY",
                        value: raw,
                    })
                }
            };
        }

        let mut stomp = StompConfig::default();
        if let Some(host) = lookup("FLEET_SYNC_STOMP_HOST") {
            stomp.host = host;
        }

        let http_addr = match lookup("FLEET_SYNC_HTTP_ADDR") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "FLEET_SYNC_HTTP_ADDR",
                value: raw,
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8090)),
        };

        Ok(Self {
            sync,
            stomp,
            http_addr,
        })
    }
}
