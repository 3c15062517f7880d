//! Fleet Sync Service
//!
//! Subscribes to a publish/subscribe topic of vehicle position updates and
//! maintains, per vehicle, the current position and the ordered history of
//! every position received:
//! - Decoding of raw JSON payloads with explicit rejection
//! - Total entity resolution with an `Unknown-Truck` fallback
//! - Copy-on-write trajectory store with O(1) snapshots
//! - Connection lifecycle with reconnect and exactly-once teardown
//! - Read-only subscriber interface with change notification
//! - Deterministic replay of captured payloads
//!
//! # Architecture
//!
//! ```text
//!   Broker (STOMP over WebSocket)
//!        │
//!  ┌─────▼─────┐
//!  │ Transport │  ← connect / subscribe / disconnect
//!  └─────┬─────┘
//!        │ bounded mpsc
//!  ┌─────▼──────┐
//!  │ Connection │  ← lifecycle, reconnect, single consumer
//!  └─────┬──────┘
//!        │
//!  ┌─────▼──┐   ┌──────────┐   ┌───────┐
//!  │ Decode ├──►│ Resolve  ├──►│ Store │
//!  └────────┘   └──────────┘   └───┬───┘
//!                                  │ snapshot + watch
//!                          ┌───────▼──────┐
//!                          │  Subscriber  │
//!                          └──────────────┘
//! ```

pub mod config;
pub mod connection;
pub mod decoder;
pub mod events;
pub mod ingestion;
pub mod metrics;
pub mod replay;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod subscriber;
pub mod transport;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
