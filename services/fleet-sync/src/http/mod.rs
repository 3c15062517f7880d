//! HTTP read surface of the host binary

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
