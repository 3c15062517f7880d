use std::sync::Arc;

use fleet_sync::connection::ConnectionState;
use fleet_sync::metrics::SyncMetrics;
use fleet_sync::subscriber::StateSubscriber;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub subscriber: StateSubscriber,
    pub connection: watch::Receiver<ConnectionState>,
    pub metrics: Arc<SyncMetrics>,
}

impl AppState {
    pub fn new(
        subscriber: StateSubscriber,
        connection: watch::Receiver<ConnectionState>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            subscriber,
            connection,
            metrics,
        }
    }
}
