//! Observability counters for the Fleet Sync service
//!
//! Tracks message throughput, decode rejections, connection churn and merge
//! latency. Everything is lock-free except the latency window.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use fleet_types::errors::DecodeError;

/// Core metrics for the Fleet Sync service.
pub struct SyncMetrics {
    // Message processing
    pub messages_received: AtomicU64,
    pub updates_merged: AtomicU64,
    pub decode_malformed: AtomicU64,
    pub decode_missing_coordinates: AtomicU64,
    pub merge_latency_ns: Mutex<LatencyTracker>,

    // Connection lifecycle
    pub connect_attempts: AtomicU64,
    pub connect_failures: AtomicU64,
    pub reconnects: AtomicU64,
    pub sessions_released: AtomicU64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            updates_merged: AtomicU64::new(0),
            decode_malformed: AtomicU64::new(0),
            decode_missing_coordinates: AtomicU64::new(0),
            merge_latency_ns: Mutex::new(LatencyTracker::new(1000)),
            connect_attempts: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            sessions_released: AtomicU64::new(0),
        }
    }

    /// Record a raw message taken off the queue.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful merge and how long decode→merge took.
    pub fn record_merge(&self, latency_ns: u64) {
        self.updates_merged.fetch_add(1, Ordering::Relaxed);
        self.merge_latency_ns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(latency_ns);
    }

    /// Record a message dropped by the decoder.
    pub fn record_decode_error(&self, error: &DecodeError) {
        let counter = match error {
            DecodeError::Malformed { .. } => &self.decode_malformed,
            DecodeError::MissingCoordinates { .. } => &self.decode_missing_coordinates,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_released(&self) {
        self.sessions_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Total messages dropped by the decoder.
    pub fn messages_dropped(&self) -> u64 {
        self.decode_malformed.load(Ordering::Relaxed)
            + self.decode_missing_coordinates.load(Ordering::Relaxed)
    }

    /// Export metrics as a BTreeMap for the health endpoint.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("messages_received".to_string(), self.messages_received.load(Ordering::Relaxed));
        m.insert("updates_merged".to_string(), self.updates_merged.load(Ordering::Relaxed));
        m.insert("decode_malformed".to_string(), self.decode_malformed.load(Ordering::Relaxed));
        m.insert(
            "decode_missing_coordinates".to_string(),
            self.decode_missing_coordinates.load(Ordering::Relaxed),
        );
        m.insert("connect_attempts".to_string(), self.connect_attempts.load(Ordering::Relaxed));
        m.insert("connect_failures".to_string(), self.connect_failures.load(Ordering::Relaxed));
        m.insert("reconnects".to_string(), self.reconnects.load(Ordering::Relaxed));
        m.insert("sessions_released".to_string(), self.sessions_released.load(Ordering::Relaxed));
        let tracker = self
            .merge_latency_ns
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(p99) = tracker.percentile(99) {
            m.insert("merge_latency_p99_ns".to_string(), p99);
        }
        if let Some(avg) = tracker.average() {
            m.insert("merge_latency_avg_ns".to_string(), avg);
        }
        m
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding window of the most recent latency samples.
pub struct LatencyTracker {
    window: VecDeque<u64>,
    capacity: usize,
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Add a sample, evicting the oldest once the window is full.
    pub fn record(&mut self, value: u64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// Nearest-rank percentile over the window, `p` in 0..=100.
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.window.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.window.iter().copied().collect();
        sorted.sort_unstable();

        let rank = (p.min(100) * (sorted.len() - 1) + 50) / 100;
        Some(sorted[rank])
    }

    pub fn average(&self) -> Option<u64> {
        let count = self.window.len() as u64;
        if count == 0 {
            return None;
        }
        Some(self.window.iter().sum::<u64>() / count)
    }

    pub fn count(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = SyncMetrics::new();

        metrics.record_message_received();
        metrics.record_message_received();
        metrics.record_merge(500);
        metrics.record_decode_error(&DecodeError::Malformed {
            reason: "eof".to_string(),
        });

        let exported = metrics.export();
        assert_eq!(exported["messages_received"], 2);
        assert_eq!(exported["updates_merged"], 1);
        assert_eq!(exported["decode_malformed"], 1);
        assert_eq!(exported["decode_missing_coordinates"], 0);
        assert_eq!(metrics.messages_dropped(), 1);
    }

    #[test]
    fn test_decode_errors_split_by_kind() {
        let metrics = SyncMetrics::new();
        metrics.record_decode_error(&DecodeError::MissingCoordinates { field: "latitude" });
        metrics.record_decode_error(&DecodeError::MissingCoordinates { field: "longitude" });

        let exported = metrics.export();
        assert_eq!(exported["decode_missing_coordinates"], 2);
        assert_eq!(exported["decode_malformed"], 0);
    }

    #[test]
    fn test_connection_counters() {
        let metrics = SyncMetrics::new();
        metrics.record_connect_attempt();
        metrics.record_connect_failure();
        metrics.record_connect_attempt();
        metrics.record_reconnect();
        metrics.record_session_released();

        let exported = metrics.export();
        assert_eq!(exported["connect_attempts"], 2);
        assert_eq!(exported["connect_failures"], 1);
        assert_eq!(exported["reconnects"], 1);
        assert_eq!(exported["sessions_released"], 1);
    }

    #[test]
    fn test_latency_only_exported_when_sampled() {
        let metrics = SyncMetrics::new();
        assert!(!metrics.export().contains_key("merge_latency_p99_ns"));

        metrics.record_merge(100);
        metrics.record_merge(300);
        let exported = metrics.export();
        assert_eq!(exported["merge_latency_avg_ns"], 200);
        assert!(exported.contains_key("merge_latency_p99_ns"));
    }

    #[test]
    fn test_latency_survives_poisoned_lock() {
        let metrics = std::sync::Arc::new(SyncMetrics::new());
        metrics.record_merge(100);

        let holder = std::sync::Arc::clone(&metrics);
        let panicked = std::thread::spawn(move || {
            let _tracker = holder.merge_latency_ns.lock().unwrap();
            panic!("merge thread died holding the latency window");
        })
        .join();
        assert!(panicked.is_err());
        assert!(metrics.merge_latency_ns.is_poisoned());

        metrics.record_merge(300);
        let exported = metrics.export();
        assert_eq!(exported["updates_merged"], 2);
        assert_eq!(exported["merge_latency_avg_ns"], 200);
    }

    #[test]
    fn test_latency_tracker_percentile() {
        let mut tracker = LatencyTracker::new(100);

        for i in 1..=100 {
            tracker.record(i);
        }

        let p50 = tracker.percentile(50).unwrap();
        assert!(p50 >= 49 && p50 <= 51);

        let p99 = tracker.percentile(99).unwrap();
        assert!(p99 >= 98 && p99 <= 100);
    }

    #[test]
    fn test_latency_tracker_window_eviction() {
        let mut tracker = LatencyTracker::new(3);

        tracker.record(10);
        tracker.record(20);
        tracker.record(30);
        tracker.record(40);

        assert_eq!(tracker.count(), 3);
        assert_eq!(tracker.average().unwrap(), 30);
        assert_eq!(tracker.percentile(0), Some(20));
    }
}
