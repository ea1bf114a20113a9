use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide counters updated by exactly one writer each, read without
/// locking by the (external, out of scope here) status/stats endpoints.
#[derive(Debug)]
pub struct ExportedCounters {
    listeners_current: AtomicU64,
    listeners_peak: AtomicU64,
    bytes_in_total: AtomicU64,
    bytes_out_total: AtomicU64,
    source_connected: AtomicBool,
    started_at: Instant,
}

impl ExportedCounters {
    /// Creates a fresh set of counters, uptime measured from this call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners_current: AtomicU64::new(0),
            listeners_peak: AtomicU64::new(0),
            bytes_in_total: AtomicU64::new(0),
            bytes_out_total: AtomicU64::new(0),
            source_connected: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Records a newly registered listener, bumping the peak if needed.
    pub fn listener_connected(&self) {
        let current = self.listeners_current.fetch_add(1, Ordering::Relaxed) + 1;
        self.listeners_peak.fetch_max(current, Ordering::Relaxed);
    }

    /// Records a listener leaving (clean close, write error, or eviction).
    pub fn listener_disconnected(&self) {
        self.listeners_current.fetch_sub(1, Ordering::Relaxed);
    }

    /// Adds to the total bytes received from the active producer.
    pub fn add_bytes_in(&self, n: u64) {
        self.bytes_in_total.fetch_add(n, Ordering::Relaxed);
    }

    /// Adds to the total bytes written out across all listeners.
    pub fn add_bytes_out(&self, n: u64) {
        self.bytes_out_total.fetch_add(n, Ordering::Relaxed);
    }

    /// Sets whether a live source is currently connected.
    pub fn set_source_connected(&self, connected: bool) {
        self.source_connected.store(connected, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot for read-only external views.
    #[must_use]
    pub fn snapshot(&self, ring_fill_percent: f64) -> CountersSnapshot {
        CountersSnapshot {
            listeners_current: self.listeners_current.load(Ordering::Relaxed),
            listeners_peak: self.listeners_peak.load(Ordering::Relaxed),
            bytes_in_total: self.bytes_in_total.load(Ordering::Relaxed),
            bytes_out_total: self.bytes_out_total.load(Ordering::Relaxed),
            ring_fill_percent,
            source_connected: self.source_connected.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for ExportedCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A plain-data snapshot of [`ExportedCounters`], suitable for handing to a
/// status/stats endpoint to serialize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountersSnapshot {
    pub listeners_current: u64,
    pub listeners_peak: u64,
    pub bytes_in_total: u64,
    pub bytes_out_total: u64,
    pub ring_fill_percent: f64,
    pub source_connected: bool,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_is_monotonic_non_decreasing() {
        let c = ExportedCounters::new();
        c.listener_connected();
        c.listener_connected();
        c.listener_connected();
        c.listener_disconnected();
        c.listener_disconnected();

        let snap = c.snapshot(0.0);
        assert_eq!(snap.listeners_current, 1);
        assert_eq!(snap.listeners_peak, 3);
    }

    #[test]
    fn source_connected_flag_round_trips() {
        let c = ExportedCounters::new();
        assert!(!c.snapshot(0.0).source_connected);
        c.set_source_connected(true);
        assert!(c.snapshot(0.0).source_connected);
    }
}
