use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe metrics collector for a managed book feed.
#[derive(Debug)]
pub struct BookMetrics {
    // Counters
    messages_received: AtomicU64,
    snapshots_applied: AtomicU64,
    updates_applied: AtomicU64,
    heartbeats_received: AtomicU64,
    checksums_verified: AtomicU64,
    checksum_mismatches: AtomicU64,
    parse_errors: AtomicU64,
    rejected_packets: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_book_change_time: Option<Instant>,
    last_error_time: Option<Instant>,
    last_mismatch_time: Option<Instant>,
    /// Set by a checksum mismatch, cleared by the next snapshot.
    resync_pending: bool,
}

impl Default for BookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BookMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            updates_applied: AtomicU64::new(0),
            heartbeats_received: AtomicU64::new(0),
            checksums_verified: AtomicU64::new(0),
            checksum_mismatches: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            rejected_packets: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_book_change_time: None,
                last_error_time: None,
                last_mismatch_time: None,
                resync_pending: false,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snapshots_applied(&self) {
        self.snapshots_applied.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write();
        inner.last_book_change_time = Some(Instant::now());
        inner.resync_pending = false;
    }

    pub fn inc_updates_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_book_change_time = Some(Instant::now());
    }

    pub fn inc_heartbeats_received(&self) {
        self.heartbeats_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_checksums_verified(&self) {
        self.checksums_verified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_checksum_mismatches(&self) {
        self.checksum_mismatches.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write();
        inner.last_mismatch_time = Some(Instant::now());
        inner.resync_pending = true;
    }

    pub fn inc_parse_errors(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_rejected_packets(&self) {
        self.rejected_packets.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied.load(Ordering::Relaxed)
    }

    pub fn updates_applied(&self) -> u64 {
        self.updates_applied.load(Ordering::Relaxed)
    }

    pub fn heartbeats_received(&self) -> u64 {
        self.heartbeats_received.load(Ordering::Relaxed)
    }

    pub fn checksums_verified(&self) -> u64 {
        self.checksums_verified.load(Ordering::Relaxed)
    }

    pub fn checksum_mismatches(&self) -> u64 {
        self.checksum_mismatches.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn rejected_packets(&self) -> u64 {
        self.rejected_packets.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_book_change(&self) -> Option<f64> {
        self.inner
            .read()
            .last_book_change_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_mismatch(&self) -> Option<f64> {
        self.inner
            .read()
            .last_mismatch_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Returns true between a checksum mismatch and the next snapshot.
    pub fn resync_pending(&self) -> bool {
        self.inner.read().resync_pending
    }

    /// Calculate applied updates per second since start.
    pub fn updates_per_second(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime > 0.0 {
            self.updates_applied() as f64 / uptime
        } else {
            0.0
        }
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received(),
            snapshots_applied: self.snapshots_applied(),
            updates_applied: self.updates_applied(),
            heartbeats_received: self.heartbeats_received(),
            checksums_verified: self.checksums_verified(),
            checksum_mismatches: self.checksum_mismatches(),
            parse_errors: self.parse_errors(),
            rejected_packets: self.rejected_packets(),
            uptime_secs: self.uptime_secs(),
            updates_per_second: self.updates_per_second(),
            secs_since_last_book_change: self.secs_since_last_book_change(),
            secs_since_last_error: self.secs_since_last_error(),
            secs_since_last_mismatch: self.secs_since_last_mismatch(),
            resync_pending: self.resync_pending(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub snapshots_applied: u64,
    pub updates_applied: u64,
    pub heartbeats_received: u64,
    pub checksums_verified: u64,
    pub checksum_mismatches: u64,
    pub parse_errors: u64,
    pub rejected_packets: u64,
    pub uptime_secs: f64,
    pub updates_per_second: f64,
    pub secs_since_last_book_change: Option<f64>,
    pub secs_since_last_error: Option<f64>,
    pub secs_since_last_mismatch: Option<f64>,
    pub resync_pending: bool,
}

/// Health status of the book feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Book is in sync and receiving data.
    Healthy,
    /// Book is stale or waiting for a snapshot after a checksum mismatch.
    Degraded,
    /// No book data for an extended period.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Threshold in seconds for considering data stale (degraded).
    const STALE_THRESHOLD_SECS: f64 = 30.0;
    /// Threshold in seconds for considering the feed unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 60.0;

    /// Determine the health status based on metrics.
    pub fn health_status(&self) -> HealthStatus {
        let secs_since_change = match self.secs_since_last_book_change {
            Some(secs) => secs,
            None => {
                // No book data yet - if uptime is short, we're still starting up
                if self.uptime_secs < Self::STALE_THRESHOLD_SECS {
                    return HealthStatus::Healthy;
                } else if self.uptime_secs < Self::UNHEALTHY_THRESHOLD_SECS {
                    return HealthStatus::Degraded;
                } else {
                    return HealthStatus::Unhealthy;
                }
            }
        };

        if secs_since_change > Self::UNHEALTHY_THRESHOLD_SECS {
            return HealthStatus::Unhealthy;
        }

        // Deltas applied after a mismatch do not resynchronize the book.
        if self.resync_pending || secs_since_change > Self::STALE_THRESHOLD_SECS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Book Feed Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Messages received:   {}", self.messages_received)?;
        writeln!(f, "Snapshots applied:   {}", self.snapshots_applied)?;
        writeln!(f, "Updates applied:     {}", self.updates_applied)?;
        writeln!(f, "Updates/sec:         {:.2}", self.updates_per_second)?;
        writeln!(f, "Heartbeats:          {}", self.heartbeats_received)?;
        writeln!(f, "Checksums verified:  {}", self.checksums_verified)?;
        writeln!(f, "Checksum mismatches: {}", self.checksum_mismatches)?;
        writeln!(f, "Parse errors:        {}", self.parse_errors)?;
        writeln!(f, "Rejected packets:    {}", self.rejected_packets)?;
        if let Some(secs) = self.secs_since_last_book_change {
            writeln!(f, "Since last change:   {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        if self.resync_pending {
            writeln!(f, "Resync pending:      yes")?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<BookMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(BookMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = BookMetrics::new();

        metrics.inc_updates_applied();
        metrics.inc_updates_applied();
        metrics.inc_messages_received();
        metrics.inc_parse_errors();
        metrics.inc_checksum_mismatches();

        assert_eq!(metrics.updates_applied(), 2);
        assert_eq!(metrics.messages_received(), 1);
        assert_eq!(metrics.parse_errors(), 1);
        assert_eq!(metrics.checksum_mismatches(), 1);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = BookMetrics::new();

        metrics.inc_snapshots_applied();
        metrics.inc_rejected_packets();
        metrics.inc_heartbeats_received();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.snapshots_applied, 1);
        assert_eq!(snapshot.rejected_packets, 1);
        assert_eq!(snapshot.heartbeats_received, 1);
        assert!(snapshot.uptime_secs >= 0.0);
        assert!(snapshot.secs_since_last_error.is_some());
    }

    #[test]
    fn test_last_book_change_time() {
        let metrics = BookMetrics::new();

        assert!(metrics.secs_since_last_book_change().is_none());

        metrics.inc_snapshots_applied();

        let secs = metrics.secs_since_last_book_change();
        assert!(secs.is_some());
        assert!(secs.unwrap() < 1.0);
    }

    // HealthStatus boundary tests

    #[test]
    fn test_health_status_healthy_with_recent_change() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 120.0,
            secs_since_last_book_change: Some(5.0),
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_healthy_during_startup() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 10.0,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_degraded_no_data_medium_uptime() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 45.0,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_health_status_degraded_stale_data() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 120.0,
            secs_since_last_book_change: Some(45.0),
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_health_status_degraded_unresolved_mismatch() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 120.0,
            secs_since_last_book_change: Some(5.0),
            secs_since_last_mismatch: Some(2.0),
            resync_pending: true,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_health_status_healthy_after_resync() {
        // Book changed (snapshot) after the mismatch
        let snapshot = MetricsSnapshot {
            uptime_secs: 120.0,
            secs_since_last_book_change: Some(1.0),
            secs_since_last_mismatch: Some(3.0),
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_update_after_mismatch_stays_degraded() {
        let metrics = BookMetrics::new();
        metrics.inc_snapshots_applied();
        metrics.inc_checksum_mismatches();
        metrics.inc_updates_applied();

        assert!(metrics.resync_pending());
        assert_eq!(metrics.snapshot().health_status(), HealthStatus::Degraded);

        metrics.inc_snapshots_applied();
        assert!(!metrics.resync_pending());
        assert_eq!(metrics.snapshot().health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_unhealthy_very_stale_data() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 300.0,
            secs_since_last_book_change: Some(90.0),
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_status_unhealthy_no_data_long_uptime() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 120.0,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_status_boundary_at_60_seconds() {
        let snapshot = MetricsSnapshot {
            uptime_secs: 120.0,
            secs_since_last_book_change: Some(60.0),
            ..Default::default()
        };

        // At exactly 60s, it's not > 60, so degraded
        assert_eq!(snapshot.health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_display_lists_counters() {
        let metrics = BookMetrics::new();
        metrics.inc_checksums_verified();
        let text = metrics.snapshot().to_string();
        assert!(text.contains("Checksums verified:  1"));
    }
}
