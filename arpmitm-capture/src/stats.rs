//! Capture statistics and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics for one capture run
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// Frames delivered to the callback
    pub frames_received: u64,
    /// Frames the kernel dropped (as reported by the source)
    pub frames_dropped: u64,
    pub bytes_received: u64,
    pub arp_frames: u64,
    pub http_requests: u64,
    pub http_responses: u64,
    pub duration: Duration,
    pub frames_per_second: f64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop rate as a percentage of everything the kernel saw
    pub fn drop_rate(&self) -> f64 {
        let total = self.total_frames();
        if total == 0 {
            return 0.0;
        }
        (self.frames_dropped as f64 / total as f64) * 100.0
    }

    /// Received + dropped
    pub fn total_frames(&self) -> u64 {
        self.frames_received + self.frames_dropped
    }

    /// Format statistics as human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {} frames ({} bytes)\n\
             Dropped: {} frames ({:.2}%)\n\
             ARP: {}, HTTP requests: {}, HTTP responses: {}\n\
             Duration: {:.2}s ({:.2} fps)",
            self.frames_received,
            self.bytes_received,
            self.frames_dropped,
            self.drop_rate(),
            self.arp_frames,
            self.http_requests,
            self.http_responses,
            self.duration.as_secs_f64(),
            self.frames_per_second,
        )
    }
}

/// Thread-safe statistics accumulator for live capture
///
/// Clones share the same counters, so the capture thread and the frame
/// handler can both record into it.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    frames_received: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    arp_frames: Arc<AtomicU64>,
    http_requests: Arc<AtomicU64>,
    http_responses: Arc<AtomicU64>,
    start_time: Instant,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            frames_received: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            arp_frames: Arc::new(AtomicU64::new(0)),
            http_requests: Arc::new(AtomicU64::new(0)),
            http_responses: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a received frame
    pub fn record_frame(&self, size: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Overwrite the kernel drop count (sources report a running total)
    pub fn set_drops(&self, count: u64) {
        self.frames_dropped.store(count, Ordering::Relaxed);
    }

    pub fn record_arp(&self) {
        self.arp_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_response(&self) {
        self.http_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> CaptureStats {
        let frames_received = self.frames_received.load(Ordering::Relaxed);
        let duration = self.start_time.elapsed();
        let secs = duration.as_secs_f64();

        CaptureStats {
            frames_received,
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            arp_frames: self.arp_frames.load(Ordering::Relaxed),
            http_requests: self.http_requests.load(Ordering::Relaxed),
            http_responses: self.http_responses.load(Ordering::Relaxed),
            duration,
            frames_per_second: if secs > 0.0 {
                frames_received as f64 / secs
            } else {
                0.0
            },
        }
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
