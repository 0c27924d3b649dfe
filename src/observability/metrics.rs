use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the background context's submission and routing paths.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    channel_submissions: AtomicU64,
    stateless_submissions: AtomicU64,
    fallbacks: AtomicU64,
    stateless_failures: AtomicU64,
    routed_scores: AtomicU64,
    broadcasts: AtomicU64,
    malformed_replies: AtomicU64,
    reconnects_scheduled: AtomicU64,
    expired_correlations: AtomicU64,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_channel_submission(&self) {
        self.channel_submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stateless_submission(&self) {
        self.stateless_submissions.fetch_add(1, Ordering::Relaxed);
    }

    /// A channel write failed and the frame went stateless instead.
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stateless_failure(&self) {
        self.stateless_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_routed(&self) {
        self.routed_scores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.expired_correlations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn channel_submissions(&self) -> u64 {
        self.channel_submissions.load(Ordering::Relaxed)
    }

    pub fn stateless_submissions(&self) -> u64 {
        self.stateless_submissions.load(Ordering::Relaxed)
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn stateless_failures(&self) -> u64 {
        self.stateless_failures.load(Ordering::Relaxed)
    }

    pub fn routed_scores(&self) -> u64 {
        self.routed_scores.load(Ordering::Relaxed)
    }

    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    pub fn malformed_replies(&self) -> u64 {
        self.malformed_replies.load(Ordering::Relaxed)
    }

    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled.load(Ordering::Relaxed)
    }

    pub fn expired_correlations(&self) -> u64 {
        self.expired_correlations.load(Ordering::Relaxed)
    }
}

/// Counters for one page context.
pub struct PageMetrics {
    page_id: String,
    frames_sampled: AtomicU64,
    captures_skipped: AtomicU64,
    scores_received: AtomicU64,
    danger_updates: AtomicU64,
}

impl PageMetrics {
    pub fn new(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            frames_sampled: AtomicU64::new(0),
            captures_skipped: AtomicU64::new(0),
            scores_received: AtomicU64::new(0),
            danger_updates: AtomicU64::new(0),
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn record_frame_sampled(&self) {
        self.frames_sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_skipped(&self) {
        self.captures_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_score(&self) {
        self.scores_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_danger(&self) {
        self.danger_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled.load(Ordering::Relaxed)
    }

    pub fn captures_skipped(&self) -> u64 {
        self.captures_skipped.load(Ordering::Relaxed)
    }

    pub fn scores_received(&self) -> u64 {
        self.scores_received.load(Ordering::Relaxed)
    }

    pub fn danger_updates(&self) -> u64 {
        self.danger_updates.load(Ordering::Relaxed)
    }
}
