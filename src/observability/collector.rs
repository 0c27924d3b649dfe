use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::{ConnectionMetrics, PageMetrics};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub page_id: String,
    pub frames_sampled: u64,
    pub captures_skipped: u64,
    pub scores_received: u64,
    pub danger_updates: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub channel_submissions: u64,
    pub stateless_submissions: u64,
    pub fallbacks: u64,
    pub stateless_failures: u64,
    pub routed_scores: u64,
    pub broadcasts: u64,
    pub malformed_replies: u64,
    pub reconnects_scheduled: u64,
    pub expired_correlations: u64,
}

/// Shared view over the background counters and every page's counters.
#[derive(Clone)]
pub struct MetricsCollector {
    connection: Arc<ConnectionMetrics>,
    pages: Arc<RwLock<BTreeMap<String, Arc<PageMetrics>>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            connection: Arc::new(ConnectionMetrics::new()),
            pages: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn connection(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.connection)
    }

    /// Create (or return the existing) counters for a page.
    pub fn register_page(&self, page_id: impl Into<String>) -> Arc<PageMetrics> {
        let page_id = page_id.into();
        let mut pages = self
            .pages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            pages
                .entry(page_id.clone())
                .or_insert_with(|| Arc::new(PageMetrics::new(page_id))),
        )
    }

    pub fn get_page_metrics(&self, page_id: &str) -> Option<Arc<PageMetrics>> {
        self.pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(page_id)
            .cloned()
    }

    pub fn connection_snapshot(&self) -> ConnectionSnapshot {
        let metrics = &self.connection;
        ConnectionSnapshot {
            channel_submissions: metrics.channel_submissions(),
            stateless_submissions: metrics.stateless_submissions(),
            fallbacks: metrics.fallbacks(),
            stateless_failures: metrics.stateless_failures(),
            routed_scores: metrics.routed_scores(),
            broadcasts: metrics.broadcasts(),
            malformed_replies: metrics.malformed_replies(),
            reconnects_scheduled: metrics.reconnects_scheduled(),
            expired_correlations: metrics.expired_correlations(),
        }
    }

    pub fn page_snapshots(&self) -> Vec<PageSnapshot> {
        self.pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .map(|metrics| PageSnapshot {
                page_id: metrics.page_id().to_string(),
                frames_sampled: metrics.frames_sampled(),
                captures_skipped: metrics.captures_skipped(),
                scores_received: metrics.scores_received(),
                danger_updates: metrics.danger_updates(),
            })
            .collect()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
