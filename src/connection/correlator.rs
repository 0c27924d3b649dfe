use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::{Destination, SubmissionId};

struct Pending {
    destination: Destination,
    created_at: Instant,
}

/// Pending long-lived channel submissions, keyed by submission id.
///
/// Entries older than the time-to-live are treated as absent and evicted by
/// [`Correlator::sweep`], so a reply that never arrives cannot pin its entry.
pub struct Correlator {
    pending: HashMap<SubmissionId, Pending>,
    ttl: Duration,
}

impl Correlator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            ttl,
        }
    }

    /// The caller guarantees `id` is not already outstanding.
    pub fn register(&mut self, id: SubmissionId, destination: Destination) {
        self.register_at(id, destination, Instant::now());
    }

    pub fn register_at(&mut self, id: SubmissionId, destination: Destination, now: Instant) {
        self.pending.insert(
            id,
            Pending {
                destination,
                created_at: now,
            },
        );
    }

    /// Remove and return the destination, or `None` if unknown or expired.
    pub fn resolve(&mut self, id: &SubmissionId) -> Option<Destination> {
        self.resolve_at(id, Instant::now())
    }

    pub fn resolve_at(&mut self, id: &SubmissionId, now: Instant) -> Option<Destination> {
        let entry = self.pending.remove(id)?;
        if now.saturating_duration_since(entry.created_at) > self.ttl {
            return None;
        }
        Some(entry.destination)
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        let ttl = self.ttl;
        self.pending
            .retain(|_, entry| now.saturating_duration_since(entry.created_at) <= ttl);
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
