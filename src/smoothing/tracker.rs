use std::collections::HashMap;

use crate::core::StreamId;

use super::{AlertUpdate, SmoothingEngine};

/// Smoothing state for every stream a page context tracks.
///
/// A stream's engine is created by its first score and destroyed by [`StreamTracker::forget`].
/// Scores that could not be attributed to a stream feed a separate engine and
/// never touch a real stream's window.
#[derive(Debug, Default)]
pub struct StreamTracker {
    streams: HashMap<StreamId, SmoothingEngine>,
    unattributed: SmoothingEngine,
}

impl StreamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, stream: &StreamId, score: f64) -> AlertUpdate {
        self.streams
            .entry(stream.clone())
            .or_default()
            .observe(score)
    }

    pub fn observe_unattributed(&mut self, score: f64) -> AlertUpdate {
        self.unattributed.observe(score)
    }

    pub fn unattributed(&self) -> &SmoothingEngine {
        &self.unattributed
    }

    pub fn forget(&mut self, stream: &StreamId) -> bool {
        self.streams.remove(stream).is_some()
    }

    pub fn get(&self, stream: &StreamId) -> Option<&SmoothingEngine> {
        self.streams.get(stream)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
