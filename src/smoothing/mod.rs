//! Temporal smoothing of per-frame scores into a debounced alert level.

pub mod engine;
pub mod tracker;
pub mod window;

pub use engine::{AlertLevel, AlertState, AlertUpdate, SmoothingEngine};
pub use tracker::StreamTracker;
pub use window::SlidingWindow;

/// Number of most recent scores averaged per stream.
pub const WINDOW_CAPACITY: usize = 5;

/// Window average at or above which a sample counts as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.75;

/// Window average at or above which the stream is reported as a warning.
pub const MID_RISK_THRESHOLD: f64 = 0.40;

/// Consecutive high-risk averages required before escalating to danger.
pub const CONFIRMATION_COUNT: u32 = 3;
