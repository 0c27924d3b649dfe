pub mod collector;
pub mod metrics;
pub mod monitor;

pub use collector::MetricsCollector;
pub use metrics::{ConnectionMetrics, PageMetrics};
pub use monitor::GuardMonitor;
