use log::{info, warn};

use crate::core::StreamId;
use crate::smoothing::{AlertLevel, AlertUpdate};

/// Receives every smoothed update for rendering; repeats are the sink's to collapse.
///
/// `stream` is `None` for the page's unattributed banner.
pub trait AlertSink: Send {
    fn render(&mut self, stream: Option<&StreamId>, update: &AlertUpdate);
}

impl<F> AlertSink for F
where
    F: FnMut(Option<&StreamId>, &AlertUpdate) + Send,
{
    fn render(&mut self, stream: Option<&StreamId>, update: &AlertUpdate) {
        self(stream, update)
    }
}

/// Banner text shown for an update.
pub fn banner_text(update: &AlertUpdate) -> String {
    let label = match update.level {
        AlertLevel::Danger => "Potential Deepfake Detected",
        AlertLevel::Warning => "Warning",
        AlertLevel::Safe => "Safe",
    };
    format!(
        "{} - Confidence: {}%",
        label,
        (update.average * 100.0).round() as u32
    )
}

/// Writes banner changes to the log.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn render(&mut self, stream: Option<&StreamId>, update: &AlertUpdate) {
        if !update.changed() {
            return;
        }
        let origin = stream.map_or("unattributed", StreamId::as_str);
        match update.level {
            AlertLevel::Danger => warn!("[{}] {}", origin, banner_text(update)),
            _ => info!("[{}] {}", origin, banner_text(update)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_text() {
        let update = AlertUpdate {
            level: AlertLevel::Danger,
            previous: AlertLevel::Warning,
            average: 0.874,
            consecutive_high: 3,
        };
        assert_eq!(banner_text(&update), "Potential Deepfake Detected - Confidence: 87%");
    }
}
