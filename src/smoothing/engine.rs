use serde::{Deserialize, Serialize};

use super::{SlidingWindow, CONFIRMATION_COUNT, HIGH_RISK_THRESHOLD, MID_RISK_THRESHOLD};

/// Human-facing alert level of one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertLevel {
    #[default]
    Safe,
    Warning,
    Danger,
}

impl AlertLevel {
    pub fn name(&self) -> &str {
        match self {
            Self::Safe => "Safe",
            Self::Warning => "Warning",
            Self::Danger => "Danger",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    pub level: AlertLevel,
    pub consecutive_high: u32,
}

/// Result of feeding one score; emitted on every sample, changed or not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertUpdate {
    pub level: AlertLevel,
    pub previous: AlertLevel,
    pub average: f64,
    pub consecutive_high: u32,
}

impl AlertUpdate {
    pub fn changed(&self) -> bool {
        self.level != self.previous
    }
}

/// Sliding-window average plus hysteresis for a single stream.
///
/// The mid band and the low band take effect immediately. Danger requires
/// `CONFIRMATION_COUNT` consecutive high-risk averages; until then the level
/// is left where it was.
#[derive(Debug, Clone, Default)]
pub struct SmoothingEngine {
    window: SlidingWindow,
    state: AlertState,
}

impl SmoothingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine averaging over the last `capacity` scores instead of [`super::WINDOW_CAPACITY`].
    pub fn with_window_capacity(capacity: usize) -> Self {
        Self {
            window: SlidingWindow::with_capacity(capacity),
            state: AlertState::default(),
        }
    }

    pub fn observe(&mut self, score: f64) -> AlertUpdate {
        let previous = self.state.level;

        self.window.push(score);
        let average = self.window.mean();

        if average >= HIGH_RISK_THRESHOLD {
            self.state.consecutive_high = self.state.consecutive_high.saturating_add(1);
            if self.state.consecutive_high >= CONFIRMATION_COUNT {
                self.state.level = AlertLevel::Danger;
            }
        } else if average >= MID_RISK_THRESHOLD {
            self.state.consecutive_high = 0;
            self.state.level = AlertLevel::Warning;
        } else {
            self.state.consecutive_high = 0;
            self.state.level = AlertLevel::Safe;
        }

        AlertUpdate {
            level: self.state.level,
            previous,
            average,
            consecutive_high: self.state.consecutive_high,
        }
    }

    pub fn level(&self) -> AlertLevel {
        self.state.level
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }
}
