use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::Backoff;

/// Phases of the long-lived channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionPhase {
    /// Check if transition from current phase to target phase is valid
    pub fn can_transition_to(&self, target: ConnectionPhase) -> bool {
        use ConnectionPhase::*;

        matches!(
            (self, target),
            // From Disconnected
            (Disconnected, Connecting) |

            // From Connecting
            (Connecting, Connected) |
            (Connecting, Disconnected) |

            // From Connected
            (Connected, Disconnected)
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        }
    }
}

/// A scheduled reconnect. `generation` lets a fired-but-cancelled timer be recognized.
#[derive(Debug)]
pub struct ReconnectTimer {
    pub generation: u64,
    pub handle: JoinHandle<()>,
}

/// Connection state of one background context, owned by its Connection Manager.
#[derive(Debug, Default)]
pub struct ConnectionState {
    phase: ConnectionPhase,
    backoff: Backoff,
    reconnect_timer: Option<ReconnectTimer>,
}

impl ConnectionState {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            backoff,
            reconnect_timer: None,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub(crate) fn backoff_mut(&mut self) -> &mut Backoff {
        &mut self.backoff
    }

    pub fn reconnect_scheduled(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    pub(crate) fn reconnect_generation(&self) -> Option<u64> {
        self.reconnect_timer.as_ref().map(|timer| timer.generation)
    }

    /// Move to `target`, returning `false` (and staying put) on an invalid transition.
    pub(crate) fn transition_to(&mut self, target: ConnectionPhase) -> bool {
        if !self.phase.can_transition_to(target) {
            return false;
        }
        self.phase = target;
        true
    }

    pub(crate) fn set_reconnect_timer(&mut self, timer: ReconnectTimer) {
        self.reconnect_timer = Some(timer);
    }

    /// Forget the timer after it fired.
    pub(crate) fn clear_reconnect_timer(&mut self) {
        self.reconnect_timer = None;
    }

    /// Abort a pending reconnect timer. Returns `true` if one was pending.
    pub(crate) fn cancel_reconnect_timer(&mut self) -> bool {
        match self.reconnect_timer.take() {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }
}
