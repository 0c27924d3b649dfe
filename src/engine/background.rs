use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::bridge::{BackgroundInbox, MessageBridge};
use crate::config::GuardConfig;
use crate::connection::{
    ChannelConnector, ChannelEvent, ConnectionManager, ConnectionPhase, StatelessTransport,
};
use crate::core::{Destination, PageId, PageToBackground};
use crate::observability::ConnectionMetrics;

/// The background context: a single task that owns the Connection Manager and
/// interleaves page messages, channel events and correlation sweeps.
pub struct BackgroundRuntime {
    manager: ConnectionManager,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    inbox: BackgroundInbox,
    sweep_every: Duration,
}

impl BackgroundRuntime {
    pub fn new(
        config: &GuardConfig,
        connector: Arc<dyn ChannelConnector>,
        stateless: Arc<dyn StatelessTransport>,
        bridge: MessageBridge,
        inbox: BackgroundInbox,
        metrics: Arc<ConnectionMetrics>,
    ) -> Self {
        let (manager, events) = ConnectionManager::new(config, connector, stateless, bridge, metrics);
        Self {
            manager,
            events,
            inbox,
            sweep_every: config.correlation_sweep(),
        }
    }

    pub fn spawn(self) -> BackgroundHandle {
        let cancel = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Disconnected);
        let join = tokio::spawn(self.run(cancel.clone(), phase_tx));
        BackgroundHandle {
            cancel,
            phase: phase_rx,
            join,
        }
    }

    async fn run(
        mut self,
        cancel: CancellationToken,
        phase_tx: watch::Sender<ConnectionPhase>,
    ) {
        info!("background context started");
        self.manager.connect();

        let mut sweep = tokio::time::interval(self.sweep_every);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some((page, message)) = self.inbox.recv() => {
                    self.handle_page_message(page, message).await;
                }
                Some(event) = self.events.recv() => {
                    self.manager.handle_event(event).await;
                }
                _ = sweep.tick() => {
                    self.manager.sweep_correlations();
                }
            }
            phase_tx.send_if_modified(|phase| {
                let current = self.manager.phase();
                let modified = *phase != current;
                *phase = current;
                modified
            });
        }

        self.manager.shutdown().await;
        info!("background context stopped");
    }

    async fn handle_page_message(&mut self, page: PageId, message: PageToBackground) {
        match message {
            PageToBackground::Frame { image, stream_id } => {
                // Stateless completions route themselves; nothing to await here.
                let _ = self
                    .manager
                    .submit(Destination::new(page, stream_id), image)
                    .await;
            }
            PageToBackground::Reconnect => self.manager.connect(),
        }
    }
}

pub struct BackgroundHandle {
    cancel: CancellationToken,
    phase: watch::Receiver<ConnectionPhase>,
    join: JoinHandle<()>,
}

impl BackgroundHandle {
    /// Latest connection phase published by the background context.
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    /// Wait until the connection reaches `phase`.
    pub async fn wait_for_phase(&mut self, phase: ConnectionPhase) -> Result<()> {
        self.phase
            .wait_for(|current| *current == phase)
            .await
            .context("background context stopped before reaching phase")?;
        Ok(())
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.join.await.context("background context task failed to join")
    }
}
