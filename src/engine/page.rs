use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{MessageBridge, PagePort, PageSender, WindowRelay};
use crate::core::{BackgroundToPage, PageId, PageToBackground, StreamId};
use crate::observability::PageMetrics;
use crate::smoothing::{AlertLevel, AlertUpdate, StreamTracker};

use super::{AlertSink, FrameSampler, FrameSource};

enum PageCommand {
    StartStream {
        stream_id: StreamId,
        source: Box<dyn FrameSource>,
        reply: oneshot::Sender<StreamId>,
    },
    StopStream(StreamId),
    Relay(String),
}

struct RunningSampler {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// A page context: owns smoothing state for its streams, their samplers and
/// the alert sink. Scores are processed in arrival order.
///
/// The page listens to streams it samples and streams relayed from its surface.
/// Scores for any other stream are ignored.
pub struct PageRuntime {
    port: PagePort,
    tracker: StreamTracker,
    samplers: HashMap<StreamId, RunningSampler>,
    relayed: HashSet<StreamId>,
    sink: Box<dyn AlertSink>,
    enabled: watch::Receiver<bool>,
    sample_interval: Duration,
    metrics: Arc<PageMetrics>,
    relay: WindowRelay,
}

impl PageRuntime {
    pub fn new(
        port: PagePort,
        sink: Box<dyn AlertSink>,
        enabled: watch::Receiver<bool>,
        sample_interval: Duration,
        metrics: Arc<PageMetrics>,
    ) -> Self {
        let relay = WindowRelay::new(port.sender.clone());
        Self {
            port,
            tracker: StreamTracker::new(),
            samplers: HashMap::new(),
            relayed: HashSet::new(),
            sink,
            enabled,
            sample_interval,
            metrics,
            relay,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.port.page_id()
    }

    /// Apply one message from the background context.
    pub fn handle_message(&mut self, message: BackgroundToPage) {
        match message {
            BackgroundToPage::Score {
                stream_id: Some(stream_id),
                score,
            } => {
                if !self.is_listening(&stream_id) {
                    debug!("{}: ignoring score for untracked {}", self.page_id(), stream_id);
                    return;
                }
                let update = self.tracker.observe(&stream_id, score);
                self.emit(Some(&stream_id), &update);
            }
            BackgroundToPage::Score {
                stream_id: None,
                score,
            } => {
                if self.samplers.is_empty() && self.relayed.is_empty() {
                    debug!("{}: unattributed score with no tracked streams", self.page_id());
                    return;
                }
                let update = self.tracker.observe_unattributed(score);
                self.emit(None, &update);
            }
        }
    }

    pub fn is_listening(&self, stream_id: &StreamId) -> bool {
        self.samplers.contains_key(stream_id) || self.relayed.contains(stream_id)
    }

    pub fn tracker(&self) -> &StreamTracker {
        &self.tracker
    }

    pub fn spawn(self, bridge: MessageBridge) -> PageHandle {
        let page_id = self.page_id();
        let sender = self.port.sender.clone();
        let cancel = CancellationToken::new();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(self.run(commands_rx, cancel.clone()));

        PageHandle {
            page_id,
            bridge,
            sender,
            commands: commands_tx,
            cancel,
            join,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PageCommand>, cancel: CancellationToken) {
        info!("{} started", self.page_id());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = self.port.inbox.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
                Some(command) = commands.recv() => self.handle_command(command),
            }
        }

        for (_, sampler) in self.samplers.drain() {
            sampler.cancel.cancel();
            let _ = sampler.join.await;
        }
        info!("{} stopped", self.page_id());
    }

    fn handle_command(&mut self, command: PageCommand) {
        match command {
            PageCommand::StartStream {
                stream_id,
                source,
                reply,
            } => {
                let sampler = FrameSampler::new(
                    stream_id.clone(),
                    source,
                    self.port.sender.clone(),
                    self.enabled.clone(),
                    self.sample_interval,
                    Arc::clone(&self.metrics),
                );
                let cancel = CancellationToken::new();
                let join = tokio::spawn(sampler.run(cancel.clone()));
                self.samplers
                    .insert(stream_id.clone(), RunningSampler { cancel, join });
                let _ = reply.send(stream_id);
            }
            PageCommand::StopStream(stream_id) => {
                if let Some(sampler) = self.samplers.remove(&stream_id) {
                    sampler.cancel.cancel();
                }
                self.relayed.remove(&stream_id);
                self.tracker.forget(&stream_id);
            }
            PageCommand::Relay(posted) => {
                if let Some(stream_id) = self.relay.accept(&posted) {
                    self.relayed.insert(stream_id);
                }
            }
        }
    }

    fn emit(&mut self, stream_id: Option<&StreamId>, update: &AlertUpdate) {
        self.metrics.record_score();
        if update.level == AlertLevel::Danger {
            self.metrics.record_danger();
        }
        self.sink.render(stream_id, update);
    }
}

/// Handle to a running page context.
pub struct PageHandle {
    page_id: PageId,
    bridge: MessageBridge,
    sender: PageSender,
    commands: mpsc::UnboundedSender<PageCommand>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PageHandle {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Begin sampling a new stream; its id is generated here, once.
    pub async fn start_stream(&self, source: Box<dyn FrameSource>) -> Result<StreamId> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(PageCommand::StartStream {
                stream_id: StreamId::generate(),
                source,
                reply,
            })
            .map_err(|_| anyhow!("{} is not running", self.page_id))?;
        response
            .await
            .with_context(|| format!("{} stopped before starting the stream", self.page_id))
    }

    /// Stop sampling a stream and drop its smoothing state.
    pub fn stop_stream(&self, stream_id: StreamId) {
        let _ = self.commands.send(PageCommand::StopStream(stream_id));
    }

    /// Hand a message posted on the page surface to the relay.
    pub fn post_from_page(&self, posted: impl Into<String>) {
        let _ = self.commands.send(PageCommand::Relay(posted.into()));
    }

    /// Ask the background context to reconnect now.
    pub fn request_reconnect(&self) -> bool {
        self.sender.send(PageToBackground::Reconnect)
    }

    /// Tear the page down; messages still addressed to it are dropped.
    pub async fn close(self) -> Result<()> {
        self.bridge.close_page(self.page_id);
        self.cancel.cancel();
        self.join
            .await
            .with_context(|| format!("{} task failed to join", self.page_id))
    }
}
