use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::bridge::MessageBridge;
use crate::config::GuardConfig;
use crate::core::message::{StatelessRequest, WireFrame, WireReply};
use crate::core::{BackgroundToPage, Destination, EncodedFrame, SubmissionId};
use crate::observability::ConnectionMetrics;

use super::state::ReconnectTimer;
use super::{
    Backoff, ChannelConnector, ChannelEvent, ChannelWriter, ConnectionPhase, ConnectionState,
    Correlator, StatelessTransport,
};

/// How a submission left the background context.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Written to the long-lived channel; the reply is correlated by this id.
    Channel(SubmissionId),
    /// Handed to the stateless path; the handle finishes once the score is routed or dropped.
    Stateless(JoinHandle<()>),
}

/// Owns the long-lived channel and gives `submit` the same shape whatever its health.
pub struct ConnectionManager {
    state: ConnectionState,
    correlator: Correlator,
    connector: Arc<dyn ChannelConnector>,
    stateless: Arc<dyn StatelessTransport>,
    bridge: MessageBridge,
    metrics: Arc<ConnectionMetrics>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    writer: Option<Box<dyn ChannelWriter>>,
    epoch: u64,
    timer_generation: u64,
}

impl ConnectionManager {
    /// Returns the manager and the receiver its channel events arrive on; the
    /// owner feeds those back through [`ConnectionManager::handle_event`].
    pub fn new(
        config: &GuardConfig,
        connector: Arc<dyn ChannelConnector>,
        stateless: Arc<dyn StatelessTransport>,
        bridge: MessageBridge,
        metrics: Arc<ConnectionMetrics>,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let backoff = Backoff::new(config.backoff_floor(), config.backoff_ceiling());

        let manager = Self {
            state: ConnectionState::new(backoff),
            correlator: Correlator::new(config.correlation_ttl()),
            connector,
            stateless,
            bridge,
            metrics,
            events_tx,
            writer: None,
            epoch: 0,
            timer_generation: 0,
        };
        (manager, events_rx)
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase()
    }

    pub fn pending_correlations(&self) -> usize {
        self.correlator.len()
    }

    /// Start opening the channel. No-op while an attempt is in flight or the
    /// channel is open; cancels a scheduled reconnect otherwise.
    pub fn connect(&mut self) {
        if self.state.phase() != ConnectionPhase::Disconnected {
            return;
        }
        if self.state.cancel_reconnect_timer() {
            debug!("pending reconnect cancelled by explicit connect");
        }
        self.state.transition_to(ConnectionPhase::Connecting);

        self.epoch += 1;
        let epoch = self.epoch;
        let connector = Arc::clone(&self.connector);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match connector.open(epoch, events.clone()).await {
                Ok(writer) => ChannelEvent::Opened { epoch, writer },
                Err(error) => ChannelEvent::OpenFailed { epoch, error },
            };
            let _ = events.send(event);
        });
    }

    pub async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened { epoch, mut writer } => {
                if epoch != self.epoch || self.state.phase() != ConnectionPhase::Connecting {
                    writer.close().await;
                    return;
                }
                self.state.transition_to(ConnectionPhase::Connected);
                self.state.backoff_mut().reset();
                self.state.cancel_reconnect_timer();
                self.writer = Some(writer);
                info!("scoring channel connected");
            }
            ChannelEvent::OpenFailed { epoch, error } => {
                if epoch != self.epoch {
                    return;
                }
                warn!("failed to open scoring channel: {}", error);
                self.on_channel_lost();
            }
            ChannelEvent::Inbound { text, .. } => {
                // Replies from an older channel still correlate.
                self.handle_reply(&text);
            }
            ChannelEvent::Closed { epoch, reason } => {
                if epoch != self.epoch || self.state.phase() == ConnectionPhase::Disconnected {
                    return;
                }
                warn!("scoring channel closed: {}", reason);
                self.writer = None;
                self.on_channel_lost();
            }
            ChannelEvent::ReconnectDue { generation } => {
                if self.state.reconnect_generation() != Some(generation) {
                    return;
                }
                self.state.clear_reconnect_timer();
                self.connect();
            }
        }
    }

    /// Submit one frame for scoring on whichever path is available.
    pub async fn submit(&mut self, destination: Destination, image: EncodedFrame) -> SubmitOutcome {
        let submission_id = SubmissionId::generate();

        if self.state.phase() == ConnectionPhase::Connected {
            if let Some(writer) = self.writer.as_mut() {
                self.correlator
                    .register(submission_id.clone(), destination.clone());

                let result = match serde_json::to_string(&WireFrame {
                    frame_id: submission_id.as_str(),
                    image_base64: image.as_str(),
                }) {
                    Ok(text) => writer.write(text).await,
                    Err(err) => Err(err.into()),
                };

                match result {
                    Ok(()) => {
                        self.metrics.record_channel_submission();
                        return SubmitOutcome::Channel(submission_id);
                    }
                    Err(err) => {
                        warn!("channel write failed, falling back to stateless: {}", err);
                        self.correlator.resolve(&submission_id);
                        self.metrics.record_fallback();
                        self.drop_writer().await;
                        self.on_channel_lost();
                    }
                }
            }
        }

        SubmitOutcome::Stateless(self.submit_stateless(submission_id, destination, image))
    }

    /// Evict correlations whose reply is overdue.
    pub fn sweep_correlations(&mut self) -> usize {
        let expired = self.correlator.sweep(Instant::now());
        if expired > 0 {
            debug!("evicted {} expired correlations", expired);
            self.metrics.record_expired(expired as u64);
        }
        expired
    }

    /// Close the channel and cancel any reconnect; used when the context unloads.
    pub async fn shutdown(&mut self) {
        self.state.cancel_reconnect_timer();
        self.drop_writer().await;
    }

    fn submit_stateless(
        &self,
        submission_id: SubmissionId,
        destination: Destination,
        image: EncodedFrame,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(&self.stateless);
        let bridge = self.bridge.clone();
        let metrics = Arc::clone(&self.metrics);
        metrics.record_stateless_submission();

        let request = StatelessRequest {
            image_base64: image.as_str().to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            frame_id: submission_id.as_str().to_owned(),
        };

        tokio::spawn(async move {
            match transport.submit(&request).await {
                Ok(score) => deliver(&bridge, &metrics, destination, score),
                Err(err) => {
                    warn!("dropping frame {}: {}", request.frame_id, err);
                    metrics.record_stateless_failure();
                }
            }
        })
    }

    fn handle_reply(&mut self, text: &str) {
        let reply = match WireReply::decode(text) {
            Ok(reply) => reply,
            Err(err) => {
                warn!("dropping channel message: {}", err);
                self.metrics.record_malformed();
                return;
            }
        };

        // The entry is retired by its reply even when the score turns out unusable.
        let destination = self.correlator.resolve(&reply.submission_id);
        let score = match reply.score() {
            Ok(score) => score,
            Err(err) => {
                warn!("dropping channel message: {}", err);
                self.metrics.record_malformed();
                return;
            }
        };

        match destination {
            Some(destination) => deliver(&self.bridge, &self.metrics, destination, score),
            None => {
                debug!(
                    "no pending submission {}, broadcasting score",
                    reply.submission_id
                );
                self.metrics.record_broadcast();
                self.bridge.broadcast(BackgroundToPage::Score {
                    stream_id: None,
                    score,
                });
            }
        }
    }

    fn on_channel_lost(&mut self) {
        // Retire the attempt so its late Opened/Closed events are ignored.
        self.epoch += 1;
        self.state.transition_to(ConnectionPhase::Disconnected);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.state.reconnect_scheduled() {
            return;
        }
        let delay: Duration = self.state.backoff_mut().next_delay();
        info!("scheduling channel reconnect in {}ms", delay.as_millis());
        self.metrics.record_reconnect_scheduled();

        self.timer_generation += 1;
        let generation = self.timer_generation;
        let events = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ChannelEvent::ReconnectDue { generation });
        });
        self.state
            .set_reconnect_timer(ReconnectTimer { generation, handle });
    }

    async fn drop_writer(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            writer.close().await;
        }
    }
}

/// Route a score to its page; a stale page turns the delivery into a broadcast.
fn deliver(bridge: &MessageBridge, metrics: &ConnectionMetrics, destination: Destination, score: f64) {
    let message = BackgroundToPage::Score {
        stream_id: Some(destination.stream),
        score,
    };
    if bridge.send_to(destination.page, message.clone()) {
        metrics.record_routed();
    } else {
        metrics.record_broadcast();
        bridge.broadcast(message);
    }
}
