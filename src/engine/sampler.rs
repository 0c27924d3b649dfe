use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::bridge::PageSender;
use crate::core::{EncodedFrame, GuardError, PageToBackground, StreamId};
use crate::observability::PageMetrics;

/// Produces encoded still frames for one stream.
#[async_trait]
pub trait FrameSource: Send {
    /// `Ok(None)` when there is nothing to sample right now (paused, ended, not
    /// ready). `Err(GuardError::CaptureDegraded)` when pixels cannot be read.
    async fn capture(&mut self) -> Result<Option<EncodedFrame>, GuardError>;
}

/// Samples one stream at a fixed cadence, independent of backend latency.
pub struct FrameSampler {
    stream_id: StreamId,
    source: Box<dyn FrameSource>,
    sender: PageSender,
    enabled: watch::Receiver<bool>,
    interval: Duration,
    metrics: Arc<PageMetrics>,
}

impl FrameSampler {
    pub fn new(
        stream_id: StreamId,
        source: Box<dyn FrameSource>,
        sender: PageSender,
        enabled: watch::Receiver<bool>,
        interval: Duration,
        metrics: Arc<PageMetrics>,
    ) -> Self {
        Self {
            stream_id,
            source,
            sender,
            enabled,
            interval,
            metrics,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sampler for {} stopped", self.stream_id);
                    break;
                }
                _ = ticker.tick() => {
                    let enabled = *self.enabled.borrow();
                    if !enabled {
                        continue;
                    }
                    if !self.sample_once().await {
                        info!("background gone, sampler for {} exiting", self.stream_id);
                        break;
                    }
                }
            }
        }
    }

    /// Returns `false` once the background context can no longer be reached.
    async fn sample_once(&mut self) -> bool {
        match self.source.capture().await {
            Ok(Some(image)) => {
                self.metrics.record_frame_sampled();
                self.sender.send(PageToBackground::Frame {
                    image,
                    stream_id: self.stream_id.clone(),
                })
            }
            Ok(None) => true,
            Err(err) => {
                debug!("skipping capture for {}: {}", self.stream_id, err);
                self.metrics.record_capture_skipped();
                true
            }
        }
    }
}
