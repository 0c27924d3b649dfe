use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::debug;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::core::message::{normalize_score, ScoreResponse, StatelessRequest};
use crate::core::GuardError;

/// Events the long-lived channel reports back to its Connection Manager.
///
/// `epoch` identifies the open attempt the event belongs to, so events from a
/// channel that has since been replaced can be told apart.
pub enum ChannelEvent {
    Opened {
        epoch: u64,
        writer: Box<dyn ChannelWriter>,
    },
    OpenFailed {
        epoch: u64,
        error: GuardError,
    },
    Inbound {
        epoch: u64,
        text: String,
    },
    Closed {
        epoch: u64,
        reason: String,
    },
    ReconnectDue {
        generation: u64,
    },
}

/// Opens the long-lived channel to the backend.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Open the channel. Inbound text and the eventual closure are reported on
    /// `events` tagged with `epoch`; the returned writer owns the outbound half.
    async fn open(
        &self,
        epoch: u64,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<Box<dyn ChannelWriter>, GuardError>;
}

/// Outbound half of an open long-lived channel.
#[async_trait]
pub trait ChannelWriter: Send {
    async fn write(&mut self, text: String) -> Result<(), GuardError>;

    async fn close(&mut self);
}

/// One-shot request/response submission used when the channel is unavailable.
#[async_trait]
pub trait StatelessTransport: Send + Sync {
    /// Returns the normalized score, or `RequestFailure` for any non-success outcome.
    async fn submit(&self, request: &StatelessRequest) -> Result<f64, GuardError>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Long-lived channel over a WebSocket.
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn open(
        &self,
        epoch: u64,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<Box<dyn ChannelWriter>, GuardError> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (sink, mut source) = stream.split();

        tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let event = ChannelEvent::Inbound {
                            epoch,
                            text: text.as_str().to_owned(),
                        };
                        if events.send(event).is_err() {
                            // Manager is gone; nothing left to report to.
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => format!("closed by peer ({})", frame.code),
                            None => "closed by peer".to_string(),
                        };
                    }
                    Some(Ok(other)) => {
                        debug!("ignoring non-text channel message ({} bytes)", other.len());
                    }
                    Some(Err(err)) => break err.to_string(),
                    None => break "stream ended".to_string(),
                }
            };
            let _ = events.send(ChannelEvent::Closed { epoch, reason });
        });

        Ok(Box::new(WebSocketWriter { sink }))
    }
}

struct WebSocketWriter {
    sink: WsSink,
}

#[async_trait]
impl ChannelWriter for WebSocketWriter {
    async fn write(&mut self, text: String) -> Result<(), GuardError> {
        self.sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(err) = self.sink.close().await {
            debug!("channel close: {}", err);
        }
    }
}

/// Stateless path over HTTP POST.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GuardError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl StatelessTransport for HttpTransport {
    async fn submit(&self, request: &StatelessRequest) -> Result<f64, GuardError> {
        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GuardError::RequestFailure(format!(
                "backend returned {}",
                status
            )));
        }

        let body: ScoreResponse = response.json().await?;
        normalize_score(body.score)
            .map_err(|err| GuardError::RequestFailure(err.to_string()))
    }
}
