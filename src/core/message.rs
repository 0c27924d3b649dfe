use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EncodedFrame, GuardError, PageId, StreamId, SubmissionId};

/// Version stamped on every envelope crossing a context boundary.
pub const PROTOCOL_VERSION: u16 = 1;

/// Where a score for a submitted frame has to go.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub page: PageId,
    pub stream: StreamId,
}

impl Destination {
    pub fn new(page: PageId, stream: StreamId) -> Self {
        Self { page, stream }
    }
}

/// Messages a page context sends to the background context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageToBackground {
    Frame {
        image: EncodedFrame,
        #[serde(rename = "streamId")]
        stream_id: StreamId,
    },
    /// Ask the background to (re)open the long-lived channel now.
    Reconnect,
}

/// Messages the background context sends to page contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundToPage {
    Score {
        /// `None` when the reply could not be correlated to a stream.
        #[serde(rename = "streamId")]
        stream_id: Option<StreamId>,
        score: f64,
    },
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    v: u16,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn<T> {
    v: u16,
    #[serde(flatten)]
    body: T,
}

/// Serializes a boundary message into a versioned JSON envelope.
pub fn encode_envelope<T: Serialize>(body: &T) -> Result<String, GuardError> {
    Ok(serde_json::to_string(&EnvelopeOut {
        v: PROTOCOL_VERSION,
        body,
    })?)
}

/// Decodes a versioned JSON envelope, rejecting unknown kinds and foreign versions.
pub fn decode_envelope<T: DeserializeOwned>(raw: &str) -> Result<T, GuardError> {
    let envelope: EnvelopeIn<T> = serde_json::from_str(raw)?;
    if envelope.v != PROTOCOL_VERSION {
        return Err(GuardError::MalformedReply(format!(
            "unsupported protocol version {}",
            envelope.v
        )));
    }
    Ok(envelope.body)
}

/// Outbound frame on the long-lived channel.
#[derive(Debug, Clone, Serialize)]
pub struct WireFrame<'a> {
    pub frame_id: &'a str,
    pub image_base64: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default, alias = "frameId")]
    frame_id: Option<String>,
    #[serde(default)]
    score: Option<Value>,
}

/// Inbound reply on the long-lived channel.
///
/// Decoding only requires the identifier, so a reply with a bad score can still
/// retire its pending correlation before being dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct WireReply {
    pub submission_id: SubmissionId,
    score: Option<Value>,
}

impl WireReply {
    pub fn decode(raw: &str) -> Result<Self, GuardError> {
        let reply: RawReply = serde_json::from_str(raw)?;
        let frame_id = reply
            .frame_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GuardError::MalformedReply("missing frame_id".to_string()))?;

        Ok(Self {
            submission_id: SubmissionId::new(frame_id),
            score: reply.score,
        })
    }

    /// The normalized score; `MalformedReply` if it is missing or not a number.
    pub fn score(&self) -> Result<f64, GuardError> {
        let score = self
            .score
            .as_ref()
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                GuardError::MalformedReply(format!(
                    "reply {} has no numeric score",
                    self.submission_id
                ))
            })?;
        normalize_score(score)
    }
}

/// Body of a stateless request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatelessRequest {
    pub image_base64: String,
    /// ISO-8601 capture time.
    pub timestamp: String,
    pub frame_id: String,
}

/// Success body of a stateless request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreResponse {
    pub score: f64,
    #[serde(default)]
    pub frame_id: Option<String>,
}

/// Clamps a backend score into `[0, 1]`; non-finite values are malformed.
pub fn normalize_score(score: f64) -> Result<f64, GuardError> {
    if !score.is_finite() {
        return Err(GuardError::MalformedReply(format!("score {} is not finite", score)));
    }
    Ok(score.clamp(0.0, 1.0))
}
