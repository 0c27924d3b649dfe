use log::debug;

use crate::core::message::decode_envelope;
use crate::core::{EncodedFrame, GuardError, PageToBackground, StreamId};

use super::PageSender;

/// Relays frames posted on the page surface by an injected page-level script
/// to the background context.
///
/// Only `frame` messages are accepted from the page surface; control messages
/// are reserved for the page context itself.
pub struct WindowRelay {
    sender: PageSender,
}

impl WindowRelay {
    pub fn new(sender: PageSender) -> Self {
        Self { sender }
    }

    /// Returns the stream of the forwarded frame, or `None` if nothing was relayed.
    pub fn accept(&self, posted: &str) -> Option<StreamId> {
        let (image, stream_id) = match Self::decode(posted) {
            Ok(frame) => frame,
            Err(err) => {
                debug!("ignoring page surface message: {}", err);
                return None;
            }
        };

        let forwarded = self.sender.send(PageToBackground::Frame {
            image,
            stream_id: stream_id.clone(),
        });
        forwarded.then_some(stream_id)
    }

    fn decode(posted: &str) -> Result<(EncodedFrame, StreamId), GuardError> {
        match decode_envelope::<PageToBackground>(posted)? {
            PageToBackground::Frame { image, stream_id } => Ok((image, stream_id)),
            other => Err(GuardError::MalformedReply(format!(
                "{:?} is not relayed from the page surface",
                other
            ))),
        }
    }
}
