//! Inbound frame classification.
//!
//! Only the top-level envelope is parsed. `result` and `params` stay as
//! raw JSON until a caller or the event bus decodes them.
//!
//! | Envelope | Classification |
//! |----------|----------------|
//! | `id` present | [`Frame::Reply`], whatever the shape of `error` |
//! | `method` = `Domain.event`, no `id` | [`Frame::Event`] |
//! | anything else | [`Error::MalformedFrame`] |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

use super::event::RawEvent;
use super::request::Reply;

// ============================================================================
// Envelope
// ============================================================================

/// Top-level members of any inbound frame. Unknown members are ignored.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<RequestId>,

    #[serde(default)]
    method: Option<String>,

    #[serde(default)]
    result: Option<Box<RawValue>>,

    #[serde(default)]
    error: Option<Box<RawValue>>,

    #[serde(default)]
    params: Option<Box<RawValue>>,

    #[serde(rename = "sessionId", default)]
    session_id: Option<SessionId>,
}

// ============================================================================
// Frame
// ============================================================================

/// A classified inbound frame.
#[derive(Debug)]
pub enum Frame {
    /// Reply to a command, routed to the correlator.
    Reply(Reply),

    /// Unsolicited notification, routed to the event bus.
    Event(RawEvent),
}

impl Frame {
    /// Classifies a text frame by its envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the text is not a JSON object
    /// or matches neither envelope shape.
    pub fn classify(text: &str) -> Result<Self> {
        // serde would also accept a positional array for the envelope struct
        if !text.trim_start().starts_with('{') {
            return Err(Error::malformed_frame("frame is not a JSON object"));
        }

        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| Error::malformed_frame(format!("invalid envelope: {e}")))?;

        if let Some(id) = envelope.id {
            return Ok(Self::Reply(Reply {
                id,
                result: envelope.result,
                error: envelope.error,
            }));
        }

        match envelope.method {
            Some(method) => Ok(Self::Event(RawEvent::new(
                method,
                envelope.params,
                envelope.session_id,
            )?)),
            None => Err(Error::malformed_frame("frame has neither id nor method")),
        }
    }

    /// Returns `true` for replies.
    #[inline]
    #[must_use]
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply(_))
    }

    /// Returns `true` for events.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
