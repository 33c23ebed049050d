//! Command request and reply message types.
//!
//! Defines the outbound command frame and the inbound reply frame that
//! the correlator matches by id.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::{RawValue, to_raw_value};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

// ============================================================================
// Request
// ============================================================================

/// A command request from client to browser.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "Domain.method",
///   "params": { ... },
///   "sessionId": "..."
/// }
/// ```
///
/// `params` and `sessionId` are omitted when absent.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation id.
    pub id: RequestId,

    /// Fully qualified `Domain.method` name.
    pub method: String,

    /// Pre-serialized command parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,

    /// Target session the command is addressed to.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Request {
    /// Creates a parameterless request for `domain.method`.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, domain: &str, method: &str) -> Self {
        Self {
            id,
            method: format!("{domain}.{method}"),
            params: None,
            session_id: None,
        }
    }

    /// Attaches parameters.
    ///
    /// Parameters serializing to JSON `null` are omitted from the frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `params` cannot be serialized.
    pub fn with_params<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self> {
        let raw = to_raw_value(params)?;
        self.params = (raw.get() != "null").then_some(raw);
        Ok(self)
    }

    /// Addresses the request to a target session.
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Serializes the request into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// ResponseError
// ============================================================================

/// Error member of a reply frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseError {
    /// JSON-RPC error code.
    pub code: i64,

    /// Human readable message.
    pub message: String,

    /// Optional extra detail (usually a string).
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<ResponseError> for Error {
    fn from(err: ResponseError) -> Self {
        let data = err.data.map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        });
        Error::protocol(err.code, err.message, data)
    }
}

// ============================================================================
// Reply
// ============================================================================

/// A reply from browser to client.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 7, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 7, "error": { "code": -32601, "message": "..." } }
/// ```
#[derive(Debug)]
pub struct Reply {
    /// Matches the command `id`.
    pub id: RequestId,

    /// Undecoded result (if success).
    pub result: Option<Box<RawValue>>,

    /// Undecoded error member (if error).
    ///
    /// Kept raw so a reply with an unexpected error shape still reaches
    /// its caller.
    pub error: Option<Box<RawValue>>,
}

impl Reply {
    /// Returns `true` if this is an error reply.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the raw result, returning error if the reply was an error.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the reply carried an error
    /// - [`Error::MalformedFrame`] if the error member lacks `code` or `message`
    pub fn into_result(self) -> Result<Option<Box<RawValue>>> {
        let Some(raw) = self.error else {
            return Ok(self.result);
        };

        Err(match serde_json::from_str::<ResponseError>(raw.get()) {
            Ok(err) => err.into(),
            Err(e) => Error::malformed_frame(format!(
                "reply {} has an invalid error member {}: {e}",
                self.id,
                raw.get()
            )),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
