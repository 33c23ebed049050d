//! Event message types.
//!
//! Events are notifications pushed by the browser with no request
//! counterpart. They are named `Domain.eventName`.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use serde_json::value::{RawValue, to_raw_value};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// RawEvent
// ============================================================================

/// An undecoded event notification.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... },
///   "sessionId": "..."
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Event name in `Domain.eventName` format.
    method: String,

    /// Byte offset of the separating dot.
    dot: usize,

    /// Undecoded event payload.
    params: Option<Box<RawValue>>,

    /// Target session the event originates from.
    session_id: Option<SessionId>,
}

impl RawEvent {
    /// Creates a raw event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if `method` is not `Domain.eventName`.
    pub fn new(
        method: impl Into<String>,
        params: Option<Box<RawValue>>,
        session_id: Option<SessionId>,
    ) -> Result<Self> {
        let method = method.into();
        let dot = match method.find('.') {
            Some(dot) if dot > 0 && dot + 1 < method.len() => dot,
            _ => {
                return Err(Error::malformed_frame(format!(
                    "event method {method:?} is not Domain.eventName"
                )));
            }
        };

        Ok(Self {
            method,
            dot,
            params,
            session_id,
        })
    }

    /// Creates a raw event from an already parsed payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] for a bad method name.
    pub fn from_value(method: impl Into<String>, params: &Value) -> Result<Self> {
        Self::new(method, Some(to_raw_value(params)?), None)
    }

    /// Sets the originating target session.
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Returns the full `Domain.eventName`.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the domain part.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = RawEvent::new("Network.requestWillBeSent", None, None)?;
    /// assert_eq!(event.domain(), "Network");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.method[..self.dot]
    }

    /// Returns the event name part.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.method[self.dot + 1..]
    }

    /// Returns the undecoded payload.
    #[inline]
    #[must_use]
    pub fn params(&self) -> Option<&RawValue> {
        self.params.as_deref()
    }

    /// Returns the payload JSON text, `{}` when the event carried none.
    #[inline]
    #[must_use]
    pub fn params_json(&self) -> &str {
        self.params.as_deref().map_or("{}", RawValue::get)
    }

    /// Returns the originating target session.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_domain_and_event_name() {
        let event = RawEvent::new("Network.requestWillBeSent", None, None).expect("event");
        assert_eq!(event.domain(), "Network");
        assert_eq!(event.event_name(), "requestWillBeSent");
        assert_eq!(event.method(), "Network.requestWillBeSent");
    }

    #[test]
    fn test_name_keeps_everything_after_first_dot() {
        let event = RawEvent::new("Custom.some.nested", None, None).expect("event");
        assert_eq!(event.domain(), "Custom");
        assert_eq!(event.event_name(), "some.nested");
    }

    #[test]
    fn test_rejects_method_without_dot() {
        assert!(RawEvent::new("NoDot", None, None).is_err());
        assert!(RawEvent::new(".leading", None, None).is_err());
        assert!(RawEvent::new("Trailing.", None, None).is_err());
    }

    #[test]
    fn test_params_json_defaults_to_empty_object() {
        let event = RawEvent::new("Page.loadEventFired", None, None).expect("event");
        assert_eq!(event.params_json(), "{}");

        let event =
            RawEvent::from_value("Page.loadEventFired", &json!({ "timestamp": 1.5 })).expect("event");
        assert_eq!(event.params_json(), r#"{"timestamp":1.5}"#);
    }
}
