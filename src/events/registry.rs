//! Event decoder registry.
//!
//! Maps an exact `Domain.eventName` string to the decoder producing its
//! typed value. The registry is built once by the bindings layer and
//! shared read-only with every session.
//!
//! # Example
//!
//! ```ignore
//! use cdp_session::events::EventDecoders;
//!
//! #[derive(Clone, serde::Deserialize)]
//! struct RequestWillBeSent {
//!     #[serde(rename = "requestId")]
//!     request_id: String,
//! }
//!
//! let decoders = EventDecoders::builder()
//!     .event::<RequestWillBeSent>("Network.requestWillBeSent")
//!     .raw("Page.loadEventFired")
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::value::RawValue;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::RawEvent;

// ============================================================================
// Types
// ============================================================================

/// Type-erased decoded event value.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Decoder function type.
type DecodeFn = dyn Fn(&RawEvent) -> Result<Payload> + Send + Sync;

// ============================================================================
// ProtocolEvent
// ============================================================================

/// A decoded event, as handed to subscribers.
///
/// Cloning is cheap: the raw frame and the decoded value are shared.
#[derive(Clone)]
pub struct ProtocolEvent {
    raw: Arc<RawEvent>,
    payload: Payload,
}

impl ProtocolEvent {
    /// Returns the full `Domain.eventName`.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        self.raw.method()
    }

    /// Returns the domain part of the name.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.raw.domain()
    }

    /// Returns the event part of the name.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.raw.event_name()
    }

    /// Returns the originating target session, if any.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.raw.session_id()
    }

    /// Returns the undecoded payload.
    #[inline]
    #[must_use]
    pub fn params(&self) -> Option<&RawValue> {
        self.raw.params()
    }

    /// Returns the decoded value if it is a `T`.
    #[inline]
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Returns `true` if the decoded value is a `T`.
    #[inline]
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Takes the decoded value out, cloning only if it is still shared.
    #[must_use]
    pub fn into_payload<T: Any + Clone + Send + Sync>(self) -> Option<T> {
        let value = self.payload.downcast::<T>().ok()?;
        Some(Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
    }
}

impl fmt::Debug for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolEvent")
            .field("method", &self.method())
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// EventDecoder
// ============================================================================

/// Decoder for one event name.
#[derive(Clone)]
pub struct EventDecoder {
    /// Rust type produced, for diagnostics.
    type_name: &'static str,
    decode: Arc<DecodeFn>,
}

impl EventDecoder {
    /// Creates a decoder from a closure.
    pub fn new<T, F>(decode: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&RawEvent) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            decode: Arc::new(move |raw: &RawEvent| decode(raw).map(|value| Arc::new(value) as Payload)),
        }
    }

    /// Creates a serde decoder for `T`.
    #[must_use]
    pub fn serde<T>() -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
    {
        Self::new(|raw: &RawEvent| {
            serde_json::from_str::<T>(raw.params_json())
                .map_err(|e| Error::event_decode(raw.method(), e))
        })
    }

    /// Returns the produced type name.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Decodes a raw event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventDecode`] if the payload does not fit.
    pub fn decode(&self, raw: RawEvent) -> Result<ProtocolEvent> {
        let payload = (self.decode)(&raw)?;
        Ok(ProtocolEvent {
            raw: Arc::new(raw),
            payload,
        })
    }
}

impl fmt::Debug for EventDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDecoder")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// EventDecoders
// ============================================================================

/// Immutable `Domain.eventName` → decoder table.
#[derive(Debug, Clone, Default)]
pub struct EventDecoders {
    decoders: FxHashMap<String, EventDecoder>,
}

impl EventDecoders {
    /// Creates a registry builder.
    #[inline]
    #[must_use]
    pub fn builder() -> EventDecodersBuilder {
        EventDecodersBuilder::default()
    }

    /// Creates a registry that recognizes no event.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up the decoder for an exact event name.
    #[inline]
    #[must_use]
    pub fn get(&self, method: &str) -> Option<&EventDecoder> {
        self.decoders.get(method)
    }

    /// Returns `true` if the event name is known.
    #[inline]
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.decoders.contains_key(method)
    }

    /// Returns the number of known events.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if no event is known.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decodes a raw event via its registered decoder.
    ///
    /// # Errors
    ///
    /// - [`Error::UnrecognizedEvent`] if no decoder is registered
    /// - [`Error::EventDecode`] if the decoder fails
    pub fn decode(&self, raw: RawEvent) -> Result<ProtocolEvent> {
        match self.get(raw.method()) {
            Some(decoder) => decoder.decode(raw),
            None => Err(Error::unrecognized_event(raw.method())),
        }
    }
}

// ============================================================================
// EventDecodersBuilder
// ============================================================================

/// Builder for [`EventDecoders`].
#[derive(Debug, Default)]
pub struct EventDecodersBuilder {
    decoders: FxHashMap<String, EventDecoder>,
}

impl EventDecodersBuilder {
    /// Registers a serde decoder for `T` under `method`.
    #[inline]
    #[must_use]
    pub fn event<T>(self, method: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
    {
        self.decoder(method, EventDecoder::serde::<T>())
    }

    /// Registers an event whose payload is kept as a [`Value`].
    ///
    /// Used for events without a dedicated type.
    #[inline]
    #[must_use]
    pub fn raw(self, method: impl Into<String>) -> Self {
        self.event::<Value>(method)
    }

    /// Registers an explicit decoder.
    ///
    /// A later registration for the same name replaces the earlier one.
    #[inline]
    #[must_use]
    pub fn decoder(mut self, method: impl Into<String>, decoder: EventDecoder) -> Self {
        self.decoders.insert(method.into(), decoder);
        self
    }

    /// Freezes the registry.
    #[inline]
    #[must_use]
    pub fn build(self) -> EventDecoders {
        EventDecoders {
            decoders: self.decoders,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
