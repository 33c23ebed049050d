//! Error types for the CDP session layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cdp_session::{Result, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     session.ensure_enabled("Network").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`], [`Error::DependencyCycle`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Command | [`Error::Protocol`], [`Error::Decode`], [`Error::RequestTimeout`], [`Error::MalformedFrame`] |
//! | Event | [`Error::UnrecognizedEvent`], [`Error::EventDecode`] |
//! | Discovery | [`Error::Discovery`], [`Error::Http`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! # Propagation
//!
//! Transport faults take the whole session down. Command and event faults
//! stay local to the one call or the one frame they concern.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// JSON-RPC code the browser uses for unknown methods.
pub const METHOD_NOT_FOUND: i64 = -32601;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint could not be parsed as a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The static domain dependency table contains a cycle.
    ///
    /// This is a defect in the table, not a runtime fault.
    #[error("Domain dependency cycle: {}", .path.join(" -> "))]
    DependencyCycle {
        /// Resolution chain, ending with the domain that re-appeared.
        path: Vec<String>,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the handshake cannot be completed or the socket breaks.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Handshake did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Session is closing or closed.
    ///
    /// Returned to commands pending at shutdown and to any command or
    /// subscription attempted afterwards.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// The browser answered a command with an error.
    ///
    /// Local to the one command; the session is unaffected.
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the browser.
        message: String,
        /// Optional extra detail.
        data: Option<String>,
    },

    /// Command result did not match the expected shape.
    #[error("Failed to decode result of {method}: {source}")]
    Decode {
        /// Fully qualified method name.
        method: String,
        /// Underlying decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// Inbound frame matched neither the reply nor the event envelope.
    ///
    /// Logged and dropped by the reader loop; never fatal. A reply whose
    /// `error` member cannot be decoded still reaches its caller as this
    /// error.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Why the frame was rejected.
        message: String,
    },

    /// Command reply did not arrive in time.
    ///
    /// Only produced by the caller-side timeout layer.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Event Errors
    // ========================================================================
    /// No decoder is registered for an inbound event.
    #[error("Unrecognized event: {method}")]
    UnrecognizedEvent {
        /// The `Domain.event` name.
        method: String,
    },

    /// Registered decoder rejected an event payload.
    #[error("Failed to decode event {method}: {source}")]
    EventDecode {
        /// The `Domain.event` name.
        method: String,
        /// Underlying decoder error.
        #[source]
        source: serde_json::Error,
    },

    // ========================================================================
    // Discovery Errors
    // ========================================================================
    /// Browser endpoint discovery failed.
    #[error("Discovery failed: {message}")]
    Discovery {
        /// Description of the failure.
        message: String,
    },

    /// HTTP error during discovery.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(code: i64, message: impl Into<String>, data: Option<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates a result decode error.
    #[inline]
    pub fn decode(method: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            method: method.into(),
            source,
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates an unrecognized event error.
    #[inline]
    pub fn unrecognized_event(method: impl Into<String>) -> Self {
        Self::UnrecognizedEvent {
            method: method.into(),
        }
    }

    /// Creates an event decode error.
    #[inline]
    pub fn event_decode(method: impl Into<String>, source: serde_json::Error) -> Self {
        Self::EventDecode {
            method: method.into(),
            source,
        }
    }

    /// Creates a dependency cycle error.
    #[inline]
    pub fn dependency_cycle(path: Vec<String>) -> Self {
        Self::DependencyCycle { path }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the browser rejected a command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if the browser does not know the invoked method.
    #[inline]
    #[must_use]
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Protocol { code, .. } if *code == METHOD_NOT_FOUND)
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry over the same session.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::Protocol { .. } | Self::Decode { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
