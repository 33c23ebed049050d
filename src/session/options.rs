//! Session tuning options.
//!
//! Plain data with `with_*` builder methods. Defaults suit a local
//! browser; every field can be overridden before connecting.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cdp_session::{OverflowPolicy, SessionOptions};
//!
//! let options = SessionOptions::new()
//!     .with_event_buffer(512)
//!     .with_overflow(OverflowPolicy::DropNewest)
//!     .with_command_timeout(Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::domain::DomainGraph;
use crate::events::{EventDecoders, OverflowPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Default per-subscription queue capacity.
pub const DEFAULT_EVENT_BUFFER: usize = 128;

/// Largest accepted per-subscription queue capacity.
///
/// `DropOldest` queues allocate every slot when the subscription is made.
pub const MAX_EVENT_BUFFER: usize = 1 << 16;

/// Default WebSocket handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SessionOptions
// ============================================================================

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Events buffered per subscription before the overflow policy applies.
    ///
    /// Under [`OverflowPolicy::DropOldest`] the capacity is rounded up to
    /// a power of two.
    pub event_buffer: usize,

    /// What a full subscription queue does.
    pub overflow: OverflowPolicy,

    /// Maximum time for the WebSocket handshake.
    pub handshake_timeout: Duration,

    /// Default reply timeout for commands. `None` waits until the session
    /// closes.
    pub command_timeout: Option<Duration>,

    /// Event decoders supplied by the bindings layer.
    pub decoders: Arc<EventDecoders>,

    /// Domain dependency table.
    ///
    /// Not checked for cycles here; `ensure_enabled` reports a cycle when it
    /// meets one. Call [`DomainGraph::validate`] to check up front.
    pub domains: Arc<DomainGraph>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
            overflow: OverflowPolicy::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            command_timeout: None,
            decoders: Arc::new(EventDecoders::empty()),
            domains: Arc::new(DomainGraph::devtools()),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-subscription queue capacity.
    #[inline]
    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Sets the overflow policy.
    #[inline]
    #[must_use]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets a default reply timeout for every command.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Sets the event decoder registry.
    #[inline]
    #[must_use]
    pub fn with_decoders(mut self, decoders: impl Into<Arc<EventDecoders>>) -> Self {
        self.decoders = decoders.into();
        self
    }

    /// Sets the domain dependency table.
    #[inline]
    #[must_use]
    pub fn with_domains(mut self, domains: impl Into<Arc<DomainGraph>>) -> Self {
        self.domains = domains.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if a value is out of range.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_buffer == 0 {
            return Err("Event buffer must hold at least one event".to_string());
        }
        if self.event_buffer > MAX_EVENT_BUFFER {
            return Err(format!(
                "Event buffer of {} exceeds the maximum of {MAX_EVENT_BUFFER}",
                self.event_buffer
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err("Handshake timeout must be greater than zero".to_string());
        }
        if self.command_timeout.is_some_and(|t| t.is_zero()) {
            return Err("Command timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
