//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and opening [`Session`]s.
//!
//! # Example
//!
//! ```no_run
//! use cdp_session::Session;
//!
//! # async fn example() -> cdp_session::Result<()> {
//! // Direct WebSocket endpoint
//! let session = Session::builder()
//!     .url("ws://127.0.0.1:9222/devtools/browser/abc")
//!     .connect()
//!     .await?;
//!
//! // Or ask the browser's HTTP endpoint for it
//! let session = Session::builder()
//!     .discover("127.0.0.1:9222")
//!     .event_buffer(512)
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::discovery::BrowserInfo;
use crate::domain::DomainGraph;
use crate::error::{Error, Result};
use crate::events::{EventDecoders, OverflowPolicy};
use crate::transport;

use super::core::Session;
use super::options::SessionOptions;

// ============================================================================
// Endpoint
// ============================================================================

/// Where the builder connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    /// WebSocket URL given directly.
    Url(String),
    /// `host:port` of the browser's HTTP endpoint.
    Discover(String),
}

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for opening a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SessionBuilder {
    /// Connection target.
    endpoint: Option<Endpoint>,
    /// Session tuning.
    options: SessionOptions,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default options and no endpoint.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to a WebSocket debugger URL.
    ///
    /// # Arguments
    ///
    /// * `url` - e.g. `ws://127.0.0.1:9222/devtools/browser/<id>`
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(Endpoint::Url(url.into()));
        self
    }

    /// Discovers the browser WebSocket URL from `http://<address>/json/version`.
    ///
    /// # Arguments
    ///
    /// * `address` - `host:port` of the remote debugging endpoint
    #[inline]
    #[must_use]
    pub fn discover(mut self, address: impl Into<String>) -> Self {
        self.endpoint = Some(Endpoint::Discover(address.into()));
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the per-subscription queue capacity.
    #[inline]
    #[must_use]
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.options.event_buffer = capacity;
        self
    }

    /// Sets the subscription overflow policy.
    #[inline]
    #[must_use]
    pub fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.options.overflow = overflow;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.options.handshake_timeout = timeout;
        self
    }

    /// Sets a default reply timeout for every command.
    #[inline]
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.options.command_timeout = Some(timeout);
        self
    }

    /// Sets the event decoder registry.
    #[inline]
    #[must_use]
    pub fn decoders(mut self, decoders: impl Into<Arc<EventDecoders>>) -> Self {
        self.options.decoders = decoders.into();
        self
    }

    /// Sets the domain dependency table.
    #[inline]
    #[must_use]
    pub fn domains(mut self, domains: impl Into<Arc<DomainGraph>>) -> Self {
        self.options.domains = domains.into();
        self
    }

    /// Validates the configuration, connects and starts the session.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no endpoint is set or an option is invalid
    /// - [`Error::InvalidUrl`] if the URL does not parse
    /// - [`Error::Discovery`] / [`Error::Http`] if discovery fails
    /// - [`Error::Connection`] / [`Error::ConnectionTimeout`] if the
    ///   handshake fails
    pub async fn connect(self) -> Result<Session> {
        self.options.validate().map_err(Error::config)?;

        let url = match self.validate_endpoint()? {
            Endpoint::Url(url) => parse_ws_url(&url)?,
            Endpoint::Discover(address) => {
                let info = BrowserInfo::fetch(&address).await?;
                info!(browser = %info.browser, protocol = %info.protocol_version, "Browser discovered");
                parse_ws_url(&info.web_socket_debugger_url)?
            }
        };

        let (connection, event_loop) =
            transport::connect(&url, self.options.handshake_timeout).await?;
        info!(%url, "Connected to browser");

        Ok(Session::start(connection, event_loop, self.options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Validates the endpoint configuration.
    fn validate_endpoint(&self) -> Result<Endpoint> {
        self.endpoint.clone().ok_or_else(|| {
            Error::config(
                "Endpoint is required. Use .url() or .discover() to set it.\n\
                 Example: Session::builder().discover(\"127.0.0.1:9222\")",
            )
        })
    }
}

/// Parses a WebSocket URL, rejecting non-WebSocket schemes.
fn parse_ws_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(Error::config(format!(
            "Unsupported URL scheme {scheme:?} in {raw}; expected ws or wss"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
