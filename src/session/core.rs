//! Session façade.
//!
//! A [`Session`] glues the connection, the correlator, the event bus and
//! the domain resolver together. It is the surface the generated
//! per-domain bindings call into.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, trace, warn};

use crate::domain::{DomainEnabler, DomainResolver};
use crate::error::{Error, Result};
use crate::events::{EventBus, EventFilter, EventStream, ProtocolEvent, SessionScope};
use crate::identifiers::SessionId;
use crate::protocol::{Frame, Request};
use crate::transport::{Connection, EventLoop, FrameHandler};

use super::builder::SessionBuilder;
use super::correlator::{Correlator, RawResult};
use super::options::SessionOptions;
use super::state::ConnectionState;

// ============================================================================
// Types
// ============================================================================

/// Internal state shared by every handle of one connection.
pub(crate) struct SessionInner {
    /// Write side of the WebSocket.
    connection: Connection,
    /// Pending-request table.
    correlator: Correlator,
    /// Event fan-out.
    bus: Arc<EventBus>,
    /// Lifecycle state, observable by any handle.
    state: watch::Sender<ConnectionState>,
    /// Options the session was opened with.
    options: SessionOptions,
}

impl SessionInner {
    /// Moves `Connecting`/`Open` to `Closing`. Returns `false` if shutdown
    /// had already started.
    fn begin_closing(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_closing_or_closed() {
                return false;
            }
            *state = ConnectionState::Closing;
            true
        })
    }
}

impl FrameHandler for SessionInner {
    fn on_text(&self, text: &str) {
        match Frame::classify(text) {
            Ok(Frame::Reply(reply)) => {
                self.correlator.complete(reply);
            }
            Ok(Frame::Event(event)) => {
                if let Err(e) = self.bus.publish(event) {
                    warn!(error = %e, "Event not delivered");
                }
            }
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping inbound frame");
            }
        }
    }

    fn on_close(&self) {
        self.begin_closing();
        let failed = self.correlator.close();
        self.bus.close();
        self.state.send_replace(ConnectionState::Closed);
        info!(failed, "Session closed");
    }
}

// ============================================================================
// Session
// ============================================================================

/// A CDP session over one WebSocket.
///
/// Cheap to clone; clones share the connection, the pending table, the
/// event bus and the enabled-domain set. Handles returned by
/// [`attach`](Self::attach) share the connection but address a target
/// session and keep their own enabled-domain set.
///
/// # Example
///
/// ```no_run
/// # use cdp_session::Session;
/// # use serde_json::Value;
/// # async fn example() -> cdp_session::Result<()> {
/// let session = Session::builder()
///     .url("ws://127.0.0.1:9222/devtools/browser/abc")
///     .connect()
///     .await?;
///
/// session.ensure_enabled("Network").await?;
/// let version: Value = session.invoke("Browser", "getVersion", ()).await?;
///
/// session.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    /// Shared connection state.
    inner: Arc<SessionInner>,
    /// Target session this handle addresses; `None` for the browser.
    target: Option<SessionId>,
    /// Domains enabled through this handle.
    resolver: Arc<DomainResolver>,
}

// ============================================================================
// Session - Display
// ============================================================================

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Constructor
// ============================================================================

impl Session {
    /// Creates a session builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Opens a session over an already established WebSocket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `options` are invalid.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>, options: SessionOptions) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        options.validate().map_err(Error::config)?;
        let (connection, event_loop) = Connection::new(ws_stream);
        Ok(Self::start(connection, event_loop, options))
    }

    /// Starts the event loop and returns the root handle.
    pub(crate) fn start<S>(
        connection: Connection,
        event_loop: EventLoop<S>,
        options: SessionOptions,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let bus = EventBus::new(
            Arc::clone(&options.decoders),
            options.event_buffer,
            options.overflow,
        );
        let resolver = Arc::new(DomainResolver::new(Arc::clone(&options.domains)));

        let inner = Arc::new(SessionInner {
            connection,
            correlator: Correlator::new(),
            bus,
            state,
            options,
        });

        inner.state.send_replace(ConnectionState::Open);
        event_loop.spawn(Arc::downgrade(&inner));

        debug!(
            event_buffer = inner.options.event_buffer,
            overflow = ?inner.options.overflow,
            "Session opened"
        );

        Self {
            inner,
            target: None,
            resolver,
        }
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns `true` while commands are accepted.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Returns the target session this handle addresses.
    #[inline]
    #[must_use]
    pub fn target_session(&self) -> Option<&SessionId> {
        self.target.as_ref()
    }

    /// Returns the options the session was opened with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Returns the number of commands awaiting a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Returns the number of live subscriptions on the connection.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.subscriber_count()
    }

    /// Returns the domains enabled through this handle, sorted.
    #[inline]
    #[must_use]
    pub fn enabled_domains(&self) -> Vec<String> {
        self.resolver.enabled()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state().is_open() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }

    fn scope(&self) -> SessionScope {
        SessionScope::of(self.target.as_ref())
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Invokes `domain.method` and decodes the result into `T`.
    ///
    /// Pass `()` or `None::<T>` for a command without parameters. A reply
    /// without `result` decodes from `{}`.
    ///
    /// Uses the configured command timeout, if any.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the session is not open or closes
    ///   before the reply
    /// - [`Error::Protocol`] if the browser answered with an error
    /// - [`Error::Decode`] if the result does not fit `T`
    /// - [`Error::RequestTimeout`] if a command timeout is configured and
    ///   elapsed
    pub async fn invoke<T, P>(&self, domain: &str, method: &str, params: P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        self.invoke_with_decoder(domain, method, params, |text| serde_json::from_str::<T>(text))
            .await
    }

    /// Invokes `domain.method` and decodes the result with `decode`.
    ///
    /// `decode` receives the result JSON text, `{}` when absent.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke).
    pub async fn invoke_with_decoder<T, P, D>(
        &self,
        domain: &str,
        method: &str,
        params: P,
        decode: D,
    ) -> Result<T>
    where
        P: Serialize,
        D: FnOnce(&str) -> serde_json::Result<T>,
    {
        let limit = self.inner.options.command_timeout;
        let result = self.call(domain, method, &params, limit).await?;
        decode_result(domain, method, result.as_deref(), decode)
    }

    /// Invokes `domain.method` with an explicit reply timeout.
    ///
    /// On expiry the pending entry is dropped; a late reply is ignored.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke).
    pub async fn invoke_with_timeout<T, P>(
        &self,
        domain: &str,
        method: &str,
        params: P,
        timeout: Duration,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let result = self.call(domain, method, &params, Some(timeout)).await?;
        decode_result(domain, method, result.as_deref(), |text| {
            serde_json::from_str::<T>(text)
        })
    }

    /// Invokes `domain.method` and returns the result as untyped JSON.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke).
    pub async fn invoke_raw<P>(&self, domain: &str, method: &str, params: P) -> Result<Value>
    where
        P: Serialize,
    {
        self.invoke(domain, method, params).await
    }

    async fn call<P>(
        &self,
        domain: &str,
        method: &str,
        params: &P,
        limit: Option<Duration>,
    ) -> RawResult
    where
        P: Serialize + ?Sized,
    {
        self.ensure_open()?;

        let pending = self
            .inner
            .correlator
            .register(&format!("{domain}.{method}"))?;
        let request = Request::new(pending.id(), domain, method)
            .with_params(params)?
            .with_session(self.target.clone());
        let text = request.to_text()?;

        debug!(
            id = %request.id,
            method = %request.method,
            target = ?self.target,
            "Sending command"
        );
        self.inner.connection.send(text)?;

        pending.wait(limit).await
    }
}

fn decode_result<T, D>(
    domain: &str,
    method: &str,
    result: Option<&RawValue>,
    decode: D,
) -> Result<T>
where
    D: FnOnce(&str) -> serde_json::Result<T>,
{
    let text = result.map_or("{}", |raw| raw.get());
    decode(text).map_err(|e| Error::decode(format!("{domain}.{method}"), e))
}

// ============================================================================
// Session - Events
// ============================================================================

impl Session {
    /// Subscribes to typed events of `domain`, optionally one event name.
    ///
    /// Only events from this handle's target session are delivered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is not open.
    pub fn subscribe<T>(&self, domain: &str, event: Option<&str>) -> Result<EventStream<T>>
    where
        T: Any + Clone + Send + Sync,
    {
        self.subscribe_typed(self.typed_filter(domain, event))
    }

    /// Like [`subscribe`](Self::subscribe), keeping only events for which
    /// `predicate` returns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is not open.
    pub fn subscribe_filtered<T, F>(
        &self,
        domain: &str,
        event: Option<&str>,
        predicate: F,
    ) -> Result<EventStream<T>>
    where
        T: Any + Clone + Send + Sync,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.subscribe_typed(self.typed_filter(domain, event).typed_predicate(predicate))
    }

    /// Subscribes to every event of `domain` from this handle's target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is not open.
    pub fn events(&self, domain: &str) -> Result<EventStream<ProtocolEvent>> {
        self.subscribe_with(EventFilter::domain(domain).scope(self.scope()))
    }

    /// Subscribes to every event on the connection, from every target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is not open.
    pub fn all_events(&self) -> Result<EventStream<ProtocolEvent>> {
        self.subscribe_with(EventFilter::all())
    }

    /// Subscribes with an explicit filter. The filter's scope is used as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is not open.
    pub fn subscribe_with(&self, filter: EventFilter) -> Result<EventStream<ProtocolEvent>> {
        self.ensure_open()?;
        self.inner.bus.subscribe(filter)
    }

    fn subscribe_typed<T>(&self, filter: EventFilter) -> Result<EventStream<T>>
    where
        T: Any + Clone + Send + Sync,
    {
        self.ensure_open()?;
        self.inner.bus.subscribe_typed(filter)
    }

    fn typed_filter(&self, domain: &str, event: Option<&str>) -> EventFilter {
        let filter = EventFilter::domain(domain).scope(self.scope());
        match event {
            Some(event) => filter.event(event),
            None => filter,
        }
    }
}

// ============================================================================
// Session - Domains
// ============================================================================

#[async_trait]
impl DomainEnabler for Session {
    async fn enable(&self, domain: &str) -> Result<()> {
        self.invoke_raw(domain, "enable", ()).await.map(drop)
    }
}

impl Session {
    /// Enables `domain` after every domain it depends on.
    ///
    /// Each enable command is sent at most once per handle, also under
    /// concurrent calls. A domain answering "method not found" counts as
    /// enabled.
    ///
    /// # Errors
    ///
    /// - [`Error::DependencyCycle`] if the dependency table has a cycle;
    ///   nothing is sent
    /// - the first enable command failure
    pub async fn ensure_enabled(&self, domain: &str) -> Result<()> {
        self.resolver.ensure_enabled(self, domain).await
    }

    /// Enables only the prerequisites of `domain`, leaving the domain's own
    /// enable command to the caller.
    ///
    /// # Errors
    ///
    /// Same as [`ensure_enabled`](Self::ensure_enabled).
    pub async fn ensure_dependencies(&self, domain: &str) -> Result<()> {
        self.resolver.ensure_dependencies(self, domain).await
    }
}

// ============================================================================
// Session - Targets
// ============================================================================

/// Reply of `Target.attachToTarget`.
#[derive(Deserialize)]
struct AttachedToTarget {
    #[serde(rename = "sessionId")]
    session_id: SessionId,
}

impl Session {
    /// Returns a handle addressing the flattened target session
    /// `session_id` over the same connection.
    ///
    /// The handle stamps `sessionId` on its commands, sees only events of
    /// that target, and starts with no domains enabled.
    #[must_use]
    pub fn attach(&self, session_id: impl Into<SessionId>) -> Self {
        let session_id = session_id.into();
        trace!(target_session = %session_id, "Attached handle created");
        Self {
            inner: Arc::clone(&self.inner),
            target: Some(session_id),
            resolver: Arc::new(DomainResolver::new(Arc::clone(&self.inner.options.domains))),
        }
    }

    /// Attaches to `target_id` with `Target.attachToTarget` in flatten mode
    /// and returns a handle for the new target session.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke).
    pub async fn attach_to_target(&self, target_id: &str) -> Result<Self> {
        let attached: AttachedToTarget = self
            .invoke(
                "Target",
                "attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        debug!(target_id, session_id = %attached.session_id, "Attached to target");
        Ok(self.attach(attached.session_id))
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Closes the connection and waits until the session is `Closed`.
    ///
    /// Pending commands fail with [`Error::ConnectionClosed`] and every
    /// subscription ends. Idempotent; closes the connection shared by all
    /// attached handles.
    pub async fn close(&self) {
        if self.inner.begin_closing() {
            debug!("Closing session");
            self.inner.connection.shutdown();
        }
        self.closed().await;
    }

    /// Waits until the session reaches `Closed`, whatever the cause.
    pub async fn closed(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|state| *state == ConnectionState::Closed).await;
    }
}
