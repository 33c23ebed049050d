//! Event fan-out.
//!
//! The reader loop hands every event frame to [`EventBus::publish`]. The
//! event is decoded once and a shared copy is pushed into the queue of
//! each matching subscription. Pushing never waits, so a slow subscriber
//! cannot stall the reader loop or any other subscriber.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, SubscriptionId};
use crate::protocol::RawEvent;

use super::registry::{EventDecoders, ProtocolEvent};
use super::stream::{Delivery, EventSink, EventStream, Extract, OverflowPolicy};

// ============================================================================
// Types
// ============================================================================

/// Predicate over a decoded event.
type Predicate = Box<dyn Fn(&ProtocolEvent) -> bool + Send + Sync>;

// ============================================================================
// SessionScope
// ============================================================================

/// Which target sessions a subscription listens to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionScope {
    /// Events from every session.
    #[default]
    Any,

    /// Only events without a `sessionId`.
    Root,

    /// Only events carrying this `sessionId`.
    Target(SessionId),
}

impl SessionScope {
    /// Scope for a session handle: its target, or the root connection.
    #[inline]
    #[must_use]
    pub fn of(session_id: Option<&SessionId>) -> Self {
        session_id.map_or(Self::Root, |id| Self::Target(id.clone()))
    }

    /// Returns `true` if an event from `session_id` is in scope.
    #[inline]
    #[must_use]
    pub fn contains(&self, session_id: Option<&SessionId>) -> bool {
        match self {
            Self::Any => true,
            Self::Root => session_id.is_none(),
            Self::Target(target) => session_id == Some(target),
        }
    }
}

// ============================================================================
// EventFilter
// ============================================================================

/// Selects the events a subscription receives.
///
/// An empty filter matches everything. Set fields must all match.
#[derive(Default)]
pub struct EventFilter {
    domain: Option<String>,
    event: Option<String>,
    scope: SessionScope,
    predicate: Option<Predicate>,
}

impl EventFilter {
    /// Matches every event.
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches every event of `domain`.
    #[inline]
    #[must_use]
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }

    /// Restricts to one event name within the domain.
    #[inline]
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Restricts to a session scope.
    #[inline]
    #[must_use]
    pub fn scope(mut self, scope: SessionScope) -> Self {
        self.scope = scope;
        self
    }

    /// Adds a predicate over the decoded event.
    #[inline]
    #[must_use]
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ProtocolEvent) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Adds a predicate over the typed payload.
    ///
    /// Events whose payload is not a `T` never match.
    #[inline]
    #[must_use]
    pub fn typed_predicate<T, F>(self, predicate: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate(move |event| event.payload::<T>().is_some_and(&predicate))
    }

    /// Returns `true` if `event` passes every set field.
    #[must_use]
    pub fn matches(&self, event: &ProtocolEvent) -> bool {
        self.domain.as_deref().is_none_or(|d| d == event.domain())
            && self.event.as_deref().is_none_or(|e| e == event.event_name())
            && self.scope.contains(event.session_id())
            && self.predicate.as_ref().is_none_or(|p| p(event))
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("domain", &self.domain)
            .field("event", &self.event)
            .field("scope", &self.scope)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

struct Subscriber {
    filter: EventFilter,
    sink: EventSink,
}

#[derive(Default)]
struct Subscribers {
    closed: bool,
    entries: FxHashMap<SubscriptionId, Subscriber>,
}

// ============================================================================
// EventBus
// ============================================================================

/// Decodes events and fans them out to subscriptions.
///
/// # Thread Safety
///
/// The registry lock is held only while pushing into non-blocking queues,
/// never across an `.await`.
pub struct EventBus {
    decoders: Arc<EventDecoders>,
    capacity: usize,
    policy: OverflowPolicy,
    subscribers: RwLock<Subscribers>,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    /// Creates a bus whose subscriptions buffer `capacity` events each.
    #[must_use]
    pub fn new(decoders: Arc<EventDecoders>, capacity: usize, policy: OverflowPolicy) -> Arc<Self> {
        Arc::new(Self {
            decoders,
            capacity: capacity.max(1),
            policy,
            subscribers: RwLock::new(Subscribers::default()),
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
        })
    }

    /// Returns the decoder registry.
    #[inline]
    #[must_use]
    pub fn decoders(&self) -> &EventDecoders {
        &self.decoders
    }

    /// Registers a subscription delivering every matching [`ProtocolEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the bus is closed.
    pub fn subscribe(self: &Arc<Self>, filter: EventFilter) -> Result<EventStream<ProtocolEvent>> {
        self.subscribe_with(filter, Some)
    }

    /// Registers a subscription delivering the typed payload of matching
    /// events. Events of another payload type are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the bus is closed.
    pub fn subscribe_typed<T>(self: &Arc<Self>, filter: EventFilter) -> Result<EventStream<T>>
    where
        T: Any + Clone + Send + Sync,
    {
        self.subscribe_with(filter, ProtocolEvent::into_payload::<T>)
    }

    fn subscribe_with<T>(
        self: &Arc<Self>,
        filter: EventFilter,
        extract: Extract<T>,
    ) -> Result<EventStream<T>> {
        let (sink, receiver) = EventSink::channel(self.capacity, self.policy);
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        {
            let mut subscribers = self.subscribers.write();
            if subscribers.closed {
                return Err(Error::ConnectionClosed);
            }
            debug!(subscription = %id, ?filter, "Subscription added");
            subscribers.entries.insert(id, Subscriber { filter, sink });
        }

        Ok(EventStream::new(id, receiver, Arc::downgrade(self), extract))
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write().entries.remove(&id).is_some();
        if removed {
            debug!(subscription = %id, "Subscription removed");
        }
        removed
    }

    /// Decodes `raw` and delivers it to every matching subscription.
    ///
    /// Returns the number of subscriptions the event was queued for.
    ///
    /// # Errors
    ///
    /// - [`Error::UnrecognizedEvent`] if no decoder is registered
    /// - [`Error::EventDecode`] if the decoder rejects the payload
    pub fn publish(&self, raw: RawEvent) -> Result<usize> {
        let event = self.decoders.decode(raw)?;

        let mut queued = 0;
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in &subscribers.entries {
                if !subscriber.filter.matches(&event) {
                    continue;
                }
                match subscriber.sink.deliver(event.clone()) {
                    Delivery::Queued => queued += 1,
                    Delivery::Dropped => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            subscription = %id,
                            method = event.method(),
                            "Subscriber queue full, event dropped"
                        );
                    }
                    Delivery::Disconnected => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &dead {
                subscribers.entries.remove(id);
            }
            debug!(pruned = dead.len(), "Pruned dropped subscriptions");
        }

        trace!(method = event.method(), queued, "Event published");
        Ok(queued)
    }

    /// Closes every subscription and rejects new ones.
    ///
    /// Streams drain what is already queued, then yield `None`.
    pub fn close(&self) {
        let mut subscribers = self.subscribers.write();
        if subscribers.closed {
            return;
        }
        subscribers.closed = true;
        let count = subscribers.entries.len();
        subscribers.entries.clear();
        debug!(count, "Event bus closed");
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscribers.read().closed
    }

    /// Returns the number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().entries.len()
    }

    /// Returns how many events were discarded by full
    /// [`OverflowPolicy::DropNewest`] queues.
    #[inline]
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct RequestWillBeSent {
        #[serde(rename = "requestId")]
        request_id: String,
    }

    fn bus(capacity: usize, policy: OverflowPolicy) -> Arc<EventBus> {
        let decoders = EventDecoders::builder()
            .event::<RequestWillBeSent>("Network.requestWillBeSent")
            .raw("Network.loadingFinished")
            .raw("Page.loadEventFired")
            .build();
        EventBus::new(Arc::new(decoders), capacity, policy)
    }

    fn request(id: &str) -> RawEvent {
        RawEvent::from_value("Network.requestWillBeSent", &json!({ "requestId": id }))
            .expect("raw")
    }

    fn page_load() -> RawEvent {
        RawEvent::from_value("Page.loadEventFired", &json!({ "timestamp": 1.0 })).expect("raw")
    }

    #[tokio::test]
    async fn test_fan_out_to_matching_domain_only() {
        let bus = bus(8, OverflowPolicy::DropOldest);
        let mut network_a = bus.subscribe(EventFilter::domain("Network")).expect("subscribe");
        let mut network_b = bus.subscribe(EventFilter::domain("Network")).expect("subscribe");
        let mut page = bus.subscribe(EventFilter::domain("Page")).expect("subscribe");

        assert_eq!(bus.publish(request("r1")).expect("publish"), 2);

        let first = network_a.recv().await.expect("event");
        assert_eq!(first.method(), "Network.requestWillBeSent");
        assert!(network_b.try_recv().is_some());
        assert!(page.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_event_name_and_typed_predicate() {
        let bus = bus(8, OverflowPolicy::DropOldest);
        let mut only_r2 = bus
            .subscribe_typed::<RequestWillBeSent>(
                EventFilter::domain("Network")
                    .event("requestWillBeSent")
                    .typed_predicate(|e: &RequestWillBeSent| e.request_id == "r2"),
            )
            .expect("subscribe");

        bus.publish(request("r1")).expect("publish");
        bus.publish(request("r2")).expect("publish");
        bus.publish(RawEvent::from_value("Network.loadingFinished", &json!({})).expect("raw"))
            .expect("publish");

        assert_eq!(
            only_r2.try_recv(),
            Some(RequestWillBeSent {
                request_id: "r2".into()
            })
        );
        assert_eq!(only_r2.try_recv(), None);
    }

    #[tokio::test]
    async fn test_session_scope() {
        let bus = bus(8, OverflowPolicy::DropOldest);
        let mut root = bus
            .subscribe(EventFilter::domain("Page").scope(SessionScope::Root))
            .expect("subscribe");
        let mut target = bus
            .subscribe(EventFilter::domain("Page").scope(SessionScope::Target("S1".into())))
            .expect("subscribe");
        let mut any = bus.subscribe(EventFilter::all()).expect("subscribe");

        bus.publish(page_load().with_session(Some("S1".into()))).expect("publish");

        assert!(root.try_recv().is_none());
        assert_eq!(
            target.try_recv().and_then(|e| e.session_id().cloned()),
            Some(SessionId::from("S1"))
        );
        assert!(any.try_recv().is_some());
    }

    #[test]
    fn test_unrecognized_event_is_not_delivered() {
        let bus = bus(8, OverflowPolicy::DropOldest);
        let mut all = bus.subscribe(EventFilter::all()).expect("subscribe");

        let raw = RawEvent::from_value("Custom.unknown", &json!({})).expect("raw");
        assert!(matches!(bus.publish(raw), Err(Error::UnrecognizedEvent { .. })));
        assert!(all.try_recv().is_none());
    }

    #[test]
    fn test_dropped_stream_is_pruned() {
        let bus = bus(8, OverflowPolicy::DropNewest);
        let stream = bus.subscribe(EventFilter::all()).expect("subscribe");
        assert_eq!(bus.subscriber_count(), 1);

        drop(stream);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(page_load()).expect("publish"), 0);
    }

    #[test]
    fn test_drop_newest_counts_discarded() {
        let bus = bus(1, OverflowPolicy::DropNewest);
        let mut slow = bus.subscribe(EventFilter::domain("Page")).expect("subscribe");
        let mut fast = bus.subscribe(EventFilter::domain("Page")).expect("subscribe");

        bus.publish(page_load()).expect("publish");
        assert!(fast.try_recv().is_some());
        bus.publish(page_load()).expect("publish");

        assert_eq!(bus.dropped_count(), 1);
        assert!(slow.try_recv().is_some());
        assert!(slow.try_recv().is_none());
        assert!(fast.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_rejects_new() {
        let bus = bus(8, OverflowPolicy::DropOldest);
        let mut stream = bus.subscribe(EventFilter::all()).expect("subscribe");
        bus.publish(page_load()).expect("publish");

        bus.close();
        assert!(bus.is_closed());

        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_none());
        assert!(matches!(
            bus.subscribe(EventFilter::all()),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_filter_debug_hides_predicate() {
        let filter = EventFilter::domain("Network").predicate(|_| true);
        let text = format!("{filter:?}");
        assert!(text.contains("Network"));
        assert!(text.contains("predicate: true"));
    }
}
