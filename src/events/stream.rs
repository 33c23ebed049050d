//! Per-subscription delivery queues and the subscriber-side stream.
//!
//! Every subscription owns one bounded queue. The reader loop pushes into
//! it without waiting; what happens on a full queue is decided by
//! [`OverflowPolicy`].
//!
//! | Policy | Queue | On overflow |
//! |--------|-------|-------------|
//! | [`OverflowPolicy::DropOldest`] | `broadcast` ring | oldest entries are overwritten, the stream reports the gap |
//! | [`OverflowPolicy::DropNewest`] | `mpsc` | the incoming event is discarded |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Weak;

use futures_util::Stream;
use futures_util::stream;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::identifiers::SubscriptionId;

use super::bus::EventBus;
use super::registry::ProtocolEvent;

// ============================================================================
// OverflowPolicy
// ============================================================================

/// What a full subscription queue does with new events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Overwrite the oldest buffered event; the stream counts the gap.
    #[default]
    DropOldest,

    /// Discard the incoming event.
    DropNewest,
}

// ============================================================================
// EventSink
// ============================================================================

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Event was queued.
    Queued,

    /// Queue was full and the event was discarded.
    Dropped,

    /// The stream side is gone.
    Disconnected,
}

/// Producer half of a subscription queue.
pub(crate) enum EventSink {
    Ring(broadcast::Sender<ProtocolEvent>),
    Queue(mpsc::Sender<ProtocolEvent>),
}

impl EventSink {
    /// Creates a queue of `capacity` entries for `policy`.
    pub(crate) fn channel(capacity: usize, policy: OverflowPolicy) -> (Self, EventReceiver) {
        let capacity = capacity.max(1);
        match policy {
            OverflowPolicy::DropOldest => {
                let (tx, rx) = broadcast::channel(capacity);
                (Self::Ring(tx), EventReceiver::Ring(rx))
            }
            OverflowPolicy::DropNewest => {
                let (tx, rx) = mpsc::channel(capacity);
                (Self::Queue(tx), EventReceiver::Queue(rx))
            }
        }
    }

    /// Pushes an event without waiting.
    pub(crate) fn deliver(&self, event: ProtocolEvent) -> Delivery {
        match self {
            Self::Ring(tx) => match tx.send(event) {
                Ok(_) => Delivery::Queued,
                Err(_) => Delivery::Disconnected,
            },
            Self::Queue(tx) => match tx.try_send(event) {
                Ok(()) => Delivery::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Disconnected,
            },
        }
    }
}

// ============================================================================
// EventReceiver
// ============================================================================

/// Consumer half of a subscription queue.
pub(crate) enum EventReceiver {
    Ring(broadcast::Receiver<ProtocolEvent>),
    Queue(mpsc::Receiver<ProtocolEvent>),
}

/// One receive step: an event, a gap of `n` overwritten events, or the end.
enum Received {
    Event(ProtocolEvent),
    Lagged(u64),
    Closed,
    Empty,
}

impl EventReceiver {
    async fn recv(&mut self) -> Received {
        match self {
            Self::Ring(rx) => match rx.recv().await {
                Ok(event) => Received::Event(event),
                Err(broadcast::error::RecvError::Lagged(n)) => Received::Lagged(n),
                Err(broadcast::error::RecvError::Closed) => Received::Closed,
            },
            Self::Queue(rx) => match rx.recv().await {
                Some(event) => Received::Event(event),
                None => Received::Closed,
            },
        }
    }

    fn try_recv(&mut self) -> Received {
        match self {
            Self::Ring(rx) => match rx.try_recv() {
                Ok(event) => Received::Event(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => Received::Lagged(n),
                Err(broadcast::error::TryRecvError::Closed) => Received::Closed,
                Err(broadcast::error::TryRecvError::Empty) => Received::Empty,
            },
            Self::Queue(rx) => match rx.try_recv() {
                Ok(event) => Received::Event(event),
                Err(mpsc::error::TryRecvError::Disconnected) => Received::Closed,
                Err(mpsc::error::TryRecvError::Empty) => Received::Empty,
            },
        }
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Maps a delivered event to the value the subscriber asked for.
pub(crate) type Extract<T> = fn(ProtocolEvent) -> Option<T>;

/// Receiving end of one subscription.
///
/// Yields `None` once the subscription is cancelled or the session closes.
/// Dropping the stream cancels the subscription.
///
/// # Example
///
/// ```ignore
/// let mut requests = session
///     .subscribe::<RequestWillBeSent>("Network", Some("requestWillBeSent"))?;
///
/// while let Some(request) = requests.recv().await {
///     println!("{}", request.request_id);
/// }
/// ```
pub struct EventStream<T> {
    id: SubscriptionId,
    receiver: EventReceiver,
    bus: Weak<EventBus>,
    extract: Extract<T>,
    missed: u64,
}

impl<T> EventStream<T> {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: EventReceiver,
        bus: Weak<EventBus>,
        extract: Extract<T>,
    ) -> Self {
        Self {
            id,
            receiver,
            bus,
            extract,
            missed: 0,
        }
    }

    /// Returns the subscription id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns how many events were overwritten before this stream read them.
    ///
    /// Always zero under [`OverflowPolicy::DropNewest`]; discarded events
    /// are counted on the bus instead.
    #[inline]
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the subscription has ended and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Received::Event(event) => {
                    if let Some(value) = (self.extract)(event) {
                        return Some(value);
                    }
                }
                Received::Lagged(n) => self.record_gap(n),
                Received::Closed | Received::Empty => return None,
            }
        }
    }

    /// Takes the next buffered event without waiting.
    ///
    /// Returns `None` if nothing is buffered or the subscription ended.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Received::Event(event) => {
                    if let Some(value) = (self.extract)(event) {
                        return Some(value);
                    }
                }
                Received::Lagged(n) => self.record_gap(n),
                Received::Closed | Received::Empty => return None,
            }
        }
    }

    /// Ends the subscription.
    ///
    /// Equivalent to dropping the stream.
    #[inline]
    pub fn cancel(self) {
        drop(self);
    }

    fn record_gap(&mut self, n: u64) {
        self.missed += n;
        debug!(subscription = %self.id, skipped = n, "Subscriber lagged, oldest events dropped");
    }
}

impl<T: Send + 'static> EventStream<T> {
    /// Converts into a [`Stream`] for use with stream combinators.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + Unpin {
        Box::pin(stream::unfold(self, |mut events| async move {
            let item = events.recv().await?;
            Some((item, events))
        }))
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.id)
            .field("missed", &self.missed)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    use crate::events::registry::EventDecoders;
    use crate::protocol::RawEvent;

    fn event(n: u64) -> ProtocolEvent {
        EventDecoders::builder()
            .raw("Log.entryAdded")
            .build()
            .decode(RawEvent::from_value("Log.entryAdded", &json!({ "n": n })).expect("raw"))
            .expect("decode")
    }

    fn n_of(event: ProtocolEvent) -> Option<u64> {
        event.payload::<Value>()?.get("n")?.as_u64()
    }

    #[tokio::test]
    async fn test_drop_oldest_reports_gap() {
        let (sink, receiver) = EventSink::channel(2, OverflowPolicy::DropOldest);
        let mut stream = EventStream::new(SubscriptionId::new(1), receiver, Weak::new(), n_of);

        for n in 0..5 {
            assert_eq!(sink.deliver(event(n)), Delivery::Queued);
        }

        assert_eq!(stream.recv().await, Some(3));
        assert_eq!(stream.missed(), 3);
        assert_eq!(stream.recv().await, Some(4));

        drop(sink);
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_drop_newest_discards_incoming() {
        let (sink, receiver) = EventSink::channel(2, OverflowPolicy::DropNewest);
        let mut stream = EventStream::new(SubscriptionId::new(2), receiver, Weak::new(), n_of);

        assert_eq!(sink.deliver(event(0)), Delivery::Queued);
        assert_eq!(sink.deliver(event(1)), Delivery::Queued);
        assert_eq!(sink.deliver(event(2)), Delivery::Dropped);

        assert_eq!(stream.try_recv(), Some(0));
        assert_eq!(stream.try_recv(), Some(1));
        assert_eq!(stream.try_recv(), None);
        assert_eq!(stream.missed(), 0);
    }

    #[test]
    fn test_dropped_stream_disconnects_sink() {
        for policy in [OverflowPolicy::DropOldest, OverflowPolicy::DropNewest] {
            let (sink, receiver) = EventSink::channel(4, policy);
            let stream: EventStream<u64> =
                EventStream::new(SubscriptionId::new(3), receiver, Weak::new(), n_of);
            stream.cancel();
            assert_eq!(sink.deliver(event(0)), Delivery::Disconnected);
        }
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (sink, _receiver) = EventSink::channel(0, OverflowPolicy::DropNewest);
        assert_eq!(sink.deliver(event(0)), Delivery::Queued);
        assert_eq!(sink.deliver(event(1)), Delivery::Dropped);
    }
}
