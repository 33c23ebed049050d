//! Command/reply correlation.
//!
//! Every outbound command gets a fresh id and a pending entry holding a
//! one-shot completion slot. The reader loop completes the entry when the
//! reply with that id arrives. Each entry is resolved at most once.
//!
//! # Shutdown
//!
//! [`Correlator::close`] marks the table closed and fails every entry in
//! the same critical section, so no registration can slip in afterwards
//! and wait forever.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::value::RawValue;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, RequestIdGenerator};
use crate::protocol::Reply;

// ============================================================================
// Types
// ============================================================================

/// Undecoded reply outcome.
pub(crate) type RawResult = Result<Option<Box<RawValue>>>;

/// Single-assignment completion slot.
type ReplySlot = oneshot::Sender<RawResult>;

/// One outstanding command.
struct PendingRequest {
    method: String,
    created_at: Instant,
    slot: ReplySlot,
}

#[derive(Default)]
struct PendingTable {
    closed: bool,
    entries: FxHashMap<RequestId, PendingRequest>,
}

// ============================================================================
// Correlator
// ============================================================================

/// Pending-request table of one connection.
pub(crate) struct Correlator {
    ids: RequestIdGenerator,
    pending: Mutex<PendingTable>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            ids: RequestIdGenerator::new(),
            pending: Mutex::new(PendingTable::default()),
        }
    }

    /// Allocates an id and registers its pending entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the table is closed.
    pub(crate) fn register(&self, method: &str) -> Result<PendingReply<'_>> {
        let (slot, rx) = oneshot::channel();

        let mut pending = self.pending.lock();
        if pending.closed {
            return Err(Error::ConnectionClosed);
        }

        let id = self.ids.next_id();
        pending.entries.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                created_at: Instant::now(),
                slot,
            },
        );

        Ok(PendingReply {
            id,
            rx,
            correlator: self,
            settled: false,
        })
    }

    /// Resolves the entry matching `reply.id`.
    ///
    /// Returns `false` for unknown, duplicate or late replies, which are
    /// logged and otherwise ignored.
    pub(crate) fn complete(&self, reply: Reply) -> bool {
        let id = reply.id;
        let Some(request) = self.pending.lock().entries.remove(&id) else {
            warn!(%id, "Reply for unknown or already completed request");
            return false;
        };

        trace!(
            %id,
            method = %request.method,
            elapsed_ms = request.created_at.elapsed().as_millis() as u64,
            error = reply.is_error(),
            "Reply received"
        );

        // Caller may have given up already
        let _ = request.slot.send(reply.into_result());
        true
    }

    /// Drops the entry for `id` without resolving it.
    pub(crate) fn cancel(&self, id: RequestId) -> bool {
        self.pending.lock().entries.remove(&id).is_some()
    }

    /// Closes the table and fails every entry with
    /// [`Error::ConnectionClosed`]. Returns how many were failed.
    pub(crate) fn close(&self) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            pending.entries.drain().map(|(_, request)| request).collect()
        };

        let count = drained.len();
        for request in drained {
            let _ = request.slot.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
        count
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }

    /// Returns the number of outstanding commands.
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().entries.len()
    }
}

// ============================================================================
// PendingReply
// ============================================================================

/// Caller side of one pending entry.
///
/// Dropping it before the reply arrives removes the entry.
pub(crate) struct PendingReply<'a> {
    id: RequestId,
    rx: oneshot::Receiver<RawResult>,
    correlator: &'a Correlator,
    settled: bool,
}

impl PendingReply<'_> {
    /// Returns the allocated id.
    pub(crate) fn id(&self) -> RequestId {
        self.id
    }

    /// Waits for the reply, up to `limit` if given.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the browser answered with an error
    /// - [`Error::ConnectionClosed`] if the session closed first
    /// - [`Error::RequestTimeout`] if `limit` elapsed
    pub(crate) async fn wait(mut self, limit: Option<Duration>) -> RawResult {
        let outcome = match limit {
            None => (&mut self.rx).await,
            Some(limit) => match timeout(limit, &mut self.rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!(id = %self.id, "Request timed out");
                    return Err(Error::request_timeout(self.id, limit.as_millis() as u64));
                }
            },
        };

        self.settled = true;
        outcome.unwrap_or(Err(Error::ConnectionClosed))
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if !self.settled && self.correlator.cancel(self.id) {
            trace!(id = %self.id, "Pending request abandoned");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
