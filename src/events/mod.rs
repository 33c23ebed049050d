//! Event decoding and fan-out.
//!
//! Events pushed by the browser are decoded once through the
//! [`EventDecoders`] registry supplied by the bindings layer, then
//! delivered to every matching subscription.
//!
//! # Subscription Kinds
//!
//! | Filter | Receives |
//! |--------|----------|
//! | `EventFilter::domain("Network").event("requestWillBeSent")` | one event type |
//! | `EventFilter::domain("Network")` | every event of a domain |
//! | `EventFilter::all()` | everything |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bus` | [`EventBus`], filters and session scopes |
//! | `registry` | Decoder table and [`ProtocolEvent`] |
//! | `stream` | Per-subscription queues and [`EventStream`] |

// ============================================================================
// Submodules
// ============================================================================

/// Event bus and subscription filters.
pub mod bus;

/// Decoder registry.
pub mod registry;

/// Subscription streams.
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{EventBus, EventFilter, SessionScope};
pub use registry::{EventDecoder, EventDecoders, EventDecodersBuilder, Payload, ProtocolEvent};
pub use stream::{EventStream, OverflowPolicy};
