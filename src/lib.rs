//! CDP Session - Chrome DevTools Protocol client session layer.
//!
//! This library drives a browser (or any process speaking the Chrome
//! DevTools Protocol) over one persistent WebSocket. It correlates
//! commands with their replies, fans events out to independent
//! subscribers, and enables protocol domains in dependency order.
//!
//! # Architecture
//!
//! ```text
//! bindings ──invoke──► Session ──► Correlator ──► Connection ──► WebSocket
//!                                      ▲                            │
//!                                      │ Reply                      │
//!                                      └──────── Frame ◄── EventLoop ◄┘
//!                                                  │
//! bindings ◄──EventStream── EventBus ◄──── Event ──┘
//! ```
//!
//! Key design principles:
//!
//! - One event-loop task per connection owns the socket (reads and writes)
//! - Every reply resolves exactly one caller; late or duplicate replies are ignored
//! - Every subscription has its own bounded queue; nobody blocks the reader
//! - Domains are enabled once per session, dependencies first
//!
//! # Quick Start
//!
//! ```no_run
//! use cdp_session::{EventDecoders, Result, Session};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let decoders = EventDecoders::builder()
//!         .raw("Network.requestWillBeSent")
//!         .build();
//!
//!     let session = Session::builder()
//!         .discover("127.0.0.1:9222")
//!         .decoders(decoders)
//!         .connect()
//!         .await?;
//!
//!     let mut requests = session.subscribe::<Value>("Network", Some("requestWillBeSent"))?;
//!     session.ensure_enabled("Network").await?;
//!
//!     if let Some(request) = requests.recv().await {
//!         println!("{}", request["request"]["url"]);
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`discovery`] | `/json/version` and `/json/list` lookups |
//! | [`domain`] | Domain dependency table and resolver |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Event decoding, fan-out and streams |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire frame types |
//! | [`session`] | [`Session`] façade and configuration |
//! | [`targets`] | Target tracking, creation and closing |
//! | [`transport`] | WebSocket connection and event loop |

// ============================================================================
// Modules
// ============================================================================

/// Browser endpoint discovery over HTTP.
pub mod discovery;

/// Domain dependency table and once-only enablement.
pub mod domain;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event decoding and fan-out.
pub mod events;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire message types.
///
/// Request, reply and event frames plus the inbound classifier.
pub mod protocol;

/// Session façade, builder and options.
pub mod session;

/// Page target tracking and lifecycle.
pub mod targets;

/// WebSocket transport layer.
///
/// Owns the socket and its event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Discovery types
pub use discovery::{BrowserInfo, TargetInfo, list_targets};

// Domain types
pub use domain::{Domain, DomainEnabler, DomainGraph, DomainResolver};

// Error types
pub use error::{Error, METHOD_NOT_FOUND, Result};

// Event types
pub use events::{
    EventDecoder, EventDecoders, EventFilter, EventStream, OverflowPolicy, ProtocolEvent,
    SessionScope,
};

// Identifier types
pub use identifiers::{RequestId, SessionId, SubscriptionId};

// Session types
pub use session::{ConnectionState, Session, SessionBuilder, SessionOptions};

// Target types
pub use targets::{AttachedTarget, TargetDescriptor, TargetManager};
