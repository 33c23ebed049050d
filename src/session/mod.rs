//! Session façade and its internals.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SessionBuilder`] fluent configuration |
//! | `core` | [`Session`] commands, subscriptions, domains, lifecycle |
//! | `correlator` | Pending-request table (internal) |
//! | `options` | [`SessionOptions`] tuning values |
//! | `state` | [`ConnectionState`] lifecycle |

// ============================================================================
// Submodules
// ============================================================================

/// Session builder.
pub mod builder;

/// Session façade.
pub mod core;

/// Command/reply correlation.
mod correlator;

/// Session options.
pub mod options;

/// Lifecycle state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use self::core::Session;
pub use options::{
    DEFAULT_EVENT_BUFFER, DEFAULT_HANDSHAKE_TIMEOUT, MAX_EVENT_BUFFER, SessionOptions,
};
pub use state::ConnectionState;
