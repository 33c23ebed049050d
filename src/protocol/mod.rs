//! CDP wire message types.
//!
//! This module defines the JSON frames exchanged with the browser.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Browser | Command request |
//! | `Reply` | Browser → Client | Command result or error |
//! | `RawEvent` | Browser → Client | Unsolicited notification |
//!
//! # Naming
//!
//! Commands and events use `Domain.name` format:
//!
//! - `Page.navigate`
//! - `Network.enable`
//! - `Network.requestWillBeSent`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Raw event type |
//! | `frame` | Inbound frame classifier |
//! | `request` | Request and Reply types |

// ============================================================================
// Submodules
// ============================================================================

/// Raw event message type.
pub mod event;

/// Inbound frame classification.
pub mod frame;

/// Request and Reply message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::RawEvent;
pub use frame::Frame;
pub use request::{Reply, Request, ResponseError};
