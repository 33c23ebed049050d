//! WebSocket transport layer.
//!
//! This module owns the one WebSocket to the browser's DevTools endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │                              │  Browser        │
//! │                 │         WebSocket            │                 │
//! │  Connection ────┼─────────────────────────────►│  DevTools       │
//! │  EventLoop  ◄───┼──────────────────────────────┤  endpoint       │
//! │                 │  ws://host:port/devtools/..  │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`connect`] - WebSocket handshake, bounded by a timeout
//! 2. [`EventLoop::spawn`] - Start reading and writing
//! 3. [`Connection::send`] - Queue text frames from any task
//! 4. [`Connection::shutdown`] - Close the socket; the handler is notified
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ClientStream, Connection, EventLoop, FrameHandler, connect};
