//! Session lifecycle state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle of a session's connection.
///
/// ```text
/// Connecting ──► Open ──► Closing ──► Closed
/// ```
///
/// `Closed` is terminal. `Open → Closing` happens on [`Session::close`] or
/// on a transport failure.
///
/// [`Session::close`]: crate::Session::close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,

    /// Commands and subscriptions are accepted.
    Open,

    /// Shutting down; new work is rejected.
    Closing,

    /// Every pending command has failed and every subscription has ended.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if new commands are accepted.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` once shutdown has started.
    #[inline]
    #[must_use]
    pub const fn is_closing_or_closed(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Connecting.is_open());
        assert!(ConnectionState::Closing.is_closing_or_closed());
        assert!(ConnectionState::Closed.is_closing_or_closed());
        assert!(!ConnectionState::Open.is_closing_or_closed());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
    }
}
