//! Domain dependency resolution.
//!
//! CDP domains often require other domains to be enabled first
//! (`Fetch` needs `Network`, `IO` and `Page`). This module holds the
//! static dependency table and the per-session resolver that walks it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `graph` | [`DomainGraph`] dependency table and cycle checks |
//! | `resolver` | [`DomainResolver`] once-only enablement |

// ============================================================================
// Submodules
// ============================================================================

/// Dependency table.
pub mod graph;

/// Once-only enablement.
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use graph::{Domain, DomainGraph};
pub use resolver::{DomainEnabler, DomainResolver};
