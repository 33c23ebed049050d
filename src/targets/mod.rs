//! Browser target management.
//!
//! [`TargetManager`] keeps a live list of page targets from the browser's
//! `Target` events and creates, attaches to and closes targets over the
//! browser session.
//!
//! | Operation | Commands |
//! |-----------|----------|
//! | [`TargetManager::start`] | `Target.setDiscoverTargets` |
//! | [`TargetManager::refresh`] | `Target.getTargets` |
//! | [`CreateTarget::open`] | `Target.createBrowserContext` (incognito), `Target.createTarget`, `Target.getTargetInfo`, `Target.attachToTarget` |
//! | [`TargetManager::attach`] | `Target.attachToTarget` |
//! | [`TargetManager::close`] | `Target.closeTarget`, `Target.disposeBrowserContext` |
//!
//! Only `page` targets are listed. The list follows these events, which
//! must be registered with [`EventDecodersBuilder::target_events`]:
//!
//! | Event | Effect |
//! |-------|--------|
//! | `Target.targetCreated` | adds the target |
//! | `Target.targetInfoChanged` | replaces its descriptor |
//! | `Target.targetDestroyed` | removes it |
//! | `Target.targetCrashed` | removes it |
//!
//! [`EventDecodersBuilder::target_events`]: crate::events::EventDecodersBuilder::target_events

// ============================================================================
// Submodules
// ============================================================================

mod manager;
mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use manager::{CreateTarget, DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH, TargetManager};
pub use types::{
    AttachedTarget, TargetCrashed, TargetCreated, TargetDescriptor, TargetDestroyed,
    TargetInfoChanged,
};
