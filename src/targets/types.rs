//! Target descriptors, `Target` domain events and attached targets.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::events::{EventDecodersBuilder, ProtocolEvent};
use crate::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Events the manager keeps its list from.
pub(crate) const TRACKED_EVENTS: [&str; 4] = [
    "Target.targetCreated",
    "Target.targetInfoChanged",
    "Target.targetDestroyed",
    "Target.targetCrashed",
];

// ============================================================================
// TargetDescriptor
// ============================================================================

/// A `Target.TargetInfo` as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    /// Target id.
    pub target_id: String,

    /// Target kind: `page`, `iframe`, `worker`, ...
    #[serde(rename = "type")]
    pub target_type: String,

    /// Page title.
    #[serde(default)]
    pub title: String,

    /// Current URL.
    #[serde(default)]
    pub url: String,

    /// Whether some client is attached.
    #[serde(default)]
    pub attached: bool,

    /// Target that opened this one.
    #[serde(default)]
    pub opener_id: Option<String>,

    /// Browser context the target lives in.
    #[serde(default)]
    pub browser_context_id: Option<String>,
}

impl TargetDescriptor {
    /// Returns `true` for page targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

// ============================================================================
// Events
// ============================================================================

/// `Target.targetCreated`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreated {
    pub target_info: TargetDescriptor,
}

/// `Target.targetInfoChanged`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfoChanged {
    pub target_info: TargetDescriptor,
}

/// `Target.targetDestroyed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDestroyed {
    pub target_id: String,
}

/// `Target.targetCrashed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCrashed {
    pub target_id: String,

    /// Termination status, e.g. `crashed` or `killed`.
    #[serde(default)]
    pub status: String,

    /// Process exit code.
    #[serde(default)]
    pub error_code: i64,
}

impl EventDecodersBuilder {
    /// Registers the `Target` events a
    /// [`TargetManager`](super::TargetManager) tracks.
    #[must_use]
    pub fn target_events(self) -> Self {
        self.event::<TargetCreated>("Target.targetCreated")
            .event::<TargetInfoChanged>("Target.targetInfoChanged")
            .event::<TargetDestroyed>("Target.targetDestroyed")
            .event::<TargetCrashed>("Target.targetCrashed")
    }
}

/// A tracked change to the target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TargetChange {
    Upsert(TargetDescriptor),
    Remove { target_id: String, reason: &'static str },
}

impl TargetChange {
    /// Interprets a `Target` event. `None` for events that do not touch
    /// the list.
    pub(crate) fn from_event(event: &ProtocolEvent) -> Option<Result<Self>> {
        let change = match event.event_name() {
            "targetCreated" => {
                payload::<TargetCreated>(event).map(|e| Self::Upsert(e.target_info))
            }
            "targetInfoChanged" => {
                payload::<TargetInfoChanged>(event).map(|e| Self::Upsert(e.target_info))
            }
            "targetDestroyed" => payload::<TargetDestroyed>(event).map(|e| Self::Remove {
                target_id: e.target_id,
                reason: "destroyed",
            }),
            "targetCrashed" => payload::<TargetCrashed>(event).map(|e| Self::Remove {
                target_id: e.target_id,
                reason: "crashed",
            }),
            _ => return None,
        };
        Some(change)
    }
}

/// Uses the registered payload when it has the expected type, otherwise
/// decodes the raw params.
fn payload<T>(event: &ProtocolEvent) -> Result<T>
where
    T: DeserializeOwned + Clone + 'static,
{
    if let Some(value) = event.payload::<T>() {
        return Ok(value.clone());
    }
    let text = event.params().map_or("{}", |raw| raw.get());
    serde_json::from_str(text).map_err(|e| Error::event_decode(event.method(), e))
}

// ============================================================================
// Command Payloads
// ============================================================================

/// Params of `Target.createTarget`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateTargetParams<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub background: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BrowserContextCreated {
    pub browser_context_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TargetOpened {
    pub target_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TargetInfoReply {
    pub target_info: TargetDescriptor,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TargetList {
    pub target_infos: Vec<TargetDescriptor>,
}

// ============================================================================
// AttachedTarget
// ============================================================================

/// A target with a flattened session attached to it.
#[derive(Clone)]
pub struct AttachedTarget {
    pub(crate) info: TargetDescriptor,
    pub(crate) session: Session,
    /// Browser context created for this target, disposed on close.
    pub(crate) owned_context: Option<String>,
}

impl AttachedTarget {
    /// Returns the target id.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.info.target_id
    }

    /// Returns the descriptor captured when attaching.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &TargetDescriptor {
        &self.info
    }

    /// Returns the session handle addressing this target.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the browser context created for this target, if any.
    #[inline]
    #[must_use]
    pub fn owned_context(&self) -> Option<&str> {
        self.owned_context.as_deref()
    }

    /// Fetches the current descriptor through the target session.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`].
    pub async fn fetch_info(&self) -> Result<TargetDescriptor> {
        let reply: TargetInfoReply = self
            .session
            .invoke(
                "Target",
                "getTargetInfo",
                json!({ "targetId": self.info.target_id }),
            )
            .await?;
        Ok(reply.target_info)
    }
}

impl fmt::Debug for AttachedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedTarget")
            .field("target_id", &self.info.target_id)
            .field("session_id", &self.session.target_session())
            .field("owned_context", &self.owned_context)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
