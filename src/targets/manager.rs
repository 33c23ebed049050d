//! Target list tracking and target lifecycle.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventStream, ProtocolEvent};
use crate::session::Session;

use super::types::{
    AttachedTarget, BrowserContextCreated, CreateTargetParams, TRACKED_EVENTS, TargetChange,
    TargetDescriptor, TargetInfoReply, TargetList, TargetOpened,
};

// ============================================================================
// Constants
// ============================================================================

/// Default viewport width of created targets.
pub const DEFAULT_TARGET_WIDTH: u32 = 1024;

/// Default viewport height of created targets.
pub const DEFAULT_TARGET_HEIGHT: u32 = 768;

// ============================================================================
// Tracker
// ============================================================================

/// Page targets known from `Target` events.
///
/// Buffered events are applied whenever the list is read.
struct Tracker {
    events: EventStream<ProtocolEvent>,
    targets: FxHashMap<String, TargetDescriptor>,
    missed: u64,
}

impl Tracker {
    fn sync(&mut self) {
        while let Some(event) = self.events.try_recv() {
            self.apply(&event);
        }

        let missed = self.events.missed();
        if missed > self.missed {
            warn!(
                skipped = missed - self.missed,
                "Target events lost; call refresh() to resynchronize"
            );
            self.missed = missed;
        }
    }

    fn apply(&mut self, event: &ProtocolEvent) {
        match TargetChange::from_event(event) {
            None => {}
            Some(Err(e)) => warn!(error = %e, "Ignoring undecodable target event"),
            Some(Ok(TargetChange::Upsert(info))) => {
                if info.is_page() {
                    debug!(target_id = %info.target_id, url = %info.url, "Target updated");
                    self.targets.insert(info.target_id.clone(), info);
                }
            }
            Some(Ok(TargetChange::Remove { target_id, reason })) => {
                if self.targets.remove(&target_id).is_some() {
                    debug!(%target_id, reason, "Target removed");
                }
            }
        }
    }
}

// ============================================================================
// TargetManager
// ============================================================================

/// Tracks page targets and creates, attaches to and closes them.
///
/// Works over the browser-level session it was started with. Created
/// targets are attached in flatten mode and share that connection.
///
/// # Example
///
/// ```no_run
/// # use cdp_session::{EventDecoders, Session};
/// # use cdp_session::targets::TargetManager;
/// # async fn example() -> cdp_session::Result<()> {
/// let session = Session::builder()
///     .discover("127.0.0.1:9222")
///     .decoders(EventDecoders::builder().target_events().build())
///     .connect()
///     .await?;
///
/// let manager = TargetManager::start(&session).await?;
/// let page = manager
///     .create("https://example.com")
///     .window_size(1280, 720)
///     .open()
///     .await?;
///
/// page.session().ensure_enabled("Page").await?;
/// manager.close(page).await?;
/// # Ok(())
/// # }
/// ```
pub struct TargetManager {
    session: Session,
    tracker: Mutex<Tracker>,
}

impl TargetManager {
    /// Subscribes to `Target` events and turns on target discovery.
    ///
    /// The browser answers with a `targetCreated` event per existing
    /// target, so the list is populated right away.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the session's decoders lack the target events
    ///   (see [`EventDecodersBuilder::target_events`](crate::events::EventDecodersBuilder::target_events))
    /// - same as [`Session::invoke`]
    pub async fn start(session: &Session) -> Result<Self> {
        let decoders = &session.options().decoders;
        if let Some(missing) = TRACKED_EVENTS.iter().find(|m| !decoders.contains(m)) {
            return Err(Error::config(format!(
                "Target tracking needs a decoder for {missing}; register EventDecodersBuilder::target_events"
            )));
        }

        let events = session.events("Target")?;
        session
            .invoke_raw("Target", "setDiscoverTargets", json!({ "discover": true }))
            .await?;
        info!("Target discovery enabled");

        Ok(Self {
            session: session.clone(),
            tracker: Mutex::new(Tracker {
                events,
                targets: FxHashMap::default(),
                missed: 0,
            }),
        })
    }

    /// Returns the session the manager works over.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the known page targets, ordered by id.
    #[must_use]
    pub fn targets(&self) -> Vec<TargetDescriptor> {
        let mut tracker = self.tracker.lock();
        tracker.sync();
        let mut targets: Vec<_> = tracker.targets.values().cloned().collect();
        targets.sort_by(|a, b| a.target_id.cmp(&b.target_id));
        targets
    }

    /// Returns the page target with `target_id`, if known.
    #[must_use]
    pub fn get(&self, target_id: &str) -> Option<TargetDescriptor> {
        let mut tracker = self.tracker.lock();
        tracker.sync();
        tracker.targets.get(target_id).cloned()
    }

    /// Returns the number of known page targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        let mut tracker = self.tracker.lock();
        tracker.sync();
        tracker.targets.len()
    }

    /// Replaces the list with a `Target.getTargets` snapshot.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`].
    pub async fn refresh(&self) -> Result<usize> {
        let list: TargetList = self.session.invoke("Target", "getTargets", ()).await?;

        let mut tracker = self.tracker.lock();
        // Buffered events predate the snapshot
        while tracker.events.try_recv().is_some() {}
        let missed = tracker.events.missed();
        tracker.missed = missed;
        tracker.targets = list
            .target_infos
            .into_iter()
            .filter(TargetDescriptor::is_page)
            .map(|info| (info.target_id.clone(), info))
            .collect();

        debug!(count = tracker.targets.len(), "Target list refreshed");
        Ok(tracker.targets.len())
    }

    /// Starts creating a page target at `url`.
    ///
    /// Defaults to a fresh incognito browser context and a
    /// 1024x768 viewport.
    #[must_use]
    pub fn create(&self, url: impl Into<String>) -> CreateTarget<'_> {
        CreateTarget {
            manager: self,
            url: url.into(),
            incognito: true,
            width: DEFAULT_TARGET_WIDTH,
            height: DEFAULT_TARGET_HEIGHT,
        }
    }

    /// Attaches to `target` and returns a handle for its session.
    ///
    /// # Errors
    ///
    /// Same as [`Session::attach_to_target`].
    pub async fn attach(&self, target: TargetDescriptor) -> Result<AttachedTarget> {
        let session = self.session.attach_to_target(&target.target_id).await?;
        Ok(AttachedTarget {
            info: target,
            session,
            owned_context: None,
        })
    }

    /// Closes `target` and disposes the browser context created for it.
    ///
    /// The connection stays open.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`].
    pub async fn close(&self, target: AttachedTarget) -> Result<()> {
        info!(target_id = %target.info.target_id, "Closing target");

        self.session
            .invoke_raw(
                "Target",
                "closeTarget",
                json!({ "targetId": target.info.target_id }),
            )
            .await?;
        self.tracker.lock().targets.remove(&target.info.target_id);

        if let Some(context) = &target.owned_context {
            self.dispose_context(context).await?;
        }
        Ok(())
    }

    async fn open(&self, request: CreateTarget<'_>) -> Result<AttachedTarget> {
        info!(
            url = %request.url,
            incognito = request.incognito,
            width = request.width,
            height = request.height,
            "Creating target"
        );

        let owned_context = if request.incognito {
            let created: BrowserContextCreated = self
                .session
                .invoke(
                    "Target",
                    "createBrowserContext",
                    json!({ "disposeOnDetach": true }),
                )
                .await?;
            Some(created.browser_context_id)
        } else {
            None
        };

        match self.open_in(&request, owned_context.as_deref()).await {
            Ok(mut target) => {
                info!(target_id = %target.info.target_id, "Created target");
                target.owned_context = owned_context;
                Ok(target)
            }
            Err(e) => {
                if let Some(context) = &owned_context
                    && let Err(dispose) = self.dispose_context(context).await
                {
                    warn!(error = %dispose, %context, "Failed to dispose browser context");
                }
                Err(e)
            }
        }
    }

    async fn open_in(
        &self,
        request: &CreateTarget<'_>,
        context: Option<&str>,
    ) -> Result<AttachedTarget> {
        let params = CreateTargetParams {
            url: &request.url,
            browser_context_id: context,
            width: request.width,
            height: request.height,
            background: true,
        };
        let opened: TargetOpened = self.session.invoke("Target", "createTarget", params).await?;

        let reply: TargetInfoReply = self
            .session
            .invoke(
                "Target",
                "getTargetInfo",
                json!({ "targetId": opened.target_id }),
            )
            .await?;

        self.attach(reply.target_info).await
    }

    async fn dispose_context(&self, context: &str) -> Result<()> {
        self.session
            .invoke_raw(
                "Target",
                "disposeBrowserContext",
                json!({ "browserContextId": context }),
            )
            .await?;
        debug!(context, "Browser context disposed");
        Ok(())
    }
}

impl fmt::Debug for TargetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetManager")
            .field("session", &self.session)
            .field("targets", &self.tracker.lock().targets.len())
            .finish()
    }
}

// ============================================================================
// CreateTarget
// ============================================================================

/// Builder for a new page target.
///
/// Created by [`TargetManager::create`].
pub struct CreateTarget<'a> {
    manager: &'a TargetManager,
    url: String,
    incognito: bool,
    width: u32,
    height: u32,
}

impl CreateTarget<'_> {
    /// Creates the target in the default browser context instead of a
    /// fresh one when `false`.
    #[must_use]
    pub fn incognito(mut self, incognito: bool) -> Self {
        self.incognito = incognito;
        self
    }

    /// Sets the viewport size.
    ///
    /// # Arguments
    ///
    /// * `width` - Viewport width in pixels
    /// * `height` - Viewport height in pixels
    #[must_use]
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Creates the target and attaches to it.
    ///
    /// A browser context created for the target is disposed again if a
    /// later step fails.
    ///
    /// # Errors
    ///
    /// Same as [`Session::invoke`].
    pub async fn open(self) -> Result<AttachedTarget> {
        let manager = self.manager;
        manager.open(self).await
    }
}

impl fmt::Debug for CreateTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateTarget")
            .field("url", &self.url)
            .field("incognito", &self.incognito)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
