//! Once-only domain enablement.
//!
//! [`DomainResolver`] enables a domain's prerequisites, dependencies first,
//! issuing each `<Domain>.enable` at most once per session. Concurrent
//! callers asking for the same domain share one in-flight enable.
//!
//! # Flow
//!
//! ```text
//! ensure_enabled("Fetch")
//!   ├── resolution order: Network, IO, Page, Fetch   (cycle check, nothing sent yet)
//!   ├── Network.enable   (skipped if already enabled)
//!   ├── IO.enable        (-32601 "method not found" counts as enabled)
//!   ├── Page.enable
//!   └── Fetch.enable
//! ```
//!
//! A failed enable is not remembered, so the next call retries it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;

use super::graph::DomainGraph;

// ============================================================================
// DomainEnabler
// ============================================================================

/// Issues the enable command of one domain.
///
/// Implemented by [`Session`](crate::Session); tests substitute a
/// recording fake.
#[async_trait]
pub trait DomainEnabler: Send + Sync {
    /// Sends `<domain>.enable` and waits for the reply.
    async fn enable(&self, domain: &str) -> Result<()>;
}

// ============================================================================
// DomainResolver
// ============================================================================

/// Per-session enabled-domain set plus the dependency walk.
#[derive(Debug)]
pub struct DomainResolver {
    graph: Arc<DomainGraph>,
    enabled: Mutex<FxHashMap<String, Arc<OnceCell<()>>>>,
}

impl DomainResolver {
    /// Creates a resolver with nothing enabled.
    #[inline]
    #[must_use]
    pub fn new(graph: Arc<DomainGraph>) -> Self {
        Self {
            graph,
            enabled: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns the dependency table.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &DomainGraph {
        &self.graph
    }

    /// Enables `domain` and everything it depends on.
    ///
    /// # Errors
    ///
    /// - [`Error::DependencyCycle`](crate::Error::DependencyCycle) before
    ///   anything is sent, if the table has a cycle on this path
    /// - the first enable failure otherwise
    pub async fn ensure_enabled<E>(&self, enabler: &E, domain: &str) -> Result<()>
    where
        E: DomainEnabler + ?Sized,
    {
        let order = self.graph.resolution_order(domain)?;
        self.enable_in_order(enabler, &order).await
    }

    /// Enables only the prerequisites of `domain`.
    ///
    /// Lets a wrapper issue its own parameterised enable afterwards.
    ///
    /// # Errors
    ///
    /// Same as [`ensure_enabled`](Self::ensure_enabled).
    pub async fn ensure_dependencies<E>(&self, enabler: &E, domain: &str) -> Result<()>
    where
        E: DomainEnabler + ?Sized,
    {
        let mut order = self.graph.resolution_order(domain)?;
        order.pop();
        self.enable_in_order(enabler, &order).await
    }

    /// Returns `true` if `domain` has been confirmed enabled.
    #[must_use]
    pub fn is_enabled(&self, domain: &str) -> bool {
        self.enabled
            .lock()
            .get(domain)
            .is_some_and(|cell| cell.initialized())
    }

    /// Returns the enabled domains, sorted.
    #[must_use]
    pub fn enabled(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .enabled
            .lock()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    async fn enable_in_order<E>(&self, enabler: &E, order: &[String]) -> Result<()>
    where
        E: DomainEnabler + ?Sized,
    {
        for domain in order {
            let cell = self.cell(domain);
            cell.get_or_try_init(|| enable_once(enabler, domain))
                .await?;
        }
        Ok(())
    }

    fn cell(&self, domain: &str) -> Arc<OnceCell<()>> {
        let mut enabled = self.enabled.lock();
        match enabled.get(domain) {
            Some(cell) => Arc::clone(cell),
            None => {
                let cell = Arc::new(OnceCell::new());
                enabled.insert(domain.to_string(), Arc::clone(&cell));
                cell
            }
        }
    }
}

async fn enable_once<E>(enabler: &E, domain: &str) -> Result<()>
where
    E: DomainEnabler + ?Sized,
{
    match enabler.enable(domain).await {
        Ok(()) => {
            debug!(domain, "Domain enabled");
            Ok(())
        }
        Err(e) if e.is_method_not_found() => {
            debug!(domain, "Domain has no enable command");
            Ok(())
        }
        Err(e) => {
            debug!(domain, error = %e, "Domain enable failed");
            Err(e)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
