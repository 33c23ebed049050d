//! Static domain dependency table.
//!
//! A domain may only be enabled once the domains it lists have been
//! enabled. The table is supplied by the bindings layer; unknown domains
//! have no dependencies.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

// ============================================================================
// DevTools Table
// ============================================================================

/// Dependency table of the DevTools protocol, one row per domain.
const DEVTOOLS: &[(&str, &[&str])] = &[
    ("Accessibility", &["DOM"]),
    ("Animation", &["Runtime", "DOM"]),
    ("ApplicationCache", &["Page"]),
    ("Audits", &["Network"]),
    ("CSS", &["DOM", "Page"]),
    ("Console", &["Runtime"]),
    ("DOMDebugger", &["DOM", "Debugger", "Runtime"]),
    ("DOMSnapshot", &["CSS", "DOM", "DOMDebugger", "Page"]),
    ("Debugger", &["Runtime"]),
    ("Fetch", &["Network", "IO", "Page"]),
    ("HeadlessExperimental", &["Page", "Runtime"]),
    ("HeapProfiler", &["Runtime"]),
    ("IndexedDB", &["Runtime"]),
    ("LayerTree", &["DOM"]),
    ("Log", &["Runtime", "Network"]),
    ("Page", &["Debugger", "DOM", "IO", "Network", "Runtime"]),
    ("PerformanceTimeline", &["DOM", "Network"]),
    ("Profiler", &["Runtime", "Debugger"]),
    ("Tracing", &["IO"]),
];

// ============================================================================
// Domain
// ============================================================================

/// A domain and its direct dependencies, in enable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Domain name, e.g. `Network`.
    pub name: String,

    /// Domains that must be enabled first.
    pub dependencies: Vec<String>,
}

// ============================================================================
// DomainGraph
// ============================================================================

/// Domain → dependencies table.
///
/// # Example
///
/// ```ignore
/// let graph = DomainGraph::new()
///     .with("Fetch", ["Network", "IO", "Page"])
///     .with("Page", ["Network"]);
///
/// assert_eq!(
///     graph.resolution_order("Fetch")?,
///     ["Network", "IO", "Page", "Fetch"]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct DomainGraph {
    domains: FxHashMap<String, Domain>,
}

impl DomainGraph {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the DevTools protocol table.
    #[must_use]
    pub fn devtools() -> Self {
        DEVTOOLS
            .iter()
            .fold(Self::new(), |graph, (name, deps)| graph.with(*name, deps.iter().copied()))
    }

    /// Declares the dependencies of `name`, replacing any earlier row.
    #[must_use]
    pub fn with<I, S>(mut self, name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, dependencies);
        self
    }

    /// Declares the dependencies of `name` in place.
    pub fn insert<I, S>(&mut self, name: impl Into<String>, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let dependencies = dependencies.into_iter().map(Into::into).collect();
        self.domains.insert(name.clone(), Domain { name, dependencies });
    }

    /// Returns the row for `name`, if declared.
    #[inline]
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    /// Returns the direct dependencies of `name`; empty if undeclared.
    #[inline]
    #[must_use]
    pub fn dependencies(&self, name: &str) -> &[String] {
        match self.domains.get(name) {
            Some(domain) => &domain.dependencies,
            None => &[],
        }
    }

    /// Returns the number of declared domains.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Returns `true` if no domain is declared.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Returns every domain `name` needs, dependencies first, ending
    /// with `name` itself. Shared dependencies appear once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyCycle`] with the resolution chain if a
    /// domain depends on itself, directly or transitively.
    pub fn resolution_order(&self, name: &str) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut order = Vec::new();
        self.walk(name, &mut chain, &mut order)?;
        Ok(order)
    }

    /// Checks the whole table for cycles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyCycle`] for the first cycle found.
    pub fn validate(&self) -> Result<()> {
        let mut names: Vec<&str> = self.domains.keys().map(String::as_str).collect();
        names.sort_unstable();

        let mut chain = Vec::new();
        let mut order = Vec::new();
        for name in names {
            self.walk(name, &mut chain, &mut order)?;
        }
        Ok(())
    }

    fn walk<'a>(
        &'a self,
        name: &'a str,
        chain: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if chain.contains(&name) {
            let mut path: Vec<String> = chain.iter().map(|d| (*d).to_string()).collect();
            path.push(name.to_string());
            return Err(Error::dependency_cycle(path));
        }
        if order.iter().any(|done| done == name) {
            return Ok(());
        }

        chain.push(name);
        for dependency in self.dependencies(name) {
            self.walk(dependency, chain, order)?;
        }
        chain.pop();

        order.push(name.to_string());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devtools_table_is_acyclic() {
        let graph = DomainGraph::devtools();
        assert!(graph.validate().is_ok());
        assert_eq!(graph.dependencies("Fetch"), ["Network", "IO", "Page"]);
        assert_eq!(graph.dependencies("Animation"), ["Runtime", "DOM"]);
    }

    #[test]
    fn test_unknown_domain_has_no_dependencies() {
        let graph = DomainGraph::devtools();
        assert!(graph.dependencies("Network").is_empty());
        assert!(graph.domain("Network").is_none());
        assert_eq!(graph.resolution_order("Network").expect("order"), ["Network"]);
    }

    #[test]
    fn test_resolution_order_is_depth_first() {
        let graph = DomainGraph::new()
            .with("Fetch", ["Network", "IO", "Page"])
            .with("Page", ["Network", "Runtime"]);

        assert_eq!(
            graph.resolution_order("Fetch").expect("order"),
            ["Network", "IO", "Runtime", "Page", "Fetch"]
        );
    }

    #[test]
    fn test_two_domain_cycle() {
        let graph = DomainGraph::new().with("A", ["B"]).with("B", ["A"]);

        match graph.resolution_order("A") {
            Err(Error::DependencyCycle { path }) => assert_eq!(path, ["A", "B", "A"]),
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(matches!(graph.validate(), Err(Error::DependencyCycle { .. })));
    }

    #[test]
    fn test_self_cycle_reports_from_entry() {
        let graph = DomainGraph::new().with("X", ["Y"]).with("Y", ["Y"]);

        match graph.resolution_order("X") {
            Err(Error::DependencyCycle { path }) => assert_eq!(path, ["X", "Y", "Y"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_replaces_row() {
        let mut graph = DomainGraph::new().with("CSS", ["DOM"]);
        graph.insert("CSS", ["Page"]);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.dependencies("CSS"), ["Page"]);
    }
}
