//! Browser endpoint discovery.
//!
//! A browser started with `--remote-debugging-port` serves a small HTTP API
//! next to its WebSocket endpoint:
//!
//! | Path | Returns |
//! |------|---------|
//! | `/json/version` | [`BrowserInfo`], including the browser WebSocket URL |
//! | `/json/list` | one [`TargetInfo`] per inspectable target |
//!
//! # Example
//!
//! ```no_run
//! use cdp_session::discovery::{BrowserInfo, list_targets};
//!
//! # async fn example() -> cdp_session::Result<()> {
//! let info = BrowserInfo::fetch("127.0.0.1:9222").await?;
//! println!("{} speaks protocol {}", info.browser, info.protocol_version);
//!
//! for target in list_targets("127.0.0.1:9222").await? {
//!     println!("{} {}", target.target_type, target.url);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// BrowserInfo
// ============================================================================

/// Reply of `/json/version`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrowserInfo {
    /// Product and version, e.g. `Chrome/120.0.6099.109`.
    #[serde(rename = "Browser")]
    pub browser: String,

    /// DevTools protocol version, e.g. `1.3`.
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,

    /// Browser user agent.
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,

    /// V8 engine version.
    #[serde(rename = "V8-Version", default)]
    pub v8_version: String,

    /// WebKit version.
    #[serde(rename = "WebKit-Version", default)]
    pub webkit_version: String,

    /// Browser-level WebSocket endpoint.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

impl BrowserInfo {
    /// Fetches `/json/version` from `address` (`host:port` or an HTTP URL).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `address` is not a valid endpoint
    /// - [`Error::Discovery`] if the browser answers with a non-success status
    /// - [`Error::Http`] if the request or body decoding fails
    pub async fn fetch(address: &str) -> Result<Self> {
        Self::fetch_with(&Client::new(), address).await
    }

    /// Same as [`fetch`](Self::fetch) with a caller-provided client.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    pub async fn fetch_with(client: &Client, address: &str) -> Result<Self> {
        get_json(client, endpoint(address, "/json/version")?).await
    }
}

// ============================================================================
// TargetInfo
// ============================================================================

/// One entry of `/json/list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetInfo {
    /// Target id, usable with `Target.attachToTarget`.
    pub id: String,

    /// Target kind: `page`, `iframe`, `service_worker`, ...
    #[serde(rename = "type")]
    pub target_type: String,

    /// Page title.
    #[serde(default)]
    pub title: String,

    /// Current URL.
    #[serde(default)]
    pub url: String,

    /// Per-target WebSocket endpoint. Absent while another client is
    /// attached.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Lists inspectable targets at `address`.
///
/// # Errors
///
/// Same as [`BrowserInfo::fetch`].
pub async fn list_targets(address: &str) -> Result<Vec<TargetInfo>> {
    get_json(&Client::new(), endpoint(address, "/json/list")?).await
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds `http://<address><path>`; an explicit scheme is kept.
fn endpoint(address: &str, path: &str) -> Result<Url> {
    let base = if address.contains("://") {
        Url::parse(address)?
    } else {
        Url::parse(&format!("http://{address}"))?
    };
    Ok(base.join(path)?)
}

async fn get_json<T: DeserializeOwned>(client: &Client, url: Url) -> Result<T> {
    debug!(%url, "Querying DevTools HTTP endpoint");

    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::discovery(format!("{url} returned status {status}")));
    }

    Ok(response.json().await?)
}

// ============================================================================
// Tests
// ============================================================================
