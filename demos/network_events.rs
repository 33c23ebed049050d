//! Network traffic watcher.
//!
//! Demonstrates:
//! - Discovering the browser endpoint over HTTP
//! - Subscribing to typed events before enabling their domain
//! - Enabling a domain with its prerequisites
//! - Attaching to a page target
//!
//! Start a browser first:
//!   chrome --headless=new --remote-debugging-port=9222
//!
//! Usage:
//!   cargo run --example network_events
//!   cargo run --example network_events -- 127.0.0.1:9333
//!   cargo run --example network_events -- --no-wait
//!   cargo run --example network_events -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use cdp_session::{EventDecoders, Session, list_targets};
use common::Args;

// ============================================================================
// Event Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestWillBeSent {
    request_id: String,
    request: RequestData,
}

#[derive(Debug, Clone, Deserialize)]
struct RequestData {
    url: String,
    method: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadingFinished {
    request_id: String,
    encoded_data_length: f64,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Network Events ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[Connect] Discovering browser at {}...", args.address);
    let decoders = EventDecoders::builder()
        .event::<RequestWillBeSent>("Network.requestWillBeSent")
        .event::<LoadingFinished>("Network.loadingFinished")
        .raw("Page.loadEventFired")
        .build();

    let session = Session::builder()
        .discover(&args.address)
        .decoders(decoders)
        .connect()
        .await?;
    println!("          ✓ Connected\n");

    // ========================================================================
    // Attach
    // ========================================================================

    let targets = list_targets(&args.address).await?;
    let target = targets
        .iter()
        .find(|t| t.target_type == "page")
        .context("no page target; open a tab first")?;
    println!("[Attach] {} ({})", target.title, target.url);

    let page = session.attach_to_target(&target.id).await?;
    println!("         ✓ Session {}\n", page.target_session().context("target session")?);

    // ========================================================================
    // Subscribe, then enable
    // ========================================================================

    let mut requests = page.subscribe::<RequestWillBeSent>("Network", Some("requestWillBeSent"))?;
    let mut finished = page.subscribe::<LoadingFinished>("Network", Some("loadingFinished"))?;

    page.ensure_enabled("Network").await?;
    page.ensure_enabled("Page").await?;
    println!("[Enable] {}\n", page.enabled_domains().join(", "));

    let _: serde_json::Value = page
        .invoke("Page", "navigate", json!({ "url": "https://example.com/" }))
        .await?;

    let watch = async {
        loop {
            tokio::select! {
                Some(event) = requests.recv() => {
                    println!("  → {} {} [{}]", event.request.method, event.request.url, event.request_id);
                }
                Some(event) = finished.recv() => {
                    println!("  ✓ {} ({} bytes)", event.request_id, event.encoded_data_length);
                }
                else => break,
            }
        }
    };

    tokio::select! {
        () = watch => println!("\n[Done] Session ended"),
        () = common::wait_for_exit(args.no_wait) => {}
    }

    session.close().await;
    Ok(())
}
