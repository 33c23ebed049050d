//! Target tracking and lifecycle against a mock browser.

mod common;

use serde_json::{Value, json};

use cdp_session::targets::TargetManager;
use cdp_session::{EventDecoders, Error, SessionId, SessionOptions};
use common::{Peer, connect, options, round_trip, within};

fn target_options() -> SessionOptions {
    SessionOptions::default().with_decoders(EventDecoders::builder().target_events().build())
}

fn page(id: &str, url: &str) -> Value {
    json!({ "targetId": id, "type": "page", "title": "", "url": url, "attached": false })
}

fn ids(manager: &TargetManager) -> Vec<String> {
    manager
        .targets()
        .into_iter()
        .map(|target| target.target_id)
        .collect()
}

/// Answers the `Target` commands a manager sends.
fn browser(request: &Value) -> Vec<Value> {
    let id = &request["id"];
    let result = match request["method"].as_str() {
        Some("Target.createBrowserContext") => json!({ "browserContextId": "CTX1" }),
        Some("Target.createTarget") => json!({ "targetId": "T9" }),
        Some("Target.getTargetInfo") => json!({
            "targetInfo": {
                "targetId": request["params"]["targetId"],
                "type": "page",
                "url": "https://example.com/",
                "browserContextId": "CTX1"
            }
        }),
        Some("Target.attachToTarget") => json!({ "sessionId": "S9" }),
        Some("Target.closeTarget") => json!({ "success": true }),
        Some("Target.getTargets") => json!({
            "targetInfos": [
                page("P1", "https://a.test/"),
                { "targetId": "W1", "type": "service_worker", "url": "https://a.test/sw.js" },
                page("P2", "https://b.test/")
            ]
        }),
        _ => json!({}),
    };
    vec![json!({ "id": id, "result": result })]
}

async fn start(peer: &mut Peer, session: &cdp_session::Session) -> TargetManager {
    let (manager, _) = tokio::join!(TargetManager::start(session), async {
        let request = peer.recv_request().await;
        assert_eq!(request["method"], "Target.setDiscoverTargets");
        assert_eq!(request["params"], json!({ "discover": true }));

        peer.event("Target.targetCreated", json!({ "targetInfo": page("P1", "about:blank") }))
            .await;
        peer.event(
            "Target.targetCreated",
            json!({ "targetInfo": { "targetId": "W1", "type": "service_worker" } }),
        )
        .await;
        let id = request["id"].as_u64().expect("id");
        peer.reply(id, json!({})).await;
    });
    manager.expect("start")
}

#[tokio::test]
async fn test_target_events_keep_the_page_list() {
    let (session, mut peer) = connect(target_options()).await;
    let manager = start(&mut peer, &session).await;

    assert_eq!(ids(&manager), ["P1"]);

    peer.event(
        "Target.targetInfoChanged",
        json!({ "targetInfo": page("P1", "https://example.com/") }),
    )
    .await;
    peer.event("Target.targetCreated", json!({ "targetInfo": page("P2", "about:blank") }))
        .await;
    peer.event("Target.targetCreated", json!({ "targetInfo": page("P3", "about:blank") }))
        .await;
    peer.event("Target.targetDestroyed", json!({ "targetId": "P1" }))
        .await;
    peer.event(
        "Target.targetCrashed",
        json!({ "targetId": "P3", "status": "crashed", "errorCode": 11 }),
    )
    .await;
    peer.event("Target.targetDestroyed", json!({ "targetId": "unknown" }))
        .await;
    within(round_trip(&session, &mut peer)).await;

    assert_eq!(ids(&manager), ["P2"]);
    assert!(manager.get("P1").is_none());
    assert_eq!(manager.target_count(), 1);

    peer.event(
        "Target.targetInfoChanged",
        json!({ "targetInfo": page("P2", "https://example.com/next") }),
    )
    .await;
    within(round_trip(&session, &mut peer)).await;
    assert_eq!(
        manager.get("P2").expect("tracked").url,
        "https://example.com/next"
    );
}

#[tokio::test]
async fn test_target_events_from_other_sessions_are_ignored() {
    let (session, mut peer) = connect(target_options()).await;
    let manager = start(&mut peer, &session).await;

    peer.target_event(
        "S1",
        "Target.targetCreated",
        json!({ "targetInfo": page("IFRAME", "about:blank") }),
    )
    .await;
    within(round_trip(&session, &mut peer)).await;

    assert_eq!(ids(&manager), ["P1"]);
}

#[tokio::test]
async fn test_start_requires_target_decoders() {
    let (session, _peer) = connect(options()).await;

    let err = within(TargetManager::start(&session))
        .await
        .expect_err("no decoders");

    assert!(matches!(err, Error::Config { .. }));
    assert!(err.to_string().contains("Target.targetCreated"));
    assert_eq!(session.pending_count(), 0);
}

#[tokio::test]
async fn test_create_incognito_target_and_close_it() {
    let (session, peer) = connect(target_options()).await;
    let responder = peer.serve(browser);
    let manager = within(TargetManager::start(&session)).await.expect("start");

    let target = within(manager.create("https://example.com/").open())
        .await
        .expect("create");

    assert_eq!(target.target_id(), "T9");
    assert_eq!(target.owned_context(), Some("CTX1"));
    assert_eq!(
        target.session().target_session(),
        Some(&SessionId::new("S9"))
    );

    let requests = responder.requests();
    assert_eq!(
        responder.methods(),
        [
            "Target.setDiscoverTargets",
            "Target.createBrowserContext",
            "Target.createTarget",
            "Target.getTargetInfo",
            "Target.attachToTarget"
        ]
    );
    assert_eq!(requests[1]["params"], json!({ "disposeOnDetach": true }));
    assert_eq!(
        requests[2]["params"],
        json!({
            "url": "https://example.com/",
            "browserContextId": "CTX1",
            "width": 1024,
            "height": 768,
            "background": true
        })
    );
    assert_eq!(
        requests[4]["params"],
        json!({ "targetId": "T9", "flatten": true })
    );

    within(manager.close(target)).await.expect("close");

    let requests = responder.requests();
    assert_eq!(requests[5]["method"], "Target.closeTarget");
    assert_eq!(requests[5]["params"], json!({ "targetId": "T9" }));
    assert_eq!(requests[6]["method"], "Target.disposeBrowserContext");
    assert_eq!(requests[6]["params"], json!({ "browserContextId": "CTX1" }));
    assert!(requests[5].get("sessionId").is_none());
    assert!(session.is_open());
}

#[tokio::test]
async fn test_create_in_default_context_keeps_it_on_close() {
    let (session, peer) = connect(target_options()).await;
    let responder = peer.serve(browser);
    let manager = within(TargetManager::start(&session)).await.expect("start");

    let target = within(
        manager
            .create("about:blank")
            .incognito(false)
            .window_size(1280, 720)
            .open(),
    )
    .await
    .expect("create");
    assert_eq!(target.owned_context(), None);
    assert_eq!(target.info().browser_context_id.as_deref(), Some("CTX1"));

    within(manager.close(target)).await.expect("close");

    let requests = responder.requests();
    assert_eq!(
        responder.methods(),
        [
            "Target.setDiscoverTargets",
            "Target.createTarget",
            "Target.getTargetInfo",
            "Target.attachToTarget",
            "Target.closeTarget"
        ]
    );
    assert_eq!(
        requests[1]["params"],
        json!({ "url": "about:blank", "width": 1280, "height": 720, "background": true })
    );
}

#[tokio::test]
async fn test_failed_create_disposes_its_context() {
    let (session, peer) = connect(target_options()).await;
    let responder = peer.serve(|request| {
        if request["method"] == "Target.createTarget" {
            vec![json!({
                "id": request["id"],
                "error": { "code": -32000, "message": "Failed to open a new tab" }
            })]
        } else {
            browser(request)
        }
    });
    let manager = within(TargetManager::start(&session)).await.expect("start");

    let err = within(manager.create("https://example.com/").open())
        .await
        .expect_err("create fails");

    assert!(err.is_protocol_error());
    assert_eq!(
        responder.methods(),
        [
            "Target.setDiscoverTargets",
            "Target.createBrowserContext",
            "Target.createTarget",
            "Target.disposeBrowserContext"
        ]
    );
}

#[tokio::test]
async fn test_refresh_replaces_the_list_with_pages() {
    let (session, peer) = connect(target_options()).await;
    let _responder = peer.serve(browser);
    let manager = within(TargetManager::start(&session)).await.expect("start");
    assert!(manager.targets().is_empty());

    let count = within(manager.refresh()).await.expect("refresh");

    assert_eq!(count, 2);
    assert_eq!(ids(&manager), ["P1", "P2"]);
}

#[tokio::test]
async fn test_attached_target_fetches_info_over_its_session() {
    let (session, peer) = connect(target_options()).await;
    let responder = peer.serve(browser);
    let manager = within(TargetManager::start(&session)).await.expect("start");

    let descriptor = serde_json::from_value(page("P7", "about:blank")).expect("page");
    let target = within(manager.attach(descriptor)).await.expect("attach");
    let info = within(target.fetch_info()).await.expect("info");

    assert_eq!(info.target_id, "P7");
    assert_eq!(info.url, "https://example.com/");
    let requests = responder.requests();
    let last = requests.last().expect("request");
    assert_eq!(last["method"], "Target.getTargetInfo");
    assert_eq!(last["sessionId"], "S9");
    assert!(requests.iter().all(|r| r["method"] != "Target.createBrowserContext"));
}
