//! Domain enablement over the wire.

mod common;

use serde_json::json;

use cdp_session::{DomainGraph, Error, METHOD_NOT_FOUND};
use common::{connect, empty_reply, options, within};

fn fetch_graph() -> DomainGraph {
    DomainGraph::new().with("Fetch", ["Network", "IO", "Page"])
}

#[tokio::test]
async fn test_fetch_enables_dependencies_once() {
    let (session, peer) = connect(options().with_domains(fetch_graph())).await;
    let responder = peer.serve(empty_reply);

    let (a, b) = tokio::join!(
        session.ensure_enabled("Fetch"),
        session.ensure_enabled("Fetch")
    );
    a.expect("first");
    b.expect("second");
    within(session.ensure_enabled("Fetch"))
        .await
        .expect("third");
    within(session.ensure_enabled("Network"))
        .await
        .expect("network");

    assert_eq!(
        responder.methods(),
        ["Network.enable", "IO.enable", "Page.enable", "Fetch.enable"]
    );
    assert_eq!(
        session.enabled_domains(),
        ["Fetch", "IO", "Network", "Page"]
    );
}

#[tokio::test]
async fn test_default_table_orders_page_prerequisites() {
    let (session, peer) = connect(options()).await;
    let responder = peer.serve(empty_reply);

    within(session.ensure_enabled("Page")).await.expect("page");

    let methods = responder.methods();
    assert_eq!(methods.last().map(String::as_str), Some("Page.enable"));
    assert_eq!(methods.len(), 6);

    let position = |name: &str| {
        methods
            .iter()
            .position(|method| method == &format!("{name}.enable"))
            .expect("enabled")
    };
    assert!(position("Runtime") < position("Debugger"));
    assert!(position("Debugger") < position("Page"));
    assert!(position("Network") < position("Page"));
}

#[tokio::test]
async fn test_ensure_dependencies_skips_the_domain_itself() {
    let (session, peer) = connect(options().with_domains(fetch_graph())).await;
    let responder = peer.serve(empty_reply);

    within(session.ensure_dependencies("Fetch"))
        .await
        .expect("dependencies");

    assert_eq!(
        responder.methods(),
        ["Network.enable", "IO.enable", "Page.enable"]
    );
}

#[tokio::test]
async fn test_method_not_found_counts_as_enabled() {
    let (session, peer) = connect(options().with_domains(fetch_graph())).await;
    let responder = peer.serve(|request| {
        if request["method"] == "IO.enable" {
            vec![json!({
                "id": request["id"],
                "error": { "code": METHOD_NOT_FOUND, "message": "'IO.enable' wasn't found" }
            })]
        } else {
            empty_reply(request)
        }
    });

    within(session.ensure_enabled("Fetch")).await.expect("fetch");
    within(session.ensure_enabled("Fetch")).await.expect("again");

    assert_eq!(responder.methods().len(), 4);
}

#[tokio::test]
async fn test_failed_enable_is_retried() {
    let (session, peer) = connect(options().with_domains(fetch_graph())).await;
    let responder = peer.serve(|request| {
        let first_page = request["method"] == "Page.enable" && request["id"] == 3;
        if first_page {
            vec![json!({
                "id": request["id"],
                "error": { "code": -32000, "message": "Not attached" }
            })]
        } else {
            empty_reply(request)
        }
    });

    let err = within(session.ensure_enabled("Fetch"))
        .await
        .expect_err("page fails");
    assert!(err.is_protocol_error());
    assert_eq!(
        responder.methods(),
        ["Network.enable", "IO.enable", "Page.enable"]
    );

    within(session.ensure_enabled("Fetch"))
        .await
        .expect("retry");
    assert_eq!(
        responder.methods(),
        [
            "Network.enable",
            "IO.enable",
            "Page.enable",
            "Page.enable",
            "Fetch.enable"
        ]
    );
}

#[tokio::test]
async fn test_attached_handle_keeps_its_own_enabled_set() {
    let (session, peer) = connect(options().with_domains(fetch_graph())).await;
    let responder = peer.serve(empty_reply);

    within(session.ensure_enabled("Network"))
        .await
        .expect("root");
    let page = session.attach("S1");
    within(page.ensure_enabled("Network"))
        .await
        .expect("target");

    let requests = responder.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].get("sessionId").is_none());
    assert_eq!(requests[1]["sessionId"], "S1");
    assert!(page.enabled_domains() == ["Network"]);
}

#[tokio::test]
async fn test_cycle_fails_without_sending() {
    let cyclic = DomainGraph::new()
        .with("A", ["B"])
        .with("B", ["A"])
        .with("C", ["A"]);
    let (session, peer) = connect(options().with_domains(cyclic)).await;
    let responder = peer.serve(empty_reply);

    match within(session.ensure_enabled("C")).await {
        Err(Error::DependencyCycle { path }) => assert_eq!(path, ["C", "A", "B", "A"]),
        other => panic!("expected dependency cycle, got {other:?}"),
    }

    within(session.ensure_enabled("Network"))
        .await
        .expect("unrelated domain");
    assert_eq!(responder.methods(), ["Network.enable"]);
    assert!(session.is_open());
}
