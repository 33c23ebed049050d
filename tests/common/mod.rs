//! In-process mock browser for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use cdp_session::{EventDecoders, Session, SessionOptions};

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Events the tests publish, all decoded as [`Value`].
pub fn decoders() -> EventDecoders {
    EventDecoders::builder()
        .raw("Network.requestWillBeSent")
        .raw("Network.loadingFinished")
        .raw("Page.loadEventFired")
        .raw("Page.frameNavigated")
        .build()
}

/// Default options with the test decoders.
pub fn options() -> SessionOptions {
    SessionOptions::default().with_decoders(decoders())
}

/// Fails the test if `future` does not finish within five seconds.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Runs one command round trip.
///
/// The reader handles frames in order, so every frame the peer sent
/// before this call has been dispatched once it returns.
pub async fn round_trip(session: &Session, peer: &mut Peer) {
    let (result, _) = tokio::join!(
        session.invoke_raw("Runtime", "runIfWaitingForDebugger", ()),
        peer.answer_next()
    );
    result.expect("round trip");
}

/// Connects a session to a fresh mock browser.
pub async fn connect(options: SessionOptions) -> (Session, Peer) {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        accept_async(stream).await.expect("handshake")
    });

    let session = Session::builder()
        .url(format!("ws://{addr}/devtools/browser/mock"))
        .options(options)
        .connect()
        .await
        .expect("connect");
    let ws = accept.await.expect("accept task");

    (session, Peer { ws })
}

/// Browser side of the WebSocket.
pub struct Peer {
    ws: WebSocketStream<TcpStream>,
}

impl Peer {
    /// Wraps an accepted server-side socket.
    pub fn from_socket(ws: WebSocketStream<TcpStream>) -> Self {
        Self { ws }
    }

    /// Next text frame as raw text; `None` once the client closed.
    pub async fn recv_text(&mut self) -> Option<String> {
        while let Some(message) = self.ws.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    }

    /// Next command frame, parsed.
    pub async fn recv_request(&mut self) -> Value {
        let text = self.recv_text().await.expect("request frame");
        serde_json::from_str(&text).expect("request json")
    }

    pub async fn send_text(&mut self, text: impl Into<String>) {
        self.ws
            .send(Message::Text(text.into().into()))
            .await
            .expect("send");
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(value.to_string()).await;
    }

    pub async fn reply(&mut self, id: u64, result: Value) {
        self.send_json(json!({ "id": id, "result": result })).await;
    }

    pub async fn reply_error(&mut self, id: u64, code: i64, message: &str) {
        self.send_json(json!({ "id": id, "error": { "code": code, "message": message } }))
            .await;
    }

    pub async fn event(&mut self, method: &str, params: Value) {
        self.send_json(json!({ "method": method, "params": params })).await;
    }

    pub async fn target_event(&mut self, session_id: &str, method: &str, params: Value) {
        self.send_json(json!({ "method": method, "params": params, "sessionId": session_id }))
            .await;
    }

    /// Receives one command and answers it with `{}`.
    pub async fn answer_next(&mut self) -> Value {
        let request = self.recv_request().await;
        let id = request["id"].as_u64().expect("id");
        self.reply(id, json!({})).await;
        request
    }

    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Answers every command with `respond(request)` on a background task.
    ///
    /// Every received request is recorded in the returned log.
    pub fn serve<F>(mut self, respond: F) -> Responder
    where
        F: Fn(&Value) -> Vec<Value> + Send + 'static,
    {
        let log = Arc::new(Mutex::new(Vec::new()));
        let task_log = Arc::clone(&log);
        let task = tokio::spawn(async move {
            while let Some(text) = self.recv_text().await {
                let request: Value = serde_json::from_str(&text).expect("request json");
                task_log.lock().push(request.clone());
                for frame in respond(&request) {
                    self.send_json(frame).await;
                }
            }
        });
        Responder { log, task }
    }
}

/// Handle to a background responder.
pub struct Responder {
    log: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl Responder {
    /// Methods of every request received so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter_map(|request| request["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.log.lock().clone()
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Reply `{}` to the given request.
pub fn empty_reply(request: &Value) -> Vec<Value> {
    vec![json!({ "id": request["id"], "result": {} })]
}
