//! Scripted WebSocket servers on random ports.
//!
//! Routes:
//! - `/echo` echoes every text message
//! - `/silent` reads everything and never answers
//! - `/twice` answers every text message with two copies
//! - `/delayed` echoes each message after `DELAY`
//! - `/push` greets with `GREETING` on connect, then echoes

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Reply delay of the `/delayed` route.
pub const DELAY: Duration = Duration::from_millis(100);

/// First message sent by the `/push` route.
pub const GREETING: &str = "welcome";

#[derive(Clone, Copy)]
enum Script {
    Echo,
    Silent,
    Twice,
    Delayed,
    Push,
}

/// A running test server. Stops when dropped.
pub struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Bind to an ephemeral port on localhost and start serving.
    pub async fn spawn() -> Self {
        let app = Router::new()
            .route("/echo", get(|ws: WebSocketUpgrade| upgrade(ws, Script::Echo)))
            .route("/silent", get(|ws: WebSocketUpgrade| upgrade(ws, Script::Silent)))
            .route("/twice", get(|ws: WebSocketUpgrade| upgrade(ws, Script::Twice)))
            .route("/delayed", get(|ws: WebSocketUpgrade| upgrade(ws, Script::Delayed)))
            .route("/push", get(|ws: WebSocketUpgrade| upgrade(ws, Script::Push)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, task }
    }

    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A `ws://` URI for `path` on this server.
    pub fn uri(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Stop accepting connections.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn upgrade(ws: WebSocketUpgrade, script: Script) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve(socket, script))
}

async fn serve(mut socket: WebSocket, script: Script) {
    if matches!(script, Script::Push)
        && socket
            .send(Message::Text(GREETING.to_string().into()))
            .await
            .is_err()
    {
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let replies = match script {
            Script::Silent => 0,
            Script::Echo | Script::Push => 1,
            Script::Delayed => {
                tokio::time::sleep(DELAY).await;
                1
            }
            Script::Twice => 2,
        };
        for _ in 0..replies {
            if socket.send(Message::Text(text.clone().into())).await.is_err() {
                return;
            }
        }
    }
}
