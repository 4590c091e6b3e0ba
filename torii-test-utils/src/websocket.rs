use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Loopback WebSocket endpoint speaking the Realtime JSON-RPC protocol.
///
/// Acks `auth` and `subscribe` frames, records every frame the client sends,
/// and lets tests script event and error frames toward the client. Frames
/// queued before a connection exists are flushed as soon as one is accepted.
pub struct MockStreamServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    state: Arc<ServerState>,
}

#[derive(Default)]
struct ServerState {
    queued: Mutex<Vec<String>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    received: Mutex<Vec<Value>>,
}

impl MockStreamServer {
    pub async fn spawn() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(ServerState::default());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, _peer)) => {
                                let state = accept_state.clone();
                                tokio::spawn(async move {
                                    if let Err(err) = handle_connection(state, stream).await {
                                        warn!(error = %err, "mock stream connection ended with error");
                                    }
                                });
                            }
                            Err(err) => {
                                warn!(error = %err, "mock stream failed to accept connection");
                                break;
                            }
                        }
                    }
                }
            }
        });
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
            state,
        })
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}/json-rpc", self.addr)
    }

    /// Send an event envelope to the client, queueing it when none is
    /// connected yet.
    pub async fn send_event(&self, channel: &str, message: Value) {
        let frame = json!({
            "jsonrpc": "2.0",
            "method": "channelMessage",
            "params": { "channel": channel, "message": message },
        })
        .to_string();
        self.state.deliver(frame).await;
    }

    /// Send an error envelope to the client.
    pub async fn send_error(&self, code: i64, message: &str) {
        let frame = json!({
            "jsonrpc": "2.0",
            "error": { "code": code, "message": message },
        })
        .to_string();
        self.state.deliver(frame).await;
    }

    /// Frames received from the client so far.
    pub async fn received(&self) -> Vec<Value> {
        self.state.received.lock().await.clone()
    }

    /// Block until the client has sent at least `count` frames.
    pub async fn wait_for_received(&self, count: usize) {
        while self.state.received.lock().await.len() < count {
            sleep(Duration::from_millis(10)).await;
        }
    }

    /// Block until a client connection has been accepted.
    pub async fn wait_for_connection(&self) {
        while self.state.outbound.lock().await.is_none() {
            sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

impl ServerState {
    async fn deliver(&self, frame: String) {
        let delivered = {
            let outbound = self.outbound.lock().await;
            match outbound.as_ref() {
                Some(tx) => tx.send(frame.clone()).is_ok(),
                None => false,
            }
        };
        if !delivered {
            self.queued.lock().await.push(frame);
        }
    }
}

async fn handle_connection(state: Arc<ServerState>, stream: TcpStream) -> Result<()> {
    let ws = accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    {
        let mut outbound = state.outbound.lock().await;
        *outbound = Some(tx.clone());
    }
    for frame in state.queued.lock().await.drain(..) {
        let _ = tx.send(frame);
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = source.next().await {
        match msg? {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                if let Some(ack) = ack_for(&value) {
                    let _ = tx.send(ack.to_string());
                }
                state.received.lock().await.push(value);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    *state.outbound.lock().await = None;
    writer.abort();
    Ok(())
}

fn ack_for(frame: &Value) -> Option<Value> {
    let method = frame.get("method").and_then(|m| m.as_str())?;
    if method != "auth" && method != "subscribe" {
        return None;
    }
    let id = frame.get("id")?.clone();
    Some(json!({ "jsonrpc": "2.0", "id": id, "result": true }))
}
