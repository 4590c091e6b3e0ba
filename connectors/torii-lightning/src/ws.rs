//! Realtime (JSON-RPC over WebSocket) stream client.
//!
//! The session authenticates, subscribes the public channels immediately and
//! the private channels once the auth ack arrives, then consumes event frames
//! until the connection drops. A dropped connection is retried forever with a
//! capped exponential delay. Pausing gates the receive loop only: the socket
//! stays open and subscriptions stay in place.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use rand::RngCore;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use torii_broker::{Dispatch, GatewayError, GatewayResult, PauseSwitch};
use torii_core::channels;

use crate::{sign, LightningCredentials};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECONNECT_DELAY_CAP: Duration = Duration::from_secs(30);

/// Owns the exchange WebSocket session and feeds decoded events downstream.
pub struct LightningStream {
    url: String,
    credentials: LightningCredentials,
    dispatcher: Arc<dyn Dispatch>,
    switch: PauseSwitch,
    public_channels: Vec<String>,
    private_channels: Vec<String>,
}

impl LightningStream {
    pub fn new(
        url: impl Into<String>,
        credentials: LightningCredentials,
        dispatcher: Arc<dyn Dispatch>,
        switch: PauseSwitch,
        product_code: &str,
    ) -> Self {
        Self {
            url: url.into(),
            credentials,
            dispatcher,
            switch,
            public_channels: vec![channels::board_snapshot(product_code)],
            private_channels: vec![channels::CHILD_ORDER_EVENTS.to_string()],
        }
    }

    /// Drive the connect/session loop for the process lifetime.
    pub async fn run(&self) {
        info!(url = %self.url, "starting websocket client");
        let mut delay = Duration::from_secs(1);
        loop {
            match connect_async(&self.url).await {
                Ok((ws, _)) => {
                    delay = Duration::from_secs(1);
                    if let Err(err) = self.session(ws).await {
                        warn!(error = %err, "websocket session ended");
                    }
                }
                Err(err) => {
                    error!(error = %err, "websocket connection failed");
                }
            }
            sleep(delay).await;
            delay = (delay * 2).min(RECONNECT_DELAY_CAP);
        }
    }

    async fn session(&self, mut ws: WsStream) -> GatewayResult<()> {
        self.send_frame(&mut ws, auth_frame(&self.credentials)?)
            .await?;
        self.send_subscriptions(&mut ws, &self.public_channels)
            .await?;
        self.receive_loop(&mut ws).await
    }

    async fn send_subscriptions(&self, ws: &mut WsStream, channels: &[String]) -> GatewayResult<()> {
        for channel in channels {
            self.send_frame(ws, subscribe_frame(channel)).await?;
        }
        Ok(())
    }

    async fn send_frame(&self, ws: &mut WsStream, frame: Value) -> GatewayResult<()> {
        ws.send(Message::Text(frame.to_string()))
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))
    }

    async fn receive_loop(&self, ws: &mut WsStream) -> GatewayResult<()> {
        loop {
            if self.switch.is_paused() {
                sleep(Duration::from_secs(1)).await;
                continue;
            }
            let message = ws.next().await;
            match message {
                Some(Ok(Message::Text(text))) => self.handle_frame(ws, &text).await?,
                Some(Ok(Message::Binary(bytes))) => {
                    if let Ok(text) = String::from_utf8(bytes) {
                        self.handle_frame(ws, &text).await?;
                    } else {
                        warn!("received non UTF-8 binary payload from stream");
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    ws.send(Message::Pong(payload))
                        .await
                        .map_err(|err| GatewayError::Transport(err.to_string()))?;
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(GatewayError::Transport(format!(
                        "connection closed: {frame:?}"
                    )));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(GatewayError::Transport(err.to_string())),
                None => return Err(GatewayError::Transport("stream ended".into())),
            }
        }
    }

    async fn handle_frame(&self, ws: &mut WsStream, text: &str) -> GatewayResult<()> {
        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(_) => {
                warn!(payload = text, "failed to parse stream payload");
                return Ok(());
            }
        };

        if let Some(params) = frame.get("params") {
            if let (Some(channel), Some(message)) = (
                params.get("channel").and_then(|c| c.as_str()),
                params.get("message"),
            ) {
                // A malformed event is fatal only to its own processing.
                if let Err(err) = self.dispatcher.dispatch(message, channel).await {
                    error!(channel, error = %err, "event dispatch failed");
                }
                return Ok(());
            }
        }

        if let (Some(id), Some(result)) = (frame.get("id"), frame.get("result")) {
            if result.as_bool() == Some(true) {
                if id.as_str() == Some("auth") {
                    self.send_subscriptions(ws, &self.private_channels).await?;
                }
                info!(%id, "subscription request acknowledged");
            }
            return Ok(());
        }

        if let Some(error) = frame.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
            let reason = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown");
            error!(code, reason, "stream error frame received");
            return Ok(());
        }

        debug!(payload = text, "ignoring unrecognized frame");
        Ok(())
    }
}

/// Build the auth frame: a fresh nonce and an HMAC-SHA256 signature over
/// `timestamp || nonce` keyed by the API secret.
fn auth_frame(credentials: &LightningCredentials) -> GatewayResult<Value> {
    let timestamp = Utc::now().timestamp_millis();
    let mut nonce_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);
    let signature = sign(&credentials.api_secret, &format!("{timestamp}{nonce}"))?;
    Ok(json!({
        "method": "auth",
        "params": {
            "api_key": credentials.api_key,
            "timestamp": timestamp,
            "nonce": nonce,
            "signature": signature,
        },
        "id": "auth",
    }))
}

fn subscribe_frame(channel: &str) -> Value {
    json!({
        "method": "subscribe",
        "params": { "channel": channel },
        "id": format!("subscribe_{channel}"),
    })
}
