use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

use torii_broker::{Dispatch, GatewayResult, PauseSwitch};
use torii_lightning::{LightningCredentials, LightningStream};
use torii_test_utils::MockStreamServer;

const PRODUCT: &str = "FX_BTC_JPY";
const BOARD_CHANNEL: &str = "lightning_board_snapshot_FX_BTC_JPY";

#[derive(Default)]
struct RecordingDispatch {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingDispatch {
    async fn wait_for(&self, count: usize) {
        while self.events.lock().await.len() < count {
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Dispatch for RecordingDispatch {
    async fn dispatch(&self, payload: &Value, channel: &str) -> GatewayResult<()> {
        self.events
            .lock()
            .await
            .push((channel.to_string(), payload.clone()));
        Ok(())
    }
}

fn credentials() -> LightningCredentials {
    LightningCredentials {
        api_key: "test-key".into(),
        api_secret: "test-secret".into(),
    }
}

fn spawn_stream(
    url: String,
    dispatcher: Arc<RecordingDispatch>,
    switch: PauseSwitch,
) -> tokio::task::JoinHandle<()> {
    let stream = Arc::new(LightningStream::new(
        url,
        credentials(),
        dispatcher,
        switch,
        PRODUCT,
    ));
    tokio::spawn(async move { stream.run().await })
}

#[tokio::test(flavor = "multi_thread")]
async fn authenticates_subscribes_and_dispatches() -> Result<()> {
    let mut server = MockStreamServer::spawn().await?;
    let recorder = Arc::new(RecordingDispatch::default());
    let handle = spawn_stream(server.url(), recorder.clone(), PauseSwitch::new("stream"));

    // Auth, public subscribe, then private subscribe once the auth ack lands.
    timeout(Duration::from_secs(5), server.wait_for_received(3)).await?;
    let frames = server.received().await;
    assert_eq!(frames[0]["method"], "auth");
    assert_eq!(frames[0]["params"]["api_key"], "test-key");
    assert_eq!(
        frames[0]["params"]["signature"].as_str().unwrap().len(),
        64
    );
    assert_eq!(frames[1]["method"], "subscribe");
    assert_eq!(frames[1]["params"]["channel"], BOARD_CHANNEL);
    assert!(frames.iter().any(|f| {
        f["method"] == "subscribe" && f["params"]["channel"] == "child_order_events"
    }));

    server
        .send_event(BOARD_CHANNEL, json!({ "mid_price": 6_500_000.0 }))
        .await;
    timeout(Duration::from_secs(5), recorder.wait_for(1)).await?;
    let events = recorder.events().await;
    assert_eq!(events[0].0, BOARD_CHANNEL);
    assert_eq!(events[0].1["mid_price"], 6_500_000.0);

    handle.abort();
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn paused_stream_does_not_dispatch_buffered_frames() -> Result<()> {
    let mut server = MockStreamServer::spawn().await?;
    let recorder = Arc::new(RecordingDispatch::default());
    let switch = PauseSwitch::new("stream");
    switch.pause();

    // Buffered before the client even connects; flushed into the socket as
    // soon as the connection is accepted.
    server
        .send_event(BOARD_CHANNEL, json!({ "mid_price": 1.0 }))
        .await;

    let handle = spawn_stream(server.url(), recorder.clone(), switch.clone());
    timeout(Duration::from_secs(5), server.wait_for_connection()).await?;

    sleep(Duration::from_millis(1_500)).await;
    assert!(recorder.events().await.is_empty());

    switch.resume();
    timeout(Duration::from_secs(5), recorder.wait_for(1)).await?;

    handle.abort();
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn error_frames_do_not_stop_the_session() -> Result<()> {
    let mut server = MockStreamServer::spawn().await?;
    let recorder = Arc::new(RecordingDispatch::default());
    let handle = spawn_stream(server.url(), recorder.clone(), PauseSwitch::new("stream"));

    timeout(Duration::from_secs(5), server.wait_for_received(2)).await?;
    server.send_error(-32602, "Invalid params").await;
    server
        .send_event(BOARD_CHANNEL, json!({ "mid_price": 2.0 }))
        .await;

    timeout(Duration::from_secs(5), recorder.wait_for(1)).await?;
    assert_eq!(recorder.events().await.len(), 1);

    handle.abort();
    server.shutdown().await;
    Ok(())
}
